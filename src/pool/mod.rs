//! Pool module - concurrent chain execution.

mod runner;

pub use runner::*;
