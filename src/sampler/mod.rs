//! Sampler module - posterior model, proposal generator and MCMC chain.

mod chain;
mod posterior;
mod proposal;

pub use chain::*;
pub use posterior::*;
pub use proposal::*;
