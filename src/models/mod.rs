//! Core data models for revisio.
//!
//! Epistemic mapping:
//! - K_i (Knowledge): Closed feature/dimension enums, set-valued hypotheses
//! - B_i (Beliefs): Stimulus files and configs, validated into Result
//! - I^R (Resolvable): Experiment parameters from the config file

mod config;
mod domain;
mod error;
mod record;
mod stimuli;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use record::*;
pub use stimuli::*;
