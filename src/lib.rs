//! revisio - Bayesian hypothesis-revision simulator.
//!
//! Simulates an ideal learner revising a conjunctive category hypothesis
//! after labelled examples, producing synthetic response-type data under
//! proposal-bias, deliberation-length and temperature manipulations.
//!
//! ## Architecture
//!
//! - **Models**: Features, objects, trials, hypotheses, config, errors
//! - **Sampler**: Posterior model → proposal generator → Metropolis-Hastings chain
//! - **Chain Pool**: Runs many independent chains per trial concurrently
//!
//! ## Pipelines
//!
//! - **Sweep**: Baseline + pAdd sweep + steps sweep + temperature sweep → labels
//! - **Fit**: Grid over (pAdd, steps, temperature) → loss against human data → best point
//!
//! ## Epistemic Design
//!
//! - K_i (Knowledge): Closed feature universe, set-valued hypotheses
//! - B_i (Beliefs): Stimulus and config inputs, checked at construction time
//! - I^R (Resolvable): Experiment grids and seeds from the config file
//! - I^B (Bounded): Sampling noise, controlled by per-chain seeded streams

pub mod models;
pub mod pipeline;
pub mod pool;
pub mod sampler;

// Re-exports for convenience
pub use models::{
    BoundTrial, ChainRecord, Config, ExperimentConfig, Feature, FeatureSpace, Hypothesis,
    ResponseType, Result, RevisionError, Stimuli,
};
pub use pipeline::{FitPipeline, SweepPipeline, SweepResults};
pub use pool::ChainPool;
pub use sampler::{Chain, PosteriorModel, Proposer, Sampler};
