//! Unnormalized log-posterior over conjunctive hypotheses.
//!
//! K_i: Prior penalizes length (simplicity bias), likelihood is a
//! noisy-label model with independent examples. MCMC only needs ratios,
//! so no partition function is computed.

use crate::models::{BoundExample, FeatureSpace, Hypothesis};

/// Per-feature prior penalty.
pub const LAMBDA: f64 = 0.7;

/// Label noise: probability that an observed label disagrees with the rule.
pub const NOISE: f64 = 0.05;

/// Posterior model bound to a feature registry.
#[derive(Debug, Clone, Copy)]
pub struct PosteriorModel<'a> {
    space: &'a FeatureSpace,
    log_match: f64,
    log_mismatch: f64,
}

impl<'a> PosteriorModel<'a> {
    pub fn new(space: &'a FeatureSpace) -> Self {
        Self {
            space,
            log_match: (1.0 - NOISE).ln(),
            log_mismatch: NOISE.ln(),
        }
    }

    pub fn space(&self) -> &'a FeatureSpace {
        self.space
    }

    /// `-λ · |h|`
    pub fn log_prior(&self, hypothesis: &Hypothesis) -> f64 {
        -LAMBDA * hypothesis.len() as f64
    }

    /// Sum over examples of `log(1-ε)` on a correct prediction and `log(ε)` otherwise.
    pub fn log_likelihood(&self, hypothesis: &Hypothesis, examples: &[BoundExample]) -> f64 {
        debug_assert!(hypothesis.iter().all(|f| self.space.contains(f)));
        examples
            .iter()
            .map(|ex| {
                if hypothesis.predicts(&ex.object) == ex.label {
                    self.log_match
                } else {
                    self.log_mismatch
                }
            })
            .sum()
    }

    pub fn log_posterior(&self, hypothesis: &Hypothesis, examples: &[BoundExample]) -> f64 {
        self.log_prior(hypothesis) + self.log_likelihood(hypothesis, examples)
    }
}
