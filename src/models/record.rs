//! Response and result types for revisio.
//!
//! K_i: These types represent the data flowing out of the sampler.
//! K_i: The four response-type strings are keyed on by downstream analysis.

use super::{Feature, Hypothesis};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Net edit between a chain's final hypothesis and the trial's initial one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Only features were added
    Additive,
    /// Only features were removed
    Subtractive,
    /// Features were both added and removed
    Mixed,
    /// Final hypothesis equals the initial one (never moved, or moved back)
    NoChange,
}

impl ResponseType {
    pub const ALL: [ResponseType; 4] = [
        ResponseType::Additive,
        ResponseType::Subtractive,
        ResponseType::Mixed,
        ResponseType::NoChange,
    ];

    /// Classify the net edit from `initial` to `final_h`.
    pub fn classify(initial: &Hypothesis, final_h: &Hypothesis) -> Self {
        let removed = initial.difference(final_h);
        let added = final_h.difference(initial);
        match (added.is_empty(), removed.is_empty()) {
            (true, false) => Self::Subtractive,
            (false, true) => Self::Additive,
            (false, false) => Self::Mixed,
            (true, true) => Self::NoChange,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Additive => "additive",
            Self::Subtractive => "subtractive",
            Self::Mixed => "mixed",
            Self::NoChange => "nochange",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full record of one completed chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainRecord {
    /// Source trial
    pub trial_id: String,

    /// Trial family tag
    pub trial_type: String,

    /// Condition label (e.g. "p_add=0.5_steps=500_temp=1")
    pub condition: String,

    /// Index of this chain within its (trial, condition) batch
    pub chain_index: usize,

    pub initial_hypothesis: Hypothesis,

    pub final_hypothesis: Hypothesis,

    pub final_length: usize,

    pub response_type: ResponseType,

    /// Accepted additive moves
    pub additive_moves: usize,

    /// Accepted subtractive moves
    pub subtractive_moves: usize,

    /// Proposals evaluated against the posterior (no-op moves excluded)
    pub proposals: usize,

    /// Proposals accepted
    pub accepted: usize,

    pub final_log_posterior: f64,

    /// Fraction of the trial's examples labelled correctly by the final hypothesis
    pub accuracy: f64,
}

impl ChainRecord {
    /// Features added relative to the initial hypothesis.
    pub fn added(&self) -> Vec<Feature> {
        self.final_hypothesis.difference(&self.initial_hypothesis)
    }

    /// Features removed relative to the initial hypothesis.
    pub fn removed(&self) -> Vec<Feature> {
        self.initial_hypothesis.difference(&self.final_hypothesis)
    }
}

/// Fractions of each response type in a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseDistribution {
    pub additive: f64,
    pub subtractive: f64,
    pub mixed: f64,
    pub nochange: f64,
}

impl ResponseDistribution {
    /// Tally labels into fractions. All zero for an empty collection.
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a ResponseType>) -> Self {
        let mut counts = [0usize; 4];
        for label in labels {
            counts[*label as usize] += 1;
        }
        let total: usize = counts.iter().sum();
        if total == 0 {
            return Self::default();
        }
        let frac = |n: usize| n as f64 / total as f64;
        Self {
            additive: frac(counts[0]),
            subtractive: frac(counts[1]),
            mixed: frac(counts[2]),
            nochange: frac(counts[3]),
        }
    }

    /// Fraction for one response type.
    pub fn get(&self, response: ResponseType) -> f64 {
        match response {
            ResponseType::Additive => self.additive,
            ResponseType::Subtractive => self.subtractive,
            ResponseType::Mixed => self.mixed,
            ResponseType::NoChange => self.nochange,
        }
    }

    /// Vector form in `[additive, subtractive, mixed, nochange]` order.
    pub fn to_vec(&self) -> [f64; 4] {
        [self.additive, self.subtractive, self.mixed, self.nochange]
    }
}

impl fmt::Display for ResponseDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "additive {:.1}%  subtractive {:.1}%  mixed {:.1}%  nochange {:.1}%",
            self.additive * 100.0,
            self.subtractive * 100.0,
            self.mixed * 100.0,
            self.nochange * 100.0
        )
    }
}
