//! Error types for revisio.
//!
//! Epistemic taxonomy:
//! - B_i falsified: Expected failures (unknown feature, unknown object, bad config)
//! - I^B materialized: Filesystem failures while loading stimuli or writing results
//! - K_i violated: Internal invariant violations (bugs)
//!
//! Every check here runs at construction time. Once a trial is bound and a
//! condition validated, the sampler itself cannot fail.

use thiserror::Error;

/// Top-level error type for revisio.
#[derive(Debug, Error)]
pub enum RevisionError {
    // ═══════════════════════════════════════════════════════════════════
    // B_i FALSIFIED — Belief proven wrong (contract violations)
    // ═══════════════════════════════════════════════════════════════════

    #[error("Invalid feature: '{0}'")]
    InvalidFeature(String),

    #[error("Unknown object {object_id} referenced by trial '{trial_id}'")]
    UnknownObject { trial_id: String, object_id: u32 },

    #[error("Invalid experiment configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    // ═══════════════════════════════════════════════════════════════════
    // I^B MATERIALIZED — Bounded ignorance became known-bad
    // ═══════════════════════════════════════════════════════════════════

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ═══════════════════════════════════════════════════════════════════
    // K_i VIOLATED — Invariant broken (bug, should not happen)
    // ═══════════════════════════════════════════════════════════════════

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RevisionError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Shorthand for an `InvalidConfig` error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether the error stems from bad input data rather than a bug or the filesystem.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFeature(_)
                | Self::UnknownObject { .. }
                | Self::InvalidConfig(_)
                | Self::InvalidInput(_)
                | Self::ParseError(_)
        )
    }
}

/// Result type alias for revisio.
pub type Result<T> = std::result::Result<T, RevisionError>;
