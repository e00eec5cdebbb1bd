//! Error types for the arbor generator

use thiserror::Error;

/// Main error type for generation
#[derive(Debug, Error)]
pub enum Error {
    /// Non-positive resolution/size, malformed grammar, non-finite input
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A configured ceiling (string length, iteration count, point count) would be exceeded
    #[error("Generation overflow: {what} {actual} exceeds ceiling {limit}")]
    GenerationOverflow {
        what: &'static str,
        actual: usize,
        limit: usize,
    },

    /// NaN or zero-length geometry
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// Requested scalar-field allocation exceeds the memory budget
    #[error("Resource exhaustion: requested {requested} bytes, budget is {budget} bytes")]
    ResourceExhaustion { requested: usize, budget: usize },

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }
}
