//! Errors raised by the harness: trace files, exports and name lookups.

use causal_core::UnknownVariant;
use causal_env::CausalError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Causal(#[from] CausalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    UnknownVariant(#[from] UnknownVariant),
}

impl SimError {
    /// Returns the wrapped engine error, if any.
    pub fn as_causal(&self) -> Option<&CausalError> {
        match self {
            SimError::Causal(err) => Some(err),
            _ => None,
        }
    }
}
