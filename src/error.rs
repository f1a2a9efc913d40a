//! Error taxonomy for a balancing run.
//!
//! Every failure is fatal to the run, so the variants only need to carry a
//! human-readable message.  The enum is `Clone` because a failed canonical
//! download is handed to every task waiting on it.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalanceError {
    /// A layer has no published version where one was expected.
    #[error("no layer version found for {layer} in {region}")]
    NotFound { layer: String, region: String },

    /// Any provider API or HTTP failure.
    #[error("{operation} failed: {message}")]
    Transport { operation: String, message: String },

    /// Credential, region or configuration-file problem.
    #[error("configuration error: {0}")]
    Config(String),

    /// The run-scoped token was cancelled before the work finished.
    #[error("run cancelled")]
    Cancelled,
}

impl BalanceError {
    pub fn not_found(layer: &str, region: &str) -> Self {
        Self::NotFound {
            layer: layer.to_string(),
            region: region.to_string(),
        }
    }

    pub fn transport(operation: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T, E = BalanceError> = std::result::Result<T, E>;
