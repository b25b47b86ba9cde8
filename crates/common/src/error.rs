//! Universal error types for tally.

use thiserror::Error;

/// Top-level error type for all tally operations.
#[derive(Debug, Error)]
pub enum TallyError {
    #[error("RPC error ({chain}): {message}")]
    Rpc { chain: String, message: String },

    #[error("Price source error: {0}")]
    Price(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type TallyResult<T> = Result<T, TallyError>;
