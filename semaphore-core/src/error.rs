//! Structured error types for the Semaphore workspace.

use thiserror::Error;

/// Unified error type for all Semaphore operations.
#[derive(Debug, Error)]
pub enum SemaphoreError {
    /// Invalid input (bad arguments, violated preconditions)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Model fitting did not produce a usable model
    #[error("fit failed: {0}")]
    Fit(String),

    /// A fitted model could not score the supplied data
    #[error("scoring failed: {0}")]
    Score(String),

    /// Degenerate numerics (non-finite likelihood, collapsed variance, etc.)
    #[error("numerical error: {0}")]
    Numerical(String),

    /// A word that is not part of the training vocabulary
    #[error("unknown word: {0}")]
    UnknownWord(String),

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the Semaphore workspace.
pub type Result<T> = std::result::Result<T, SemaphoreError>;
