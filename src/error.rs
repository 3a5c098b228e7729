//! Error types for the matching engine.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MatchError>;

/// Matching engine error type.
///
/// Precondition failures (`InputValidation`, missing query essentials,
/// malformed catalog tables) abort the whole operation. Per-candidate
/// resolution failures inside a batch are caught at the batch boundary
/// and logged instead of propagated.
#[derive(Error, Debug)]
pub enum MatchError {
    /// Shape/size mismatch, missing required columns, malformed input.
    #[error("Input validation failed: {0}")]
    InputValidation(String),

    /// Unresolvable candidate id or missing backing data.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Read/write failure on the ledger store or a backing table.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for MatchError {
    fn from(e: std::io::Error) -> Self {
        MatchError::Persistence(e.to_string())
    }
}

impl From<csv::Error> for MatchError {
    fn from(e: csv::Error) -> Self {
        MatchError::Persistence(e.to_string())
    }
}

impl From<serde_yaml::Error> for MatchError {
    fn from(e: serde_yaml::Error) -> Self {
        MatchError::Config(e.to_string())
    }
}
