//! Error types for Labeller Core.

use thiserror::Error;

/// A label in a client batch could not be parsed.
///
/// Carries the zero-based position of the offending label so the whole batch
/// can be rejected with a useful message.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("label {position} is malformed: {reason}")]
pub struct LabelParseError {
    pub position: usize,
    pub reason: String,
}

/// A batch cannot be placed after the user's checkpoint.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlacementError {
    #[error("some labels declare a sequence index and some do not")]
    MixedDeclaration,

    #[error("declared sequence indexes are not consecutive at label {position}")]
    NonContiguous { position: usize },

    #[error("declared sequence index {got} is negative")]
    NegativeIndex { got: i64 },

    #[error("sequence gap: expected index {expected}, got {got}")]
    Gap { expected: i64, got: i64 },
}

/// Errors from minting or verifying credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential is malformed: {0}")]
    Malformed(String),

    #[error("credential signature is invalid")]
    InvalidSignature,

    #[error("encoding error: {0}")]
    Encoding(String),
}
