//! Error types for message decoding and byte-code enrichment.

use thiserror::Error;

/// Errors from decoding a single recognized message.
///
/// Scoped to that one message: the caller stores it as unparsed and keeps
/// going with the rest of the block.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid amount in '{field}': {value:?} is not a decimal integer")]
    InvalidAmount { field: String, value: String },

    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}

/// Errors from the external byte-code decoder.
#[derive(Debug, Error)]
pub enum ProgramDecodeError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Decoder timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Unexpected decoder response: {0}")]
    BadResponse(String),
}
