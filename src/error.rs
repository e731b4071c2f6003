//! Error types for bus monitor decoding

use thiserror::Error;

/// Result type for bus monitor operations
pub type Result<T> = std::result::Result<T, BmError>;

/// Errors surfaced by the bus monitor decoder
///
/// Decoding a single entry never fails: unknown and reserved type codes are
/// represented, not rejected. Only whole-buffer checks and the encoder's
/// field validation produce errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BmError {
    /// Buffer length is not a multiple of the 4-byte entry size
    #[error("Malformed buffer: length {len} is not a multiple of {entry_size}")]
    MalformedBuffer { len: usize, entry_size: usize },

    /// Buffer is empty but at least one entry is required
    #[error("Empty buffer: {0}")]
    EmptyBuffer(String),

    /// A field handed to the encoder does not fit its bit width
    #[error("Invalid field: {0}")]
    InvalidField(String),
}

impl BmError {
    /// Create a new MalformedBuffer error for a buffer of `len` bytes
    pub fn malformed_buffer(len: usize) -> Self {
        BmError::MalformedBuffer {
            len,
            entry_size: crate::layout::ENTRY_SIZE,
        }
    }

    /// Create a new EmptyBuffer error
    pub fn empty_buffer(msg: impl Into<String>) -> Self {
        BmError::EmptyBuffer(msg.into())
    }

    /// Create a new InvalidField error
    pub fn invalid_field(msg: impl Into<String>) -> Self {
        BmError::InvalidField(msg.into())
    }
}
