// Error taxonomy shared by signature, delta and patch.
//
// Every failure aborts the current operation; nothing is retried and
// partially written output is left as-is.

use std::io;

/// Error type for all oxisync operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Read/write failure on a caller-supplied stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Illegal block length, strong length or magic number.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed delta stream, or a COPY outside the supplied basis.
    #[error("corrupt delta: {0}")]
    CorruptDelta(String),

    /// Truncated or malformed signature stream.
    #[error("corrupt signature: {0}")]
    CorruptSignature(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub(crate) fn corrupt_delta(msg: impl Into<String>) -> Self {
        Self::CorruptDelta(msg.into())
    }

    pub(crate) fn corrupt_signature(msg: impl Into<String>) -> Self {
        Self::CorruptSignature(msg.into())
    }

    /// True for the error kinds caused by bad input data rather than I/O.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::CorruptDelta(_) | Self::CorruptSignature(_))
    }
}
