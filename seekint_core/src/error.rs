//! Error taxonomy shared by every operation in `seekint_core`.

use thiserror::Error;

/// The error type for all container, index, decode and read operations.
///
/// Nothing is retried internally: container bytes are static, so a failure
/// is reported to the caller as soon as it is observed.
#[derive(Debug, Error)]
pub enum SeekIntError {
    /// Open, seek or read failed at the OS boundary.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Header, footer or block index is inconsistent.
    #[error("corrupt container: {0}")]
    CorruptContainer(String),

    /// The header names a different codec than the one supplied on open.
    #[error("codec mismatch: file uses codec {found} but provided codec has id {expected}")]
    CodecMismatch { expected: u16, found: u16 },

    /// A single block failed its checksum, was truncated, or did not decompress.
    #[error("failed to decode block {block}: {reason}")]
    Decode { block: u64, reason: String },

    /// Requested range falls outside the stream or the destination buffer.
    #[error(
        "read of {length} elements at offset {offset} (buffer start {start}) is out of bounds \
         (stream has {total} elements, buffer holds {buffer_len})"
    )]
    Bounds {
        offset: u64,
        start: usize,
        length: usize,
        total: u64,
        buffer_len: usize,
    },

    /// Element type of the read does not match the declared container width.
    #[error(
        "element width mismatch: container stores {declared}-bit integers, \
         read asked for {requested}-bit"
    )]
    WidthMismatch { declared: u32, requested: u32 },

    /// The handle was used after `close`.
    #[error("reader used after close")]
    UseAfterClose,

    /// A block could not be compressed while writing.
    #[error("failed to encode block {block}: {reason}")]
    Encode { block: u64, reason: String },

    /// Options or written data are unusable (bad block size, partial element, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl SeekIntError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptContainer(msg.into())
    }

    pub(crate) fn decode(block: u64, reason: impl Into<String>) -> Self {
        Self::Decode {
            block,
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SeekIntError>;
