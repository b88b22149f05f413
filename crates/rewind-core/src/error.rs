//! Errors from the payload wire format.

use std::io;

use thiserror::Error;

/// Errors raised while reading or writing payload records.
#[derive(Debug, Error)]
pub enum WireError {
    /// The buffer ended before the record was complete.
    #[error("payload truncated")]
    Truncated,
    /// A session header did not start with the expected magic bytes.
    #[error("invalid session header magic")]
    InvalidMagic,
    /// The payload was produced by a newer (or too old) wire version.
    #[error("unsupported wire version {found} (supported {min}..={max})")]
    UnsupportedVersion {
        /// Version found in the payload.
        found: u16,
        /// Oldest version this build reads.
        min: u16,
        /// Newest version this build reads.
        max: u16,
    },
    /// A length-prefixed string was not valid UTF-8.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,
    /// An enum discriminant was out of range.
    #[error("invalid {what} discriminant {value}")]
    InvalidEnum {
        /// Name of the enum being decoded.
        what: &'static str,
        /// The offending raw value.
        value: u8,
    },
    /// A string or collection is too long for its `u32` length prefix.
    #[error("length {len} does not fit a u32 prefix")]
    LengthOverflow {
        /// The length that was rejected.
        len: usize,
    },
    /// Any other I/O failure from the underlying reader or writer.
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for WireError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => Self::Truncated,
            _ => Self::Io(e),
        }
    }
}
