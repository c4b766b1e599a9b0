//! Error types for the archive engine.
//!
//! Lookup-style absence on objects is reported through invalid handles
//! (see [`crate::abc::IObject::valid`]); everything here is a hard failure
//! for the operation that produced it.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for archive operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid magic bytes at start of file
    #[error("Invalid archive: expected Ogawa magic bytes")]
    InvalidMagic,

    /// Unsupported container or archive version
    #[error("Unsupported archive version: {0}")]
    UnsupportedVersion(u16),

    /// File is truncated
    #[error("Unexpected end of file at position {0}")]
    UnexpectedEof(u64),

    /// The backing store cannot be parsed, or an instance source is missing.
    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    /// Named child or property is absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Index-based lookup past the end.
    #[error("{what} index {index} out of range (count: {count})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        count: usize,
    },

    /// Typed accessor does not match the stored type or property kind.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Illegal write: after seal, duplicate sibling, instance cycle.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Create a malformed-archive error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedArchive(msg.into())
    }

    /// Create an invalid-state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// A `TypeMismatch` from anything printable.
    pub fn type_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// True for errors a caller may reasonably recover from.
    pub fn is_lookup(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::OutOfRange { .. })
    }
}

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::InvalidMagic;
        assert!(e.to_string().contains("magic"));

        let e = Error::OutOfRange { what: "sample", index: 5, count: 3 };
        let s = e.to_string();
        assert!(s.starts_with("sample"));
        assert!(s.contains('5'));
        assert!(s.contains('3'));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_lookup_classification() {
        assert!(Error::not_found("x").is_lookup());
        assert!(!Error::invalid_state("sealed").is_lookup());
        assert!(!Error::type_mismatch("float32_t", "int32_t").is_lookup());
    }
}
