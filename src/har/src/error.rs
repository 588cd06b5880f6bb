//! Crate-wide error taxonomy.
//!
//! The teacher's own PE reader (`PeParser`) bubbles up bare `std::io::Error`
//! and asserts on violated invariants. A library meant to be embedded by
//! other tools needs richer, `source()`-chaining context, so every fallible
//! path here returns [`HarError`] instead.

use thiserror::Error;

/// Errors surfaced by the HAR/SL4/HARX codec.
#[derive(Error, Debug)]
pub enum HarError {
    #[error("I/O error at offset {offset:?}: {source}")]
    IoFailure {
        offset: Option<u64>,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected end of file while reading {context} (needed {needed} more bytes)")]
    UnexpectedEof { context: &'static str, needed: usize },

    #[error("record length mismatch: prefix says {prefix} bytes, trailer says {trailer} bytes")]
    LengthMismatch { prefix: u32, trailer: u32 },

    #[error("unrecognised 4-char type code {code:?} in header {header}")]
    UnknownType { header: String, code: [u8; 4] },

    #[error("malformed record in header {header}: {reason}")]
    MalformedRecord { header: String, reason: String },

    #[error("SL4 schema error: {reason}")]
    SchemaError { reason: String },

    #[error("SL4 integrity error in header {header} at index {index}: {reason}")]
    IntegrityError {
        header: String,
        index: usize,
        reason: String,
    },

    #[error("key not found: no axis of the array admits prefix {prefix:?}")]
    KeyNotFound { prefix: Vec<String> },
}

impl From<std::io::Error> for HarError {
    fn from(source: std::io::Error) -> Self {
        HarError::IoFailure {
            offset: None,
            source,
        }
    }
}

impl From<serde_json::Error> for HarError {
    fn from(source: serde_json::Error) -> Self {
        HarError::MalformedRecord {
            header: "<harx>".to_string(),
            reason: source.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for HarError {
    fn from(source: zip::result::ZipError) -> Self {
        HarError::MalformedRecord {
            header: "<harx>".to_string(),
            reason: source.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HarError>;
