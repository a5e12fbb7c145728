//! Error taxonomy for the anonymization engine.

use std::path::Path;
use thiserror::Error;

/// Failures surfaced by the anonymize/restore operations and their parts.
#[derive(Debug, Error)]
pub enum PrivyError {
    /// Caller-supplied configuration is unusable: no entity types requested,
    /// an unknown entity type, or an unknown detector backend.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A detection backend failed: spawn error, non-zero exit, timeout, or
    /// output the engine cannot understand.
    #[error("detector fault: {0}")]
    Detector(String),

    /// A mapping file is missing, unreadable, or not the expected record shape.
    #[error("mapping format error: {0}")]
    Format(String),

    /// An encrypted mapping failed authentication: wrong password or
    /// corrupted ciphertext.
    #[error("mapping integrity error: {0}")]
    Integrity(String),

    /// Replacement ranges handed to the run splicer overlap or fall outside
    /// the paragraph text.
    #[error("validation error: {0}")]
    Validation(String),

    /// The document is not a readable DOCX package.
    #[error("docx error: {0}")]
    Docx(String),

    /// A cryptographic primitive failed outside of authentication (system
    /// randomness, sealing).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// File-system failure, tagged with the path involved.
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl PrivyError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        PrivyError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, PrivyError>;
