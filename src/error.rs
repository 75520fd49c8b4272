//! Error types for extra-field decoding and archive ingestion
//!
//! Decode and classification errors are per-entry: the pipeline records them
//! on the entry row and moves on. Only [`IngestError`] ends a run.

use std::fmt;
use thiserror::Error;

/// Result type alias for run-level operations
pub type IngestResult<T> = Result<T, IngestError>;

/// Sub-block of the extra-field record being decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    Date,
    Owner,
    Inode,
    FormatMarker,
    ProtectionClass,
    AttributeCount,
    Attribute(u32),
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Block::Date => write!(f, "date block"),
            Block::Owner => write!(f, "owner block"),
            Block::Inode => write!(f, "inode block"),
            Block::FormatMarker => write!(f, "format marker block"),
            Block::ProtectionClass => write!(f, "protection class"),
            Block::AttributeCount => write!(f, "attribute count"),
            Block::Attribute(index) => write!(f, "attribute #{index}"),
        }
    }
}

/// Errors raised while decoding one entry's extra field
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unsupported format version {version} (expected {expected})")]
    UnsupportedVersion { version: u8, expected: u8 },

    #[error("truncated record in {block}: needed {needed} bytes, {available} available")]
    TruncatedRecord {
        block: Block,
        needed: usize,
        available: usize,
    },

    #[error("attribute #{index} has no key separator")]
    MalformedAttribute { index: u32 },

    /// A value rule matched but could not interpret the bytes
    #[error("value of '{key}' does not fit rule '{rule}'")]
    DecodeAmbiguous { key: String, rule: &'static str },
}

/// Content classifier failure (non-fatal)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("classification unavailable: {0}")]
    ClassificationUnavailable(String),
}

/// Run-level failures
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("{path} is not a valid zip archive: {reason}")]
    InvalidArchive { path: String, reason: String },

    #[error("output database already exists: {0}")]
    OutputExists(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Zip structure that can't be walked (end records, headers)
    #[error("malformed zip structure: {0}")]
    Malformed(String),
}
