//! Extended-metadata decoder for mobile full-filesystem extraction archives
//!
//! Each zip entry of a full-files extraction carries a vendor extra field with
//! the file's timestamps, ownership, inode, data protection class and extended
//! attributes. This crate decodes those fields and stores them in SQLite.

pub mod classify;
pub mod common;
pub mod database;
pub mod error;
pub mod extra;
pub mod ingest;
pub mod logging;

pub use classify::{Classification, ClassificationCache, ContentClassifier, MagicClassifier};
pub use database::{Database, LabelTable};
pub use error::{ClassifyError, DecodeError, IngestError, IngestResult};
pub use extra::{decode_extra, AttributeValue, ExtraRecord};
pub use ingest::{ingest_archive, IngestOptions, IngestSummary, Pipeline};
