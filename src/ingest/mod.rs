//! Archive ingestion pipeline
//!
//! Walks archive entries in archive order, one at a time, and writes one
//! `files` row per entry plus one `xattrs` row per decoded attribute.
//!
//! ## Failure Policy
//! - Extra-field decode failures affect only their entry: the row keeps its
//!   archive-level fields, decoded fields are NULL, `Error` holds the reason
//! - Classification failures leave the affected label ID NULL
//! - Storage errors and an unreadable container end the run
//!
//! ## Module Structure
//! ```text
//! ingest/
//! ├── mod.rs      - Pipeline, IngestSummary, ingest_archive()
//! ├── central.rs  - Zip central directory reader (raw extra fields)
//! ├── options.rs  - IngestOptions
//! └── source.rs   - EntrySource trait, ZipSource
//! ```

pub mod central;
pub mod options;
pub mod source;

pub use options::{IngestOptions, DEFAULT_COMMIT_INTERVAL, DEFAULT_SNIFF_LEN};
pub use source::{split_entry_path, ArchiveEntry, EntrySource, ZipSource};

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::classify::{Classification, ClassificationCache, ContentClassifier, MagicClassifier};
use crate::common::audit::{self, IngestAuditContext};
use crate::database::{Database, EntryRecord};
use crate::error::{ClassifyError, IngestError, IngestResult};
use crate::extra::{decode_extra, Attribute};

/// Counters for one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// Sequence IDs assigned
    pub entries: u64,
    /// Attribute rows written
    pub attributes: u64,
    /// Entries whose metadata could not be read or decoded
    pub failed_entries: u64,
    /// Entries with at least one missing label
    pub unclassified_entries: u64,
    pub commits: u64,
    pub cancelled: bool,
}

/// Single-run ingestion state
///
/// Owns the sequence counter and the label cache for the lifetime of a run.
pub struct Pipeline<'db> {
    db: &'db Database,
    options: IngestOptions,
    classifier: Box<dyn ContentClassifier>,
    cache: ClassificationCache,
    next_id: i64,
    summary: IngestSummary,
}

impl<'db> Pipeline<'db> {
    pub fn new(db: &'db Database, options: IngestOptions) -> Self {
        Self {
            db,
            options,
            classifier: Box::new(MagicClassifier),
            cache: ClassificationCache::new(),
            next_id: 0,
            summary: IngestSummary::default(),
        }
    }

    /// Replace the content classifier
    pub fn with_classifier(mut self, classifier: impl ContentClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    /// Ingest every entry of the source
    pub fn run<S: EntrySource + ?Sized>(self, source: &mut S) -> IngestResult<IngestSummary> {
        self.run_with_progress(source, |_, _| {})
    }

    /// Ingest with a progress callback receiving (entries done, total)
    #[instrument(skip_all, fields(classify = self.options.classify_content))]
    pub fn run_with_progress<S, F>(mut self, source: &mut S, mut progress_callback: F) -> IngestResult<IngestSummary>
    where
        S: EntrySource + ?Sized,
        F: FnMut(usize, usize),
    {
        let total = source.len();
        info!(total, "Ingesting archive entries");

        self.db.begin()?;
        for index in 0..total {
            if self.options.is_cancelled() {
                warn!(done = index, total, "Ingestion cancelled");
                self.summary.cancelled = true;
                break;
            }

            self.ingest_entry(source, index)?;

            if self.summary.entries % self.options.commit_interval == 0 {
                self.db.commit()?;
                self.summary.commits += 1;
                info!(entries = self.summary.entries, "Batch committed");
                self.db.begin()?;
            }
            progress_callback(index + 1, total);
        }
        self.db.commit()?;
        self.summary.commits += 1;

        info!(
            entries = self.summary.entries,
            attributes = self.summary.attributes,
            failed = self.summary.failed_entries,
            "Ingestion finished"
        );
        Ok(self.summary)
    }

    fn ingest_entry<S: EntrySource + ?Sized>(&mut self, source: &mut S, index: usize) -> IngestResult<()> {
        // Assigned up front so a failed entry still consumes its ID
        let id = self.next_id;
        self.next_id += 1;
        self.summary.entries += 1;

        let entry = match source.entry(index) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(id, index, error = %e, "Unreadable archive entry skipped");
                self.summary.failed_entries += 1;
                return Ok(());
            }
        };

        let (name, path) = split_entry_path(&entry.name);
        let mut record = EntryRecord {
            id,
            name,
            path,
            full_path: entry.name.clone(),
            is_dir: entry.is_dir,
            size: entry.size,
            offset: entry.header_offset,
            ..Default::default()
        };

        if self.options.classify_content {
            let classification = self.classify(source, index)?;
            if classification.error.is_some() {
                self.summary.unclassified_entries += 1;
            }
            record.mime_id = classification.mime_id;
            record.type_id = classification.type_id;
        }

        let attributes = match decode_extra(&entry.extra) {
            Ok(extra) => {
                let fixed = &extra.fixed;
                record.mtime = Some(fixed.date.modified);
                record.atime = Some(fixed.date.accessed);
                record.ctime = Some(fixed.date.changed);
                record.btime = Some(fixed.date.born);
                record.uid = Some(fixed.owner.uid);
                record.gid = Some(fixed.owner.gid);
                record.inode = Some(fixed.inode.inode);
                record.device = Some(fixed.inode.device);
                record.protection_class = extra.protection_class;
                record.attribute_count = extra.attribute_count();
                extra.attributes
            }
            Err(e) => {
                warn!(id, entry = %entry.name, error = %e, "Extra field not decoded");
                record.error = Some(e.to_string());
                self.summary.failed_entries += 1;
                Vec::new()
            }
        };

        self.persist(&record, &attributes)?;
        debug!(id, entry = %entry.name, attributes = attributes.len(), "Entry ingested");
        Ok(())
    }

    fn classify<S: EntrySource + ?Sized>(&mut self, source: &mut S, index: usize) -> IngestResult<Classification> {
        match source.read_head(index, self.options.sniff_len) {
            Ok(head) => Ok(self.cache.resolve(self.db, self.classifier.as_ref(), &head)?),
            Err(e) => {
                warn!(index, error = %e, "Entry content unreadable for classification");
                Ok(Classification {
                    error: Some(ClassifyError::ClassificationUnavailable(e.to_string())),
                    ..Default::default()
                })
            }
        }
    }

    /// Entry row first, then its attributes
    fn persist(&mut self, record: &EntryRecord, attributes: &[Attribute]) -> IngestResult<()> {
        self.db.insert_entry(record)?;
        for attr in attributes {
            self.db.insert_attribute(record.id, &attr.key, &attr.value, &attr.raw)?;
        }
        self.summary.attributes += attributes.len() as u64;
        Ok(())
    }
}

/// Ingest a zip archive into a new SQLite database
///
/// The archive is validated before the output database is touched.
pub fn ingest_archive(archive_path: &Path, db_path: &Path, options: IngestOptions) -> IngestResult<IngestSummary> {
    let mut source = ZipSource::open(archive_path)?;
    let archive_size = std::fs::metadata(archive_path).ok().map(|m| m.len());
    audit::log_archive_opened(archive_path, source.len(), archive_size);

    let replaced = db_path.exists();
    if replaced {
        if !options.overwrite {
            return Err(IngestError::OutputExists(db_path.display().to_string()));
        }
        std::fs::remove_file(db_path)?;
    }
    let db = Database::open(db_path)?;
    audit::log_database_created(db_path, replaced);

    let audit_ctx = IngestAuditContext::new(archive_path.display().to_string());
    let summary = Pipeline::new(&db, options).run(&mut source)?;
    audit_ctx.completed(&summary);
    Ok(summary)
}
