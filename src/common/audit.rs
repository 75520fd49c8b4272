//! Forensic Audit Logging
//!
//! Chain-of-custody records for ingestion runs. Everything here logs under
//! the `forensic_audit` target so it can be routed separately via `RUST_LOG`.

use std::path::Path;
use tracing::{info, warn};

use crate::ingest::IngestSummary;

/// Log the source archive being opened for metadata ingestion
pub fn log_archive_opened(path: &Path, entry_count: usize, archive_size: Option<u64>) {
    info!(
        target: "forensic_audit",
        operation = "archive_open",
        path = %path.display(),
        entry_count = entry_count,
        archive_size = archive_size.unwrap_or(0),
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Evidence archive opened"
    );
}

/// Log creation of the output database
pub fn log_database_created(path: &Path, replaced: bool) {
    if replaced {
        warn!(
            target: "forensic_audit",
            operation = "database_replace",
            path = %path.display(),
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "Existing output database replaced"
        );
    }
    info!(
        target: "forensic_audit",
        operation = "database_create",
        path = %path.display(),
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Output database created"
    );
}

/// Audit context spanning one ingestion run
pub struct IngestAuditContext {
    pub archive: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl IngestAuditContext {
    pub fn new(archive: impl Into<String>) -> Self {
        let ctx = Self {
            archive: archive.into(),
            started_at: chrono::Utc::now(),
        };

        info!(
            target: "forensic_audit",
            operation = "ingest_start",
            archive = %ctx.archive,
            timestamp = %ctx.started_at.to_rfc3339(),
            "Metadata ingestion started"
        );

        ctx
    }

    pub fn completed(&self, summary: &IngestSummary) {
        let duration = chrono::Utc::now() - self.started_at;
        info!(
            target: "forensic_audit",
            operation = "ingest_complete",
            archive = %self.archive,
            entries = summary.entries,
            attributes = summary.attributes,
            failed_entries = summary.failed_entries,
            cancelled = summary.cancelled,
            duration_secs = duration.num_seconds(),
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "Metadata ingestion completed"
        );
    }
}
