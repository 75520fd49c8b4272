//! Content classification with label deduplication
//!
//! Entry content is labelled twice: a MIME type and a human-readable file type.
//! Each distinct label is stored once in its table; the cache maps labels to
//! their row IDs so repeated labels cost a hash lookup instead of a query.

use std::collections::HashMap;

use rusqlite::Result as SqlResult;
use tracing::{trace, warn};

use crate::common::magic::detect_or_unknown;
use crate::database::{Database, LabelTable};
use crate::error::ClassifyError;

/// Labels content from its leading bytes
pub trait ContentClassifier {
    fn mime_type(&self, data: &[u8]) -> Result<String, ClassifyError>;
    fn description(&self, data: &[u8]) -> Result<String, ClassifyError>;
}

/// Signature-based classifier backed by [`crate::common::magic`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MagicClassifier;

impl ContentClassifier for MagicClassifier {
    fn mime_type(&self, data: &[u8]) -> Result<String, ClassifyError> {
        Ok(detect_or_unknown(data).mime)
    }

    fn description(&self, data: &[u8]) -> Result<String, ClassifyError> {
        Ok(detect_or_unknown(data).description)
    }
}

/// Label IDs for one entry
///
/// Either ID may be missing when the classifier failed; `error` keeps the
/// first failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub mime_id: Option<i64>,
    pub type_id: Option<i64>,
    pub error: Option<ClassifyError>,
}

/// Label-to-ID index over the `mtypes` and `ftypes` tables
#[derive(Debug, Default)]
pub struct ClassificationCache {
    mime: HashMap<String, i64>,
    types: HashMap<String, i64>,
}

impl ClassificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn ids(&self, table: LabelTable) -> &HashMap<String, i64> {
        match table {
            LabelTable::Mime => &self.mime,
            LabelTable::Type => &self.types,
        }
    }

    /// Number of distinct labels seen in a table
    pub fn len(&self, table: LabelTable) -> usize {
        self.ids(table).len()
    }

    /// ID for a label, storing it on first sighting
    pub fn label_id(&mut self, db: &Database, table: LabelTable, label: &str) -> SqlResult<i64> {
        if let Some(id) = self.ids(table).get(label) {
            return Ok(*id);
        }
        let id = db.lookup_or_insert_label(table, label)?;
        trace!(?table, label, id, "New label");
        let ids = match table {
            LabelTable::Mime => &mut self.mime,
            LabelTable::Type => &mut self.types,
        };
        ids.insert(label.to_string(), id);
        Ok(id)
    }

    /// Classify a content buffer and resolve both label IDs
    ///
    /// Classifier failures are recorded, not returned; only storage errors fail.
    pub fn resolve(
        &mut self,
        db: &Database,
        classifier: &dyn ContentClassifier,
        data: &[u8],
    ) -> SqlResult<Classification> {
        let mut result = Classification::default();

        match classifier.mime_type(data) {
            Ok(mime) => result.mime_id = Some(self.label_id(db, LabelTable::Mime, &mime)?),
            Err(e) => {
                warn!(error = %e, "MIME classification failed");
                result.error = Some(e);
            }
        }

        match classifier.description(data) {
            Ok(description) => result.type_id = Some(self.label_id(db, LabelTable::Type, &description)?),
            Err(e) => {
                warn!(error = %e, "File type classification failed");
                result.error.get_or_insert(e);
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
pub(crate) mod stub {
    use super::*;

    /// Classifier whose description fails on content starting with 0xEE
    pub struct FlakyClassifier;

    impl ContentClassifier for FlakyClassifier {
        fn mime_type(&self, data: &[u8]) -> Result<String, ClassifyError> {
            MagicClassifier.mime_type(data)
        }

        fn description(&self, data: &[u8]) -> Result<String, ClassifyError> {
            if data.first() == Some(&0xEE) {
                return Err(ClassifyError::ClassificationUnavailable("corrupt content".into()));
            }
            MagicClassifier.description(data)
        }
    }
}
