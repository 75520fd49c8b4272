//! Ingestion run configuration

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Content bytes handed to the classifier
pub const DEFAULT_SNIFF_LEN: usize = 2048;
/// Entries written per transaction
pub const DEFAULT_COMMIT_INTERVAL: u64 = 10_000;

/// Options for one ingestion run
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Classify entry content (reads every entry; slow)
    pub classify_content: bool,
    /// Bytes of content read for classification
    pub sniff_len: usize,
    /// Commit after this many entries
    pub commit_interval: u64,
    /// Replace an existing output database
    pub overwrite: bool,
    /// Checked between entries; set to stop the run early
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            classify_content: false,
            sniff_len: DEFAULT_SNIFF_LEN,
            commit_interval: DEFAULT_COMMIT_INTERVAL,
            overwrite: false,
            cancel: None,
        }
    }
}

impl IngestOptions {
    /// Builder: enable content classification
    pub fn with_classification(mut self, enabled: bool) -> Self {
        self.classify_content = enabled;
        self
    }

    /// Builder: set commit cadence (minimum 1)
    pub fn with_commit_interval(mut self, interval: u64) -> Self {
        self.commit_interval = interval.max(1);
        self
    }

    /// Builder: set classification read length
    pub fn with_sniff_len(mut self, len: usize) -> Self {
        self.sniff_len = len;
        self
    }

    /// Builder: replace an existing output database
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Builder: attach a cancellation flag
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = IngestOptions::default();
        assert!(!options.classify_content);
        assert_eq!(options.sniff_len, 2048);
        assert_eq!(options.commit_interval, 10_000);
        assert!(!options.is_cancelled());
    }

    #[test]
    fn test_builder() {
        let flag = Arc::new(AtomicBool::new(false));
        let options = IngestOptions::default()
            .with_classification(true)
            .with_commit_interval(0)
            .with_cancel_flag(flag.clone());

        assert!(options.classify_content);
        assert_eq!(options.commit_interval, 1);
        assert!(!options.is_cancelled());
        flag.store(true, Ordering::Relaxed);
        assert!(options.is_cancelled());
    }
}
