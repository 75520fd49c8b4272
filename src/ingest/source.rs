//! Archive entry sources
//!
//! The pipeline only needs per-entry metadata, the raw extra field and the
//! first few content bytes; [`EntrySource`] is that seam. [`ZipSource`] backs
//! it with the central directory reader in [`super::central`].

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use tracing::debug;

use super::central::{read_central_directory, read_content_head, CentralRecord};
use crate::error::{IngestError, IngestResult};

/// Metadata of one archive member
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Full path as stored in the archive
    pub name: String,
    pub is_dir: bool,
    /// Uncompressed size
    pub size: u64,
    /// Offset of the local file header
    pub header_offset: u64,
    /// Raw extra-field bytes
    pub extra: Vec<u8>,
}

/// Indexed access to archive entries in archive order
pub trait EntrySource {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&mut self, index: usize) -> IngestResult<ArchiveEntry>;

    /// Up to `limit` leading bytes of the entry's content
    fn read_head(&mut self, index: usize, limit: usize) -> IngestResult<Vec<u8>>;
}

/// Zip archive backed entry source
///
/// The central directory is read once up front; extra fields are kept exactly
/// as stored.
pub struct ZipSource<R: Read + Seek> {
    reader: R,
    records: Vec<CentralRecord>,
}

impl ZipSource<BufReader<File>> {
    /// Open a zip file; an unwalkable directory is `InvalidArchive`
    pub fn open(path: &Path) -> IngestResult<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file)).map_err(|e| match e {
            IngestError::Malformed(reason) => IngestError::InvalidArchive {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }
}

impl<R: Read + Seek> ZipSource<R> {
    pub fn new(mut reader: R) -> IngestResult<Self> {
        let records = read_central_directory(&mut reader)?;
        debug!(entries = records.len(), "Zip central directory read");
        Ok(Self { reader, records })
    }

    fn record(&self, index: usize) -> IngestResult<&CentralRecord> {
        self.records
            .get(index)
            .ok_or_else(|| IngestError::Malformed(format!("no entry at index {index}")))
    }
}

impl<R: Read + Seek> EntrySource for ZipSource<R> {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn entry(&mut self, index: usize) -> IngestResult<ArchiveEntry> {
        Ok(self.record(index)?.entry.clone())
    }

    fn read_head(&mut self, index: usize, limit: usize) -> IngestResult<Vec<u8>> {
        let record = self.records.get(index).ok_or_else(|| {
            IngestError::Malformed(format!("no entry at index {index}"))
        })?;
        read_content_head(&mut self.reader, record, limit)
    }
}

/// Split a stored path into (name, parent), ignoring trailing slashes
pub fn split_entry_path(full_path: &str) -> (String, String) {
    let trimmed = full_path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, name)) => (name.to_string(), parent.to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}


#[cfg(test)]
mod tests {
    use super::memory::build_zip;
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn test_split_entry_path() {
        assert_eq!(split_entry_path("a/b/c.txt"), ("c.txt".into(), "a/b".into()));
        assert_eq!(split_entry_path("a/b/"), ("b".into(), "a".into()));
        assert_eq!(split_entry_path("top.txt"), ("top.txt".into(), String::new()));
        assert_eq!(split_entry_path("dir//"), ("dir".into(), String::new()));
    }

    #[test]
    fn test_zip_source_entries() {
        let mut source = ZipSource::new(Cursor::new(build_zip())).unwrap();
        assert_eq!(source.len(), 2);

        let dir = source.entry(0).unwrap();
        assert_eq!(dir.name, "private/var/");
        assert!(dir.is_dir);
        assert_eq!(dir.header_offset, 0);

        let file = source.entry(1).unwrap();
        assert!(!file.is_dir);
        assert_eq!(file.size, 21);
        assert!(file.header_offset > 0);

        assert_eq!(source.read_head(1, 5).unwrap(), b"hello");
        assert_eq!(source.read_head(1, 2048).unwrap().len(), 21);
    }

    #[test]
    fn test_open_rejects_non_zip() {
        let mut temp = tempfile::NamedTempFile::new().unwrap();
        temp.write_all(b"definitely not a zip archive").unwrap();

        match ZipSource::open(temp.path()) {
            Err(IngestError::InvalidArchive { .. }) => {}
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("non-zip accepted"),
        }
    }
}
