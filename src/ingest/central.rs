//! Zip central directory reader
//!
//! Extraction archives put a vendor record in each entry's extra field that
//! is not a valid sequence of tagged extra blocks. General-purpose zip readers
//! interpret (and reject or rewrite) those blocks, so the directory is walked
//! here and every extra field is kept byte for byte.
//!
//! ## Layout
//! ```text
//! [Local File Header 1][File Data 1] ... [Local File Header n][File Data n]
//! [Central Directory Header 1] ... [Central Directory Header n]
//! [Zip64 EOCD Record]  (optional)
//! [Zip64 EOCD Locator] (optional)
//! [End of Central Directory (EOCD)]
//! ```
//!
//! ## Central Directory Header (46 bytes + variable)
//! | Offset | Size | Field              |
//! |--------|------|--------------------|
//! | 0x00   | 4    | Signature (PK\x01\x02) |
//! | 0x08   | 2    | Flags              |
//! | 0x0A   | 2    | Compression Method |
//! | 0x14   | 4    | Compressed Size    |
//! | 0x18   | 4    | Uncompressed Size  |
//! | 0x1C   | 2    | Name Length        |
//! | 0x1E   | 2    | Extra Length       |
//! | 0x20   | 2    | Comment Length     |
//! | 0x2A   | 4    | Local Header Offset |

use std::io::{self, Read, Seek, SeekFrom};

use flate2::read::DeflateDecoder;
use tracing::{debug, warn};

use super::source::ArchiveEntry;
use crate::error::{IngestError, IngestResult};

pub const EOCD_SIG: &[u8; 4] = b"PK\x05\x06";
pub const ZIP64_LOCATOR_SIG: &[u8; 4] = b"PK\x06\x07";
pub const ZIP64_EOCD_SIG: &[u8; 4] = b"PK\x06\x06";
pub const CENTRAL_HEADER_SIG: &[u8; 4] = b"PK\x01\x02";
pub const LOCAL_HEADER_SIG: &[u8; 4] = b"PK\x03\x04";

pub const EOCD_LEN: usize = 22;
pub const ZIP64_LOCATOR_LEN: usize = 20;
pub const ZIP64_EOCD_LEN: usize = 56;
pub const CENTRAL_HEADER_LEN: usize = 46;
pub const LOCAL_HEADER_LEN: usize = 30;

/// EOCD plus the longest possible archive comment
const EOCD_SEARCH_LEN: u64 = EOCD_LEN as u64 + u16::MAX as u64;
const ZIP64_EXTRA_TAG: u16 = 0x0001;
const U32_SENTINEL: u32 = u32::MAX;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;
const FLAG_ENCRYPTED: u16 = 0x0001;

/// Where the central directory lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryLocation {
    pub entries: u64,
    pub size: u64,
    pub offset: u64,
}

/// One central directory record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralRecord {
    pub entry: ArchiveEntry,
    pub flags: u16,
    pub method: u16,
    pub compressed_size: u64,
}

fn le_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn le_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn le_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

fn malformed(reason: impl Into<String>) -> IngestError {
    IngestError::Malformed(reason.into())
}

/// `read_exact` that reports a short read as a malformed archive
fn read_exact_or<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> IngestResult<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => malformed(format!("truncated {what}")),
        _ => IngestError::Io(e),
    })
}

// =============================================================================
// End of Central Directory
// =============================================================================

/// Locate the central directory from the (Zip64) end records
pub fn locate_directory<R: Read + Seek>(reader: &mut R) -> IngestResult<DirectoryLocation> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    let search_len = file_len.min(EOCD_SEARCH_LEN);
    let search_start = file_len - search_len;

    let mut tail = vec![0u8; search_len as usize];
    reader.seek(SeekFrom::Start(search_start))?;
    reader.read_exact(&mut tail)?;

    // Last signature wins; comments may contain earlier look-alikes
    let eocd_pos = (0..tail.len().saturating_sub(EOCD_LEN - 1))
        .rev()
        .find(|&i| &tail[i..i + 4] == EOCD_SIG)
        .ok_or_else(|| malformed("end of central directory not found"))?;
    let eocd = &tail[eocd_pos..eocd_pos + EOCD_LEN];

    let mut location = DirectoryLocation {
        entries: le_u16(eocd, 10) as u64,
        size: le_u32(eocd, 12) as u64,
        offset: le_u32(eocd, 16) as u64,
    };

    let eocd_offset = search_start + eocd_pos as u64;
    if let Some(zip64) = read_zip64_end(reader, eocd_offset)? {
        location = zip64;
    }

    if location.offset.saturating_add(location.size) > eocd_offset {
        return Err(malformed(format!(
            "central directory at {} ({} bytes) overruns its end record at {}",
            location.offset, location.size, eocd_offset
        )));
    }

    debug!(
        entries = location.entries,
        offset = location.offset,
        size = location.size,
        "Central directory located"
    );
    Ok(location)
}

/// Zip64 end record via the locator just before the EOCD, if present
fn read_zip64_end<R: Read + Seek>(reader: &mut R, eocd_offset: u64) -> IngestResult<Option<DirectoryLocation>> {
    let Some(locator_offset) = eocd_offset.checked_sub(ZIP64_LOCATOR_LEN as u64) else {
        return Ok(None);
    };
    let mut locator = [0u8; ZIP64_LOCATOR_LEN];
    reader.seek(SeekFrom::Start(locator_offset))?;
    reader.read_exact(&mut locator)?;
    if &locator[..4] != ZIP64_LOCATOR_SIG {
        return Ok(None);
    }

    let record_offset = le_u64(&locator, 8);
    let mut record = [0u8; ZIP64_EOCD_LEN];
    reader.seek(SeekFrom::Start(record_offset))?;
    read_exact_or(reader, &mut record, "Zip64 end of central directory")?;
    if &record[..4] != ZIP64_EOCD_SIG {
        return Err(malformed(format!("bad Zip64 end record signature at {record_offset}")));
    }

    Ok(Some(DirectoryLocation {
        entries: le_u64(&record, 32),
        size: le_u64(&record, 40),
        offset: le_u64(&record, 48),
    }))
}

// =============================================================================
// Central Directory Records
// =============================================================================

/// Read every central directory record in archive order
pub fn read_central_directory<R: Read + Seek>(reader: &mut R) -> IngestResult<Vec<CentralRecord>> {
    let location = locate_directory(reader)?;
    reader.seek(SeekFrom::Start(location.offset))?;

    // Each record is at least a fixed header; don't trust the count for allocation
    let capacity = location.entries.min(location.size / CENTRAL_HEADER_LEN as u64) as usize;
    let mut records = Vec::with_capacity(capacity);
    for index in 0..location.entries {
        records.push(read_central_record(reader, index)?);
    }
    Ok(records)
}

fn read_central_record<R: Read>(reader: &mut R, index: u64) -> IngestResult<CentralRecord> {
    let mut header = [0u8; CENTRAL_HEADER_LEN];
    read_exact_or(reader, &mut header, "central directory header")?;
    if &header[..4] != CENTRAL_HEADER_SIG {
        return Err(malformed(format!("bad central directory signature for entry {index}")));
    }

    let flags = le_u16(&header, 8);
    let method = le_u16(&header, 10);
    let compressed = le_u32(&header, 20);
    let uncompressed = le_u32(&header, 24);
    let name_len = le_u16(&header, 28) as usize;
    let extra_len = le_u16(&header, 30) as usize;
    let comment_len = le_u16(&header, 32) as usize;
    let header_offset = le_u32(&header, 42);

    let mut name = vec![0u8; name_len];
    read_exact_or(reader, &mut name, "entry name")?;
    let mut extra = vec![0u8; extra_len];
    read_exact_or(reader, &mut extra, "extra field")?;
    let mut comment = vec![0u8; comment_len];
    read_exact_or(reader, &mut comment, "entry comment")?;

    let mut sizes = Zip64Sizes {
        uncompressed: uncompressed as u64,
        compressed: compressed as u64,
        header_offset: header_offset as u64,
    };
    let saturated = [uncompressed, compressed, header_offset].contains(&U32_SENTINEL);
    if saturated && !sizes.apply_zip64_extra(&extra, uncompressed, compressed, header_offset) {
        warn!(index, "Zip64 sizes not found in extra field; using 32-bit values");
    }

    let name = String::from_utf8_lossy(&name).into_owned();
    Ok(CentralRecord {
        entry: ArchiveEntry {
            is_dir: name.ends_with('/'),
            name,
            size: sizes.uncompressed,
            header_offset: sizes.header_offset,
            extra,
        },
        flags,
        method,
        compressed_size: sizes.compressed,
    })
}

struct Zip64Sizes {
    uncompressed: u64,
    compressed: u64,
    header_offset: u64,
}

impl Zip64Sizes {
    /// Replace saturated 32-bit fields from a Zip64 extra block
    ///
    /// The extra field is only scanned, never modified. Scanning stops at the
    /// first block whose length overruns the field.
    fn apply_zip64_extra(&mut self, extra: &[u8], uncompressed: u32, compressed: u32, offset: u32) -> bool {
        let mut pos = 0;
        while pos + 4 <= extra.len() {
            let tag = le_u16(extra, pos);
            let len = le_u16(extra, pos + 2) as usize;
            let body_start = pos + 4;
            if body_start + len > extra.len() {
                return false;
            }
            if tag == ZIP64_EXTRA_TAG {
                let body = &extra[body_start..body_start + len];
                let mut at = 0;
                // Present in this order, and only for the saturated fields
                for (saturated, field) in [
                    (uncompressed == U32_SENTINEL, &mut self.uncompressed),
                    (compressed == U32_SENTINEL, &mut self.compressed),
                    (offset == U32_SENTINEL, &mut self.header_offset),
                ] {
                    if saturated {
                        if at + 8 > body.len() {
                            return false;
                        }
                        *field = le_u64(body, at);
                        at += 8;
                    }
                }
                return true;
            }
            pos = body_start + len;
        }
        false
    }
}

// =============================================================================
// Entry Content
// =============================================================================

/// Up to `limit` leading bytes of an entry's uncompressed content
pub fn read_content_head<R: Read + Seek>(reader: &mut R, record: &CentralRecord, limit: usize) -> IngestResult<Vec<u8>> {
    if record.flags & FLAG_ENCRYPTED != 0 {
        return Err(malformed(format!("{} is encrypted", record.entry.name)));
    }

    let mut local = [0u8; LOCAL_HEADER_LEN];
    reader.seek(SeekFrom::Start(record.entry.header_offset))?;
    read_exact_or(reader, &mut local, "local file header")?;
    if &local[..4] != LOCAL_HEADER_SIG {
        return Err(malformed(format!(
            "bad local header signature at {}",
            record.entry.header_offset
        )));
    }
    // Local name/extra lengths may differ from the central copies
    let skip = le_u16(&local, 26) as i64 + le_u16(&local, 28) as i64;
    reader.seek(SeekFrom::Current(skip))?;

    let data = reader.take(record.compressed_size);
    let mut head = Vec::with_capacity(limit.min(record.entry.size as usize));
    match record.method {
        METHOD_STORED => data.take(limit as u64).read_to_end(&mut head)?,
        METHOD_DEFLATED => DeflateDecoder::new(data).take(limit as u64).read_to_end(&mut head)?,
        other => return Err(malformed(format!("unsupported compression method {other}"))),
    };
    Ok(head)
}


#[cfg(test)]
mod tests {
    use super::fixtures::{build_raw_zip, RawEntry};
    use super::*;
    use crate::extra::fixtures::ExtraBuilder;
    use std::io::Cursor;

    #[test]
    fn test_extra_field_kept_verbatim() {
        // "UT" date tag with a length general zip readers reject, and a
        // protection class of 1 that looks like a Zip64 block tag
        let extra = ExtraBuilder::default().with_flags(1).with_protection_class(1).build();
        assert_eq!(&extra[..2], b"UT");
        let zip = build_raw_zip(&[RawEntry { name: "a.txt", extra: extra.clone(), content: b"abc" }]);

        let records = read_central_directory(&mut Cursor::new(zip)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entry.extra, extra);
        let decoded = crate::extra::decode_extra(&records[0].entry.extra).unwrap();
        assert_eq!(decoded.protection_class, Some(1));
        assert_eq!(records[0].entry.size, 3);
        assert_eq!(records[0].entry.header_offset, 0);
    }

    #[test]
    fn test_directory_with_comment() {
        let mut zip = build_raw_zip(&[
            RawEntry { name: "d/", extra: Vec::new(), content: b"" },
            RawEntry { name: "d/f", extra: Vec::new(), content: b"xyz" },
        ]);
        // Append an archive comment containing a fake EOCD signature
        let comment = b"PK\x05\x06 not really";
        let len = zip.len();
        zip[len - 2..].copy_from_slice(&(comment.len() as u16).to_le_bytes());
        zip.extend_from_slice(comment);

        let records = read_central_directory(&mut Cursor::new(zip)).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].entry.is_dir);
        assert_eq!(records[1].entry.name, "d/f");
        assert_eq!(records[1].entry.header_offset, (LOCAL_HEADER_LEN + 2) as u64);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            read_central_directory(&mut Cursor::new(b"not a zip at all".to_vec())),
            Err(IngestError::Malformed(_))
        ));

        let mut zip = build_raw_zip(&[RawEntry { name: "a", extra: Vec::new(), content: b"" }]);
        // Corrupt the central header signature
        let central = LOCAL_HEADER_LEN + 1;
        zip[central] = b'X';
        assert!(matches!(
            read_central_directory(&mut Cursor::new(zip)),
            Err(IngestError::Malformed(_))
        ));
    }

    #[test]
    fn test_zip64_extra_sizes() {
        let mut sizes = Zip64Sizes { uncompressed: 0, compressed: 0, header_offset: 7 };
        let mut extra = Vec::new();
        extra.extend_from_slice(b"UT");
        extra.extend_from_slice(&1u16.to_le_bytes());
        extra.push(0);
        extra.extend_from_slice(&ZIP64_EXTRA_TAG.to_le_bytes());
        extra.extend_from_slice(&16u16.to_le_bytes());
        extra.extend_from_slice(&5_000_000_000u64.to_le_bytes());
        extra.extend_from_slice(&4_900_000_000u64.to_le_bytes());

        assert!(sizes.apply_zip64_extra(&extra, U32_SENTINEL, U32_SENTINEL, 7));
        assert_eq!(sizes.uncompressed, 5_000_000_000);
        assert_eq!(sizes.compressed, 4_900_000_000);
        assert_eq!(sizes.header_offset, 7);

        // Overrunning block length stops the scan
        assert!(!sizes.apply_zip64_extra(&[0x01, 0x00, 0xFF, 0x00], U32_SENTINEL, 0, 0));
    }

    #[test]
    fn test_read_stored_and_deflated_heads() {
        let zip = build_raw_zip(&[RawEntry { name: "s.txt", extra: vec![1, 2, 3], content: b"stored body" }]);
        let mut reader = Cursor::new(zip);
        let records = read_central_directory(&mut reader).unwrap();
        assert_eq!(read_content_head(&mut reader, &records[0], 6).unwrap(), b"stored");

        let zip = crate::ingest::source::memory::build_zip();
        let mut reader = Cursor::new(zip);
        let records = read_central_directory(&mut reader).unwrap();
        assert_eq!(records[1].method, METHOD_DEFLATED);
        assert_eq!(read_content_head(&mut reader, &records[1], 5).unwrap(), b"hello");
        assert_eq!(read_content_head(&mut reader, &records[1], 2048).unwrap().len(), 21);
    }
}
