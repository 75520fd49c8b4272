//! File type detection via magic signatures
//!
//! Detects file types from header bytes without relying on extensions.
//! Essential for forensic analysis where file extensions may be incorrect or missing.
//! Produces the MIME label and the human-readable description stored in the
//! MIME/type label tables.

use serde::Serialize;

// =============================================================================
// File Type Structures
// =============================================================================

/// Detected file type information
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileType {
    /// MIME type (e.g., "application/pdf")
    pub mime: String,
    /// Human-readable description
    pub description: String,
}

impl FileType {
    fn new(mime: &str, description: &str) -> Self {
        Self {
            mime: mime.to_string(),
            description: description.to_string(),
        }
    }
}

/// Label used for empty content
pub const EMPTY: (&str, &str) = ("application/x-empty", "empty");
/// Label used for content no signature matches
pub const UNKNOWN: (&str, &str) = ("application/octet-stream", "data");

// (offset, signature, mime, description), checked in order
const SIGNATURES: &[(usize, &[u8], &str, &str)] = &[
    // Images
    (0, &[0xFF, 0xD8, 0xFF], "image/jpeg", "JPEG image data"),
    (0, &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A], "image/png", "PNG image data"),
    (0, b"GIF87a", "image/gif", "GIF image data, version 87a"),
    (0, b"GIF89a", "image/gif", "GIF image data, version 89a"),
    (0, &[0x49, 0x49, 0x2A, 0x00], "image/tiff", "TIFF image data, little-endian"),
    (0, &[0x4D, 0x4D, 0x00, 0x2A], "image/tiff", "TIFF image data, big-endian"),
    (0, b"BM", "image/bmp", "PC bitmap"),
    // Documents
    (0, b"%PDF", "application/pdf", "PDF document"),
    (0, b"{\\rtf", "text/rtf", "Rich Text Format data"),
    // Apple platform
    (0, b"bplist00", "application/x-bplist", "Apple binary property list"),
    (0, b"SQLite format 3\x00", "application/x-sqlite3", "SQLite 3.x database"),
    // Archives
    (0, &[0x50, 0x4B, 0x03, 0x04], "application/zip", "Zip archive data"),
    (0, &[0x1F, 0x8B], "application/gzip", "gzip compressed data"),
    (0, &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C], "application/x-7z-compressed", "7-zip archive data"),
    (0, &[0x28, 0xB5, 0x2F, 0xFD], "application/zstd", "Zstandard compressed data"),
    (0, &[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00], "application/x-xz", "XZ compressed data"),
    // Executables
    (0, &[0xCF, 0xFA, 0xED, 0xFE], "application/x-mach-binary", "Mach-O 64-bit executable"),
    (0, &[0xCE, 0xFA, 0xED, 0xFE], "application/x-mach-binary", "Mach-O executable"),
    (0, &[0xCA, 0xFE, 0xBA, 0xBE], "application/x-mach-binary", "Mach-O universal binary"),
    (0, &[0x7F, 0x45, 0x4C, 0x46], "application/x-executable", "ELF executable"),
    // Audio / video
    (0, b"ID3", "audio/mpeg", "Audio file with ID3 tag"),
    (0, b"fLaC", "audio/flac", "FLAC audio bitstream data"),
    (0, b"OggS", "audio/ogg", "Ogg data"),
    (0, b"#!AMR", "audio/amr", "Adaptive Multi-Rate Codec"),
    // Text
    (0, b"<?xml", "text/xml", "XML document text"),
];

// =============================================================================
// Magic Detection
// =============================================================================

/// Detect file type from header bytes
///
/// Returns None if no signature matches; see [`detect_or_unknown`] for the
/// labelled fallback.
pub fn detect_file_type(header: &[u8]) -> Option<FileType> {
    if header.is_empty() {
        return None;
    }

    for (offset, signature, mime, description) in SIGNATURES {
        if header.get(*offset..*offset + signature.len()) == Some(*signature) {
            return Some(FileType::new(mime, description));
        }
    }

    // ISO base media: ....ftyp<brand>
    if header.len() >= 12 && header[4..8] == *b"ftyp" {
        return Some(match &header[8..12] {
            b"heic" | b"heix" | b"hevc" | b"mif1" => FileType::new("image/heic", "ISO Media, HEIF Image"),
            b"qt  " => FileType::new("video/quicktime", "ISO Media, Apple QuickTime movie"),
            b"M4A " => FileType::new("audio/x-m4a", "ISO Media, Apple iTunes AAC-LC (.M4A) Audio"),
            _ => FileType::new("video/mp4", "ISO Media"),
        });
    }

    // Text heuristics
    if let Ok(text) = std::str::from_utf8(header) {
        if text.chars().all(|c| !c.is_control() || c.is_ascii_whitespace()) {
            let description = if text.is_ascii() { "ASCII text" } else { "Unicode text, UTF-8 text" };
            return Some(FileType::new("text/plain", description));
        }
    }

    None
}

/// Detect file type, falling back to the empty/unknown labels
pub fn detect_or_unknown(header: &[u8]) -> FileType {
    if header.is_empty() {
        return FileType::new(EMPTY.0, EMPTY.1);
    }
    detect_file_type(header).unwrap_or_else(|| FileType::new(UNKNOWN.0, UNKNOWN.1))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_jpeg() {
        let header = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        let ft = detect_file_type(&header).unwrap();
        assert_eq!(ft.mime, "image/jpeg");
    }

    #[test]
    fn test_detect_bplist() {
        let ft = detect_file_type(b"bplist00\xd1\x01\x02").unwrap();
        assert_eq!(ft.mime, "application/x-bplist");
    }

    #[test]
    fn test_detect_sqlite() {
        let header = b"SQLite format 3\x00";
        let ft = detect_file_type(header).unwrap();
        assert_eq!(ft.mime, "application/x-sqlite3");
    }

    #[test]
    fn test_detect_heic() {
        let header = b"\x00\x00\x00\x18ftypheic\x00\x00\x00\x00";
        assert_eq!(detect_file_type(header).unwrap().mime, "image/heic");
    }

    #[test]
    fn test_detect_text() {
        let ft = detect_file_type(b"hello world\n").unwrap();
        assert_eq!(ft.mime, "text/plain");
        assert_eq!(ft.description, "ASCII text");
    }

    #[test]
    fn test_unknown_and_empty() {
        assert!(detect_file_type(&[0x00, 0x01, 0x02, 0x03]).is_none());
        assert_eq!(detect_or_unknown(&[0x00, 0x01]).mime, UNKNOWN.0);
        assert_eq!(detect_or_unknown(&[]).description, EMPTY.1);
    }
}
