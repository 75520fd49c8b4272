//! Type definitions for the extraction extra-field record

use super::xattr::AttributeValue;

// =============================================================================
// Fixed Blocks
// =============================================================================

/// Date block: four epoch-second timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateBlock {
    pub tag: [u8; 2],
    pub length: u16,
    pub flags: u8,
    pub modified: u32,
    pub accessed: u32,
    pub changed: u32,
    pub born: u32,
}

/// Owner block: numeric uid/gid with their declared sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerBlock {
    pub tag: [u8; 2],
    pub length: u16,
    pub version: u8,
    pub uid_size: u8,
    pub uid: u32,
    pub gid_size: u8,
    pub gid: u32,
}

/// Inode block: inode number and device identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeBlock {
    pub tag: [u8; 2],
    pub length: u16,
    pub inode: u64,
    pub device: u32,
}

/// Format marker: record version and the conditional-block flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatMarker {
    pub tag: [u8; 2],
    pub length: u16,
    pub version: u8,
    pub flags: u8,
}

impl FormatMarker {
    pub fn has_protection_class(&self) -> bool {
        self.flags & FLAG_PROTECTION_CLASS != 0
    }

    pub fn has_attributes(&self) -> bool {
        self.flags & FLAG_ATTRIBUTES != 0
    }
}

/// The four always-present blocks, in record order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBlocks {
    pub date: DateBlock,
    pub owner: OwnerBlock,
    pub inode: InodeBlock,
    pub marker: FormatMarker,
}

// =============================================================================
// Decoded Record
// =============================================================================

/// One extended attribute from the attribute table
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub key: String,
    /// Best-effort interpretation of `raw`
    pub value: AttributeValue,
    /// Undecoded bytes, kept verbatim
    pub raw: Vec<u8>,
}

/// Fully decoded extra field of one archive entry
#[derive(Debug, Clone, PartialEq)]
pub struct ExtraRecord {
    pub fixed: FixedBlocks,
    pub protection_class: Option<u32>,
    pub attributes: Vec<Attribute>,
}

impl ExtraRecord {
    pub fn attribute_count(&self) -> u32 {
        self.attributes.len() as u32
    }
}

// =============================================================================
// Constants
// =============================================================================

/// The only format-marker version this decoder understands
pub const FORMAT_VERSION: u8 = 1;

pub const FLAG_PROTECTION_CLASS: u8 = 0x01;
pub const FLAG_ATTRIBUTES: u8 = 0x02;

// Block sizes including the 2-byte tag and 2-byte declared length
pub const DATE_BLOCK_LEN: usize = 21;
pub const OWNER_BLOCK_LEN: usize = 15;
pub const INODE_BLOCK_LEN: usize = 16;
pub const FORMAT_MARKER_LEN: usize = 6;
