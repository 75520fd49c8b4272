//! Fixed-block and conditional-block decoding

use tracing::trace;

use super::types::*;
use super::xattr::read_attribute_table;
use crate::common::binary::ByteCursor;
use crate::error::{Block, DecodeError};

/// Decode a complete extra field
///
/// Tags and declared lengths are consumed as-is; only the format version is
/// checked. Bytes left over after the last conditional block are ignored.
pub fn decode_extra(extra: &[u8]) -> Result<ExtraRecord, DecodeError> {
    let mut cursor = ByteCursor::new(extra);
    let fixed = read_fixed_blocks(&mut cursor)?;
    let (protection_class, attributes) = read_conditional_blocks(&mut cursor, &fixed.marker)?;

    if cursor.remaining() > 0 {
        trace!(trailing = cursor.remaining(), "Trailing bytes after extra-field record");
    }

    Ok(ExtraRecord {
        fixed,
        protection_class,
        attributes,
    })
}

// =============================================================================
// Fixed Blocks
// =============================================================================

/// Read the date, owner, inode and format-marker blocks in order
pub fn read_fixed_blocks(cursor: &mut ByteCursor<'_>) -> Result<FixedBlocks, DecodeError> {
    let date = read_date_block(cursor)?;
    let owner = read_owner_block(cursor)?;
    let inode = read_inode_block(cursor)?;
    let marker = read_format_marker(cursor)?;

    if marker.version != FORMAT_VERSION {
        return Err(DecodeError::UnsupportedVersion {
            version: marker.version,
            expected: FORMAT_VERSION,
        });
    }

    Ok(FixedBlocks {
        date,
        owner,
        inode,
        marker,
    })
}

fn read_date_block(cursor: &mut ByteCursor<'_>) -> Result<DateBlock, DecodeError> {
    let block = Block::Date;
    cursor.require(DATE_BLOCK_LEN, block)?;
    Ok(DateBlock {
        tag: cursor.read_array(block)?,
        length: cursor.read_u16_le(block)?,
        flags: cursor.read_u8(block)?,
        modified: cursor.read_u32_le(block)?,
        accessed: cursor.read_u32_le(block)?,
        changed: cursor.read_u32_le(block)?,
        born: cursor.read_u32_le(block)?,
    })
}

fn read_owner_block(cursor: &mut ByteCursor<'_>) -> Result<OwnerBlock, DecodeError> {
    let block = Block::Owner;
    cursor.require(OWNER_BLOCK_LEN, block)?;
    Ok(OwnerBlock {
        tag: cursor.read_array(block)?,
        length: cursor.read_u16_le(block)?,
        version: cursor.read_u8(block)?,
        uid_size: cursor.read_u8(block)?,
        uid: cursor.read_u32_le(block)?,
        gid_size: cursor.read_u8(block)?,
        gid: cursor.read_u32_le(block)?,
    })
}

fn read_inode_block(cursor: &mut ByteCursor<'_>) -> Result<InodeBlock, DecodeError> {
    let block = Block::Inode;
    cursor.require(INODE_BLOCK_LEN, block)?;
    Ok(InodeBlock {
        tag: cursor.read_array(block)?,
        length: cursor.read_u16_le(block)?,
        inode: cursor.read_u64_le(block)?,
        device: cursor.read_u32_le(block)?,
    })
}

fn read_format_marker(cursor: &mut ByteCursor<'_>) -> Result<FormatMarker, DecodeError> {
    let block = Block::FormatMarker;
    cursor.require(FORMAT_MARKER_LEN, block)?;
    Ok(FormatMarker {
        tag: cursor.read_array(block)?,
        length: cursor.read_u16_le(block)?,
        version: cursor.read_u8(block)?,
        flags: cursor.read_u8(block)?,
    })
}

// =============================================================================
// Conditional Blocks
// =============================================================================

/// Read the protection class and attribute table the marker flags announce
///
/// The protection class always precedes the attribute table.
pub fn read_conditional_blocks(
    cursor: &mut ByteCursor<'_>,
    marker: &FormatMarker,
) -> Result<(Option<u32>, Vec<Attribute>), DecodeError> {
    let protection_class = if marker.has_protection_class() {
        Some(cursor.read_u32_le(Block::ProtectionClass)?)
    } else {
        None
    };

    let attributes = if marker.has_attributes() {
        read_attribute_table(cursor)?
    } else {
        Vec::new()
    };

    Ok((protection_class, attributes))
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Builders for synthetic extra-field records

    use super::*;

    #[derive(Clone)]
    pub struct ExtraBuilder {
        pub times: [u32; 4],
        pub uid: u32,
        pub gid: u32,
        pub inode: u64,
        pub device: u32,
        pub version: u8,
        pub flags: u8,
        pub protection_class: u32,
        pub attributes: Vec<(Vec<u8>, Vec<u8>)>,
    }

    impl Default for ExtraBuilder {
        fn default() -> Self {
            Self {
                times: [1_600_000_000, 1_600_000_100, 1_600_000_200, 1_500_000_000],
                uid: 501,
                gid: 20,
                inode: 0x0001_0000_0000_1234,
                device: 0x0100_0004,
                version: FORMAT_VERSION,
                flags: 0,
                protection_class: 3,
                attributes: Vec::new(),
            }
        }
    }

    impl ExtraBuilder {
        pub fn with_flags(mut self, flags: u8) -> Self {
            self.flags = flags;
            self
        }

        pub fn with_protection_class(mut self, class: u32) -> Self {
            self.protection_class = class;
            self
        }

        pub fn with_version(mut self, version: u8) -> Self {
            self.version = version;
            self
        }

        pub fn with_attribute(mut self, key: &str, raw: &[u8]) -> Self {
            self.attributes.push((key.as_bytes().to_vec(), raw.to_vec()));
            self
        }

        pub fn build(&self) -> Vec<u8> {
            let mut out = Vec::new();
            // date
            out.extend_from_slice(b"UT");
            out.extend_from_slice(&17u16.to_le_bytes());
            out.push(0x0F);
            for time in self.times {
                out.extend_from_slice(&time.to_le_bytes());
            }
            // owner
            out.extend_from_slice(b"ux");
            out.extend_from_slice(&11u16.to_le_bytes());
            out.push(1);
            out.push(4);
            out.extend_from_slice(&self.uid.to_le_bytes());
            out.push(4);
            out.extend_from_slice(&self.gid.to_le_bytes());
            // inode
            out.extend_from_slice(b"IN");
            out.extend_from_slice(&12u16.to_le_bytes());
            out.extend_from_slice(&self.inode.to_le_bytes());
            out.extend_from_slice(&self.device.to_le_bytes());
            // format marker
            out.extend_from_slice(b"GK");
            out.extend_from_slice(&2u16.to_le_bytes());
            out.push(self.version);
            out.push(self.flags);

            if self.flags & FLAG_PROTECTION_CLASS != 0 {
                out.extend_from_slice(&self.protection_class.to_le_bytes());
            }
            if self.flags & FLAG_ATTRIBUTES != 0 {
                out.extend_from_slice(&(self.attributes.len() as u32).to_le_bytes());
                for (key, raw) in &self.attributes {
                    let length = (key.len() + 1 + raw.len()) as u32;
                    out.extend_from_slice(&length.to_le_bytes());
                    out.extend_from_slice(key);
                    out.push(0);
                    out.extend_from_slice(raw);
                }
            }
            out
        }
    }
}
