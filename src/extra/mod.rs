//! Extraction extra-field decoder
//!
//! Full-files archives produced by the mobile extraction tool carry a private
//! record in each entry's zip extra field:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Date block (21 bytes)                                        │
//! │  - tag (2), declared length (u16), flags (u8)                │
//! │  - mtime, atime, ctime, btime (u32 epoch seconds each)       │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Owner block (15 bytes)                                       │
//! │  - tag (2), length (u16), version (u8)                       │
//! │  - uid size (u8), uid (u32), gid size (u8), gid (u32)        │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Inode block (16 bytes)                                       │
//! │  - tag (2), length (u16), inode (u64), device id (u32)       │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Format marker (6 bytes)                                      │
//! │  - tag (2), length (u16), version (u8), flags (u8)           │
//! ├──────────────────────────────────────────────────────────────┤
//! │ flags & 0x01: data-protection class (u32)                    │
//! │ flags & 0x02: attribute count (u32), then per attribute:     │
//! │    length (u32), key bytes, 0x00, raw value bytes            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. Only format version 1 is understood.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let record = extra::decode_extra(entry.extra())?;
//! for attr in &record.attributes {
//!     println!("{} = {}", attr.key, attr.value);
//! }
//! ```

mod parser;
mod types;
pub mod xattr;

pub use parser::{decode_extra, read_conditional_blocks, read_fixed_blocks};
pub use types::*;
pub use xattr::{resolve_value, AttributeValue};

#[cfg(test)]
pub(crate) use parser::fixtures;
