// Little-endian cursor over an in-memory extra-field buffer
//
// Every read is bounds-checked and reports which block ran short, so a
// truncated record fails the entry instead of panicking.

use crate::error::{Block, DecodeError};

/// Forward-only reader over a borrowed byte slice
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the current position
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Fail unless `needed` bytes remain; used to check a whole block up front
    pub fn require(&self, needed: usize, block: Block) -> Result<(), DecodeError> {
        if self.remaining() < needed {
            return Err(DecodeError::TruncatedRecord {
                block,
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Basic Reads
    // =========================================================================

    /// Borrow the next `length` bytes
    pub fn read_bytes(&mut self, length: usize, block: Block) -> Result<&'a [u8], DecodeError> {
        self.require(length, block)?;
        let slice = &self.data[self.pos..self.pos + length];
        self.pos += length;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self, block: Block) -> Result<[u8; N], DecodeError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.read_bytes(N, block)?);
        Ok(buf)
    }

    pub fn read_u8(&mut self, block: Block) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>(block)?[0])
    }

    pub fn read_u16_le(&mut self, block: Block) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.read_array(block)?))
    }

    pub fn read_u32_le(&mut self, block: Block) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array(block)?))
    }

    pub fn read_u64_le(&mut self, block: Block) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.read_array(block)?))
    }
}

// =============================================================================
// Fixed-width slice conversions
// =============================================================================

/// Interpret a slice of exactly N bytes as an array
pub fn exact<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
    bytes.try_into().ok()
}

/// Interpret the first N bytes of a slice as an array
pub fn leading<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
    bytes.get(..N).and_then(exact)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_integers() {
        let data = [
            0x42, // u8
            0x34, 0x12, // u16 = 0x1234
            0x78, 0x56, 0x34, 0x12, // u32 = 0x12345678
            0xEF, 0xCD, 0xAB, 0x90, 0x78, 0x56, 0x34, 0x12, // u64
        ];
        let mut cursor = ByteCursor::new(&data);

        assert_eq!(cursor.read_u8(Block::Date).unwrap(), 0x42);
        assert_eq!(cursor.read_u16_le(Block::Date).unwrap(), 0x1234);
        assert_eq!(cursor.read_u32_le(Block::Date).unwrap(), 0x12345678);
        assert_eq!(cursor.read_u64_le(Block::Date).unwrap(), 0x123456789ABCDEF);
        assert_eq!(cursor.remaining(), 0);
        assert_eq!(cursor.position(), data.len());
    }

    #[test]
    fn test_short_read_reports_block() {
        let data = [0x01, 0x02];
        let mut cursor = ByteCursor::new(&data);

        let err = cursor.read_u32_le(Block::Inode).unwrap_err();
        assert_eq!(
            err,
            DecodeError::TruncatedRecord {
                block: Block::Inode,
                needed: 4,
                available: 2
            }
        );
        // Failed reads do not advance
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_slice_helpers() {
        assert_eq!(exact::<2>(&[1, 2]), Some([1, 2]));
        assert_eq!(exact::<2>(&[1, 2, 3]), None);
        assert_eq!(leading::<2>(&[1, 2, 3]), Some([1, 2]));
        assert_eq!(leading::<4>(&[1, 2, 3]), None);
    }
}
