//! Group descriptor decoder (part of C2).

use crate::consts::{GROUP_DESC_32_SIZE, GROUP_DESC_64_SIZE};
use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// A block group descriptor: locates the bitmaps and inode table for one group.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupDescriptor {
    pub block_bitmap: u64,
    pub inode_bitmap: u64,
    pub inode_table: u64,
    pub free_blocks_count: u32,
    pub free_inodes_count: u32,
    pub used_dirs_count: u32,
}

impl GroupDescriptor {
    /// Decodes a descriptor from a 32- or 64-byte slice. The hi halves default to
    /// zero when only the 32-byte (classic) layout is present.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != GROUP_DESC_32_SIZE && data.len() != GROUP_DESC_64_SIZE {
            return Err(Error::Format(format!(
                "group descriptor must be {GROUP_DESC_32_SIZE} or {GROUP_DESC_64_SIZE} bytes, got {}",
                data.len()
            )));
        }

        let mut c = Cursor::new(data);
        let block_bitmap_lo = c.read_u32::<LittleEndian>()?;
        let inode_bitmap_lo = c.read_u32::<LittleEndian>()?;
        let inode_table_lo = c.read_u32::<LittleEndian>()?;
        let free_blocks_count_lo = c.read_u16::<LittleEndian>()?;
        let free_inodes_count_lo = c.read_u16::<LittleEndian>()?;
        let used_dirs_count_lo = c.read_u16::<LittleEndian>()?;
        let _flags = c.read_u16::<LittleEndian>()?;
        let _exclude_bitmap_lo = c.read_u32::<LittleEndian>()?;
        let _block_bitmap_csum_lo = c.read_u16::<LittleEndian>()?;
        let _inode_bitmap_csum_lo = c.read_u16::<LittleEndian>()?;
        let _itable_unused_lo = c.read_u16::<LittleEndian>()?;
        let _checksum = c.read_u16::<LittleEndian>()?;

        let (block_bitmap_hi, inode_bitmap_hi, inode_table_hi, free_blocks_count_hi, free_inodes_count_hi, used_dirs_count_hi) =
            if data.len() == GROUP_DESC_64_SIZE {
                let block_bitmap_hi = c.read_u32::<LittleEndian>()?;
                let inode_bitmap_hi = c.read_u32::<LittleEndian>()?;
                let inode_table_hi = c.read_u32::<LittleEndian>()?;
                let free_blocks_count_hi = c.read_u16::<LittleEndian>()?;
                let free_inodes_count_hi = c.read_u16::<LittleEndian>()?;
                let used_dirs_count_hi = c.read_u16::<LittleEndian>()?;
                (
                    block_bitmap_hi,
                    inode_bitmap_hi,
                    inode_table_hi,
                    free_blocks_count_hi,
                    free_inodes_count_hi,
                    used_dirs_count_hi,
                )
            } else {
                (0, 0, 0, 0, 0, 0)
            };

        Ok(GroupDescriptor {
            block_bitmap: lo_hi(block_bitmap_lo, block_bitmap_hi),
            inode_bitmap: lo_hi(inode_bitmap_lo, inode_bitmap_hi),
            inode_table: lo_hi(inode_table_lo, inode_table_hi),
            free_blocks_count: lo_hi16(free_blocks_count_lo, free_blocks_count_hi),
            free_inodes_count: lo_hi16(free_inodes_count_lo, free_inodes_count_hi),
            used_dirs_count: lo_hi16(used_dirs_count_lo, used_dirs_count_hi),
        })
    }
}

fn lo_hi(lo: u32, hi: u32) -> u64 {
    lo as u64 | ((hi as u64) << 32)
}

fn lo_hi16(lo: u16, hi: u16) -> u32 {
    lo as u32 | ((hi as u32) << 16)
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_32() -> Vec<u8> {
        let mut buf = vec![0u8; GROUP_DESC_32_SIZE];
        buf[8..12].copy_from_slice(&46u32.to_le_bytes()); // inode_table_lo
        buf
    }

    #[test]
    fn decodes_32_byte_descriptor() {
        let gd = GroupDescriptor::decode(&sample_32()).unwrap();
        assert_eq!(gd.inode_table, 46);
    }

    #[test]
    fn decodes_64_byte_descriptor_with_hi_halves() {
        let mut buf = vec![0u8; GROUP_DESC_64_SIZE];
        buf[8..12].copy_from_slice(&1u32.to_le_bytes()); // inode_table_lo
        buf[32..36].copy_from_slice(&1u32.to_le_bytes()); // inode_table_hi
        let gd = GroupDescriptor::decode(&buf).unwrap();
        assert_eq!(gd.inode_table, 1u64 | (1u64 << 32));
    }

    #[test]
    fn rejects_bad_length() {
        assert!(GroupDescriptor::decode(&[0u8; 10]).is_err());
    }
}
