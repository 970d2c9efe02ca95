//! JBD2 journal decoding (C8) and disc-to-journal block mapping (C9).

mod map;
pub mod structs;

use crate::error::{Error, Result};
use std::collections::HashMap;
use structs::SuperBlock;

/// The filesystem's journal, decoded from the journal inode's extracted bytes.
pub struct Journal {
    data: Vec<u8>,
    pub sb: SuperBlock,
}

impl Journal {
    /// `data` is the journal file's full byte content (extent-resolved, not
    /// yet split into blocks); `fs_block_size` is unused once the journal's
    /// own `sb.blocksize` is known, but required to sanity-check the input.
    pub fn new(data: Vec<u8>, fs_block_size: u32) -> Result<Self> {
        let _ = fs_block_size;
        let sb = SuperBlock::decode(&data)?;
        Ok(Self { data, sb })
    }

    /// Journal blocks, in order.
    pub fn get_blocks(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks(self.sb.blocksize as usize)
    }

    /// The block at journal-relative index `index`.
    pub fn read_block(&self, index: u64) -> Result<&[u8]> {
        let size = self.sb.blocksize as usize;
        let start = index as usize * size;
        let end = start + size;
        self.data
            .get(start..end)
            .ok_or_else(|| Error::Format(format!("journal block {index} out of range")))
    }

    /// For every filesystem block named by a descriptor tag, the list of
    /// journal block indices holding copies of it, newest transaction first.
    pub fn build_map(&self) -> Result<HashMap<u64, Vec<u64>>> {
        let descriptor_size = if self.sb.csum_v3() {
            crate::consts::jbd2::DESC_V3_LEN
        } else {
            crate::consts::jbd2::DESC_V2_LEN
        };
        map::build(self.get_blocks(), descriptor_size, self.sb.is64bit(), self.sb.csum_v3())
    }
}
