//! JBD2 on-disk structures (C8). Unlike the rest of the image, the journal is
//! big-endian.

use crate::consts::jbd2::{self, BlockType, MAGIC};
use crate::error::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read};

/// The 12-byte header common to every journal block.
#[derive(Debug, Clone, Copy)]
pub struct BlockHeader {
    pub blocktype: BlockType,
    pub sequence: u32,
}

impl BlockHeader {
    /// Returns `None` (never an error) when `data` does not start with a valid
    /// JBD2 header — that's the signal a block is an opaque backup copy of
    /// some filesystem block, not a journal-format record.
    pub fn try_decode(data: &[u8]) -> Option<Self> {
        if data.len() < jbd2::HEADER_LEN {
            return None;
        }
        let mut c = Cursor::new(data);
        let magic = c.read_u32::<BigEndian>().ok()?;
        if magic != MAGIC {
            return None;
        }
        let blocktype = BlockType::from_raw(c.read_u32::<BigEndian>().ok()?)?;
        let sequence = c.read_u32::<BigEndian>().ok()?;
        Some(Self { blocktype, sequence })
    }
}

/// The journal's own superblock (1024 bytes, big-endian).
#[derive(Debug, Clone)]
pub struct SuperBlock {
    pub header: BlockHeader,
    pub blocksize: u32,
    pub maxlen: u32,
    pub first: u32,
    pub sequence: u32,
    pub start: u32,
    pub feature_compat: u32,
    pub feature_incompat: u32,
    pub feature_ro_compat: u32,
    pub uuid: [u8; 16],
}

impl SuperBlock {
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < jbd2::SB_LEN {
            return Err(Error::Format("journal superblock too short".into()));
        }
        let header = BlockHeader::try_decode(data)
            .ok_or_else(|| Error::Format("journal superblock has no valid header".into()))?;

        let mut c = Cursor::new(&data[jbd2::HEADER_LEN..]);
        let blocksize = c.read_u32::<BigEndian>()?;
        let maxlen = c.read_u32::<BigEndian>()?;
        let first = c.read_u32::<BigEndian>()?;
        let sequence = c.read_u32::<BigEndian>()?;
        let start = c.read_u32::<BigEndian>()?;
        let _errno = c.read_u32::<BigEndian>()?;
        let feature_compat = c.read_u32::<BigEndian>()?;
        let feature_incompat = c.read_u32::<BigEndian>()?;
        let feature_ro_compat = c.read_u32::<BigEndian>()?;
        let mut uuid = [0u8; 16];
        c.read_exact(&mut uuid)?;

        Ok(Self {
            header,
            blocksize,
            maxlen,
            first,
            sequence,
            start,
            feature_compat,
            feature_incompat,
            feature_ro_compat,
            uuid,
        })
    }

    pub fn is64bit(&self) -> bool {
        self.feature_incompat & jbd2::FEATURE_INCOMPAT_64BIT != 0
    }

    pub fn csum_v3(&self) -> bool {
        self.feature_incompat & jbd2::FEATURE_INCOMPAT_CSUM_V3 != 0
    }
}

/// One descriptor tag: names a filesystem block number the following journal
/// data block is a copy of.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorTag {
    pub blocknr: u64,
    pub flags: u32,
    /// Size in bytes this tag actually occupied, including any trailing UUID.
    pub actual_size: usize,
}

impl DescriptorTag {
    pub fn is_last(&self) -> bool {
        self.flags & jbd2::DESC_FLAG_LAST_TAG as u32 != 0
    }

    fn uuid_omitted(&self) -> bool {
        self.flags & jbd2::DESC_FLAG_UUID_OMITTED as u32 != 0
    }

    /// Decodes a V2 tag (used when `CSUM_V3` is not set).
    pub fn decode_v2(data: &[u8], is64bit: bool) -> Result<Self> {
        if data.len() < jbd2::DESC_V2_LEN {
            return Err(Error::Format("journal descriptor tag (v2) too short".into()));
        }
        let mut c = Cursor::new(data);
        let blocknr_lo = c.read_u32::<BigEndian>()?;
        let _checksum = c.read_u16::<BigEndian>()?;
        let flags = c.read_u16::<BigEndian>()? as u32;
        let mut actual_size = jbd2::DESC_V2_LEN;

        let mut blocknr = blocknr_lo as u64;
        if is64bit {
            if data.len() < actual_size + 4 {
                return Err(Error::Format("journal descriptor tag (v2, 64-bit) too short".into()));
            }
            let mut hi_bytes = &data[actual_size..actual_size + 4];
            let blocknr_hi = hi_bytes.read_u32::<BigEndian>()?;
            blocknr |= (blocknr_hi as u64) << 32;
            actual_size += 4;
        }

        let mut tag = Self { blocknr, flags, actual_size };
        if !tag.uuid_omitted() {
            tag.actual_size += 16;
        }
        Ok(tag)
    }

    /// Decodes a V3 tag (used when `CSUM_V3` is set). Always carries the high
    /// block-number word, regardless of `is64bit`.
    pub fn decode_v3(data: &[u8]) -> Result<Self> {
        if data.len() < jbd2::DESC_V3_LEN {
            return Err(Error::Format("journal descriptor tag (v3) too short".into()));
        }
        let mut c = Cursor::new(data);
        let blocknr_lo = c.read_u32::<BigEndian>()?;
        let flags = c.read_u32::<BigEndian>()?;
        let blocknr_hi = c.read_u32::<BigEndian>()?;
        let _checksum = c.read_u32::<BigEndian>()?;
        let blocknr = blocknr_lo as u64 | ((blocknr_hi as u64) << 32);

        let mut tag = Self { blocknr, flags, actual_size: jbd2::DESC_V3_LEN };
        if !tag.uuid_omitted() {
            tag.actual_size += 16;
        }
        Ok(tag)
    }
}
