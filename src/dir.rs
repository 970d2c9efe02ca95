//! Directory entry walker (C5).

use crate::consts::{FileType, DIR_ENTRY_HEADER_SIZE, DIR_ENTRY_TAIL_MAGIC};
use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// One directory entry: an inode number, name, and the file type hint ext4
/// stores alongside it (not necessarily trustworthy — see `Handle`'s own mode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inode: u32,
    pub file_type: FileType,
    pub name: Vec<u8>,
}

impl DirEntry {
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// Parses every entry in one directory data block, stopping at the tail
/// sentinel (`inode == 0 && file_type == 0xDE`) if present, otherwise at the
/// block boundary.
pub fn parse_block(data: &[u8]) -> Result<Vec<DirEntry>> {
    let mut entries = Vec::new();
    let mut offset = 0usize;

    while offset + DIR_ENTRY_HEADER_SIZE <= data.len() {
        let header = &data[offset..offset + DIR_ENTRY_HEADER_SIZE];
        let mut c = Cursor::new(header);
        let inode = c.read_u32::<LittleEndian>()?;
        let rec_len = c.read_u16::<LittleEndian>()?;
        let name_len = c.read_u8()?;
        let file_type = c.read_u8()?;

        if rec_len == 0 {
            // Malformed record; refuse to loop forever.
            return Err(Error::Format("directory entry rec_len is zero".into()));
        }

        if inode == 0 && file_type == DIR_ENTRY_TAIL_MAGIC {
            break;
        }

        let name_start = offset + DIR_ENTRY_HEADER_SIZE;
        let name_end = name_start + name_len as usize;
        if name_end > data.len() {
            return Err(Error::Format("directory entry name overruns block".into()));
        }
        if inode != 0 {
            entries.push(DirEntry {
                inode,
                file_type: FileType::from_raw(file_type),
                name: data[name_start..name_end].to_vec(),
            });
        }

        offset += rec_len as usize;
    }

    Ok(entries)
}

/// Parses a directory's full entry list out of its (already extent-resolved)
/// data blocks, each parsed independently.
pub fn parse_blocks<'a>(blocks: impl IntoIterator<Item = &'a [u8]>) -> Result<Vec<DirEntry>> {
    let mut all = Vec::new();
    for block in blocks {
        all.extend(parse_block(block)?);
    }
    Ok(all)
}

/// Finds the first entry with a byte-exact name match.
pub fn find<'a>(entries: &'a [DirEntry], name: &[u8]) -> Option<&'a DirEntry> {
    entries.iter().find(|e| e.name == name)
}

#[cfg(test)]
mod test {
    use super::*;

    fn push_entry(buf: &mut Vec<u8>, inode: u32, rec_len: u16, file_type: u8, name: &[u8]) {
        let start = buf.len();
        buf.resize(start + rec_len as usize, 0);
        buf[start..start + 4].copy_from_slice(&inode.to_le_bytes());
        buf[start + 4..start + 6].copy_from_slice(&rec_len.to_le_bytes());
        buf[start + 6] = name.len() as u8;
        buf[start + 7] = file_type;
        buf[start + 8..start + 8 + name.len()].copy_from_slice(name);
    }

    #[test]
    fn parses_dot_and_dotdot_and_stops_at_tail() {
        let mut block = Vec::new();
        push_entry(&mut block, 2, 12, FileType::Directory as u8, b".");
        push_entry(&mut block, 2, 12, FileType::Directory as u8, b"..");
        push_entry(&mut block, 0, 12, DIR_ENTRY_TAIL_MAGIC, b"");
        block.resize(64, 0);

        let entries = parse_block(&block).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, b".");
        assert_eq!(entries[1].name, b"..");
    }

    #[test]
    fn finds_entry_by_exact_name() {
        let mut block = Vec::new();
        push_entry(&mut block, 12, 20, FileType::Regular as u8, b"hello.txt");
        block.resize(64, 0);
        let entries = parse_block(&block).unwrap();
        let found = find(&entries, b"hello.txt").unwrap();
        assert_eq!(found.inode, 12);
        assert!(find(&entries, b"missing").is_none());
    }

    #[test]
    fn rejects_zero_rec_len() {
        let mut block = vec![0u8; 16];
        block[4..6].copy_from_slice(&0u16.to_le_bytes());
        assert!(parse_block(&block).is_err());
    }
}
