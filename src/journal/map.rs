//! Journal map construction (C9): for every filesystem block that appears in
//! the journal, the list of journal block indices holding copies of it,
//! newest transaction first.

use super::structs::{BlockHeader, DescriptorTag};
use crate::consts::jbd2::BlockType;
use crate::error::Result;
use std::collections::HashMap;

/// Per-sequence accumulator: filesystem block numbers named by this
/// transaction's descriptor tags, and the journal block indices that followed.
#[derive(Default)]
struct SequenceEntry {
    disc_blocks: Vec<u64>,
    journal_blocks: Vec<u64>,
}

/// Builds the disc-block -> journal-block-indices map by scanning every
/// journal block once.
///
/// `previous_blocktype` is only updated when a block's header decodes
/// successfully; an opaque (non-magic) block is silently skipped without
/// disturbing it, so a run of data blocks following a descriptor all get
/// attributed to that descriptor's sequence.
pub fn build<'a>(
    blocks: impl Iterator<Item = &'a [u8]>,
    descriptor_size: usize,
    is64bit: bool,
    csum_v3: bool,
) -> Result<HashMap<u64, Vec<u64>>> {
    let mut by_sequence: HashMap<u32, SequenceEntry> = HashMap::new();
    let mut sequence_order: Vec<u32> = Vec::new();
    let mut current_sequence: u32 = 0;
    let mut previous_blocktype: Option<BlockType> = None;

    for (index, block) in blocks.enumerate() {
        let index = index as u64;
        let header = match BlockHeader::try_decode(block) {
            Some(h) => h,
            None => {
                if previous_blocktype == Some(BlockType::Descriptor) {
                    if let Some(entry) = by_sequence.get_mut(&current_sequence) {
                        entry.journal_blocks.push(index);
                    }
                }
                continue;
            }
        };

        if !by_sequence.contains_key(&header.sequence) {
            by_sequence.insert(header.sequence, SequenceEntry::default());
            sequence_order.push(header.sequence);
        }

        if header.blocktype == BlockType::Descriptor {
            let tags = enum_descriptors(block, descriptor_size, is64bit, csum_v3)?;
            let entry = by_sequence.get_mut(&header.sequence).unwrap();
            entry.disc_blocks.extend(tags.iter().map(|t| t.blocknr));
            current_sequence = header.sequence;
        }

        if header.blocktype == BlockType::Commit {
            debug_assert_eq!(
                header.sequence, current_sequence,
                "commit record closes a sequence no descriptor opened",
            );
        }

        previous_blocktype = Some(header.blocktype);
    }

    Ok(chain(by_sequence, sequence_order))
}

/// Walks the descriptor tags of one descriptor block, stopping at the tag
/// marked `last_tag`.
fn enum_descriptors(
    block: &[u8],
    descriptor_size: usize,
    is64bit: bool,
    csum_v3: bool,
) -> Result<Vec<DescriptorTag>> {
    let header_len = crate::consts::jbd2::HEADER_LEN;
    let mut offset = 0usize;
    let mut tags = Vec::new();

    loop {
        let start = header_len + offset;
        if start + descriptor_size > block.len() {
            break;
        }
        let data = &block[start..];
        let tag = if csum_v3 {
            DescriptorTag::decode_v3(data)?
        } else {
            DescriptorTag::decode_v2(data, is64bit)?
        };
        let last = tag.is_last();
        offset += tag.actual_size;
        tags.push(tag);
        if last {
            break;
        }
    }

    Ok(tags)
}

/// Flattens every sequence's disc-block and journal-block lists (in
/// sequence-discovery order), zips them positionally, groups by disc block,
/// and sorts each group's journal indices by sequence, newest first.
///
/// The positional zip is not a shortcut: each descriptor tag names exactly one
/// filesystem block, and the data blocks that immediately follow a descriptor
/// are its copies in the same order, so flattening both lists in traversal
/// order and pairing them index-for-index reconstructs the same association
/// the scan observed.
fn chain(by_sequence: HashMap<u32, SequenceEntry>, order: Vec<u32>) -> HashMap<u64, Vec<u64>> {
    let mut disc_blocks = Vec::new();
    let mut journal_blocks = Vec::new();
    let mut journal_block_sequence: HashMap<u64, u32> = HashMap::new();

    for seq in &order {
        let entry = &by_sequence[seq];
        disc_blocks.extend(entry.disc_blocks.iter().copied());
        for &jb in &entry.journal_blocks {
            journal_blocks.push(jb);
            journal_block_sequence.insert(jb, *seq);
        }
    }

    let mut result: HashMap<u64, Vec<u64>> = HashMap::new();
    for (disc_blk, journal_blk) in disc_blocks.into_iter().zip(journal_blocks.into_iter()) {
        result.entry(disc_blk).or_default().push(journal_blk);
    }
    for copies in result.values_mut() {
        copies.sort_by_key(|jb| std::cmp::Reverse(journal_block_sequence[jb]));
    }
    result
}
