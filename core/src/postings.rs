//! Posting lists stored as chains of fixed-capacity blocks in one flat file.
//!
//! Block layout (little endian, no file header):
//!
//! ```text
//! +---------+---------+-----+---------+----------------+
//! | id 0 i32| id 1 i32| ... | id 9 i32| next block i64 |
//! +---------+---------+-----+---------+----------------+
//!   40 bytes of slots                   8 bytes
//! ```
//!
//! An empty slot holds `-1`, and so does the next pointer of a chain's last
//! block. Blocks never move once written: a chain grows by appending a block
//! at the end of the file and rewiring the previous tail's pointer.

use crate::config::LoadPolicy;
use crate::error::{IndexError, Result};
use crate::{BlockOffset, DocId};
use std::collections::HashSet;
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const BLOCK_CAPACITY: usize = 10;
pub const SLOT_SIZE: usize = 4;
pub const POINTER_SIZE: usize = 8;
pub const BLOCK_SIZE: usize = BLOCK_CAPACITY * SLOT_SIZE + POINTER_SIZE;

pub const EMPTY_SLOT: DocId = -1;
pub const NO_NEXT_BLOCK: i64 = -1;

const POINTER_START: usize = BLOCK_CAPACITY * SLOT_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingBlock {
    pub slots: [DocId; BLOCK_CAPACITY],
    pub next: Option<BlockOffset>,
}

impl PostingBlock {
    pub fn empty() -> Self {
        Self { slots: [EMPTY_SLOT; BLOCK_CAPACITY], next: None }
    }

    pub fn with_first(id: DocId) -> Self {
        let mut block = Self::empty();
        block.slots[0] = id;
        block
    }

    pub fn first_empty_slot(&self) -> Option<usize> {
        self.slots.iter().position(|&slot| slot == EMPTY_SLOT)
    }

    pub fn is_full(&self) -> bool {
        self.first_empty_slot().is_none()
    }

    /// Occupied slots in slot order, duplicates included.
    pub fn ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.slots.iter().copied().filter(|&slot| slot != EMPTY_SLOT)
    }

    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut buf = [0u8; BLOCK_SIZE];
        for (i, slot) in self.slots.iter().enumerate() {
            buf[i * SLOT_SIZE..(i + 1) * SLOT_SIZE].copy_from_slice(&slot.to_le_bytes());
        }
        let next = match self.next {
            Some(offset) => offset as i64,
            None => NO_NEXT_BLOCK,
        };
        buf[POINTER_START..].copy_from_slice(&next.to_le_bytes());
        buf
    }
}

fn le_i32(raw: &[u8]) -> i32 {
    let mut bytes = [0u8; SLOT_SIZE];
    bytes.copy_from_slice(raw);
    i32::from_le_bytes(bytes)
}

fn le_i64(raw: &[u8]) -> i64 {
    let mut bytes = [0u8; POINTER_SIZE];
    bytes.copy_from_slice(raw);
    i64::from_le_bytes(bytes)
}

/// Append-only store of posting blocks.
pub struct PostingStore {
    path: PathBuf,
    file: File,
    policy: LoadPolicy,
    sync: bool,
}

impl PostingStore {
    pub fn open(path: PathBuf, policy: LoadPolicy, sync: bool) -> Result<Self> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        let file = OpenOptions::new().read(true).write(true).create(true).open(&path)?;
        Ok(Self { path, file, policy, sync })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset where the next block will be allocated.
    pub fn end_of_file(&self) -> Result<BlockOffset> {
        Ok(self.file.metadata()?.len())
    }

    /// Write a fresh block at `address` holding only `first_id`.
    pub fn create_chain(&mut self, address: BlockOffset, first_id: DocId) -> Result<()> {
        self.write_block(address, &PostingBlock::with_first(first_id))
    }

    /// Add `id` to the chain starting at `head`. The id is not checked against
    /// existing entries; duplicates are dropped by [`PostingStore::retrieve`].
    pub fn append(&mut self, head: BlockOffset, id: DocId) -> Result<()> {
        let (tail_offset, mut tail) = self.tail(head)?;
        match tail.first_empty_slot() {
            Some(slot) => {
                tail.slots[slot] = id;
                self.write_block(tail_offset, &tail)
            }
            None => {
                // A truncated tail must not overlap the new block.
                let address = self.end_of_file()?.max(tail_offset + BLOCK_SIZE as u64);
                self.create_chain(address, id)?;
                tail.next = Some(address);
                self.write_block(tail_offset, &tail)?;
                tracing::debug!(head, tail = tail_offset, address, "chained new posting block");
                Ok(())
            }
        }
    }

    /// Distinct ids of the chain in the order they were first appended.
    pub fn retrieve(&self, head: BlockOffset) -> Result<Vec<DocId>> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for entry in self.chain(head) {
            let (_, block) = match entry {
                Ok(entry) => entry,
                Err(err @ IndexError::CorruptChain { .. }) if !self.policy.is_strict() => {
                    tracing::warn!(head, error = %err, "posting chain loops, stopping traversal");
                    break;
                }
                Err(err) => return Err(err),
            };
            for id in block.ids() {
                if seen.insert(id) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    /// Iterate the blocks of a chain, following next pointers.
    pub fn chain(&self, head: BlockOffset) -> Chain<'_> {
        Chain { store: self, head, next: Some(head), visited: HashSet::new() }
    }

    pub fn block_count(&self) -> Result<u64> {
        Ok(self.end_of_file()? / BLOCK_SIZE as u64)
    }

    fn tail(&self, head: BlockOffset) -> Result<(BlockOffset, PostingBlock)> {
        let mut last = None;
        for entry in self.chain(head) {
            last = Some(entry?);
        }
        // A chain always yields its head block, even when it lies past the end of the file.
        last.ok_or(IndexError::CorruptChain { head, offset: head })
    }

    pub fn read_block(&self, offset: BlockOffset) -> Result<PostingBlock> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::with_capacity(BLOCK_SIZE);
        if let Err(err) = file.take(BLOCK_SIZE as u64).read_to_end(&mut buf) {
            if self.policy.is_strict() {
                return Err(err.into());
            }
            tracing::warn!(offset, error = %err, "read error in posting block");
        }
        self.decode_block(&buf, offset)
    }

    fn decode_block(&self, bytes: &[u8], offset: BlockOffset) -> Result<PostingBlock> {
        let mut block = PostingBlock::empty();
        let mut missing = 0;
        for (i, slot) in block.slots.iter_mut().enumerate() {
            match bytes.get(i * SLOT_SIZE..(i + 1) * SLOT_SIZE) {
                Some(raw) => *slot = le_i32(raw),
                None if self.policy.is_strict() => {
                    return Err(IndexError::DegradedRead { offset, slot: Some(i) });
                }
                None => missing += 1,
            }
        }

        let pointer = match bytes.get(POINTER_START..BLOCK_SIZE) {
            Some(raw) => le_i64(raw),
            None if self.policy.is_strict() => {
                return Err(IndexError::DegradedRead { offset, slot: None });
            }
            None => {
                missing += 1;
                NO_NEXT_BLOCK
            }
        };
        block.next = match pointer {
            NO_NEXT_BLOCK => None,
            value if value < 0 => {
                if self.policy.is_strict() {
                    return Err(IndexError::InvalidPointer { offset, value });
                }
                tracing::warn!(offset, value, "invalid next pointer, ending chain");
                None
            }
            value => Some(value as BlockOffset),
        };

        if missing > 0 {
            tracing::warn!(offset, missing, "short posting block, missing fields read as empty");
        }
        Ok(block)
    }

    fn write_block(&mut self, offset: BlockOffset, block: &PostingBlock) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&block.encode())?;
        self.file.flush()?;
        if self.sync {
            self.file.sync_data()?;
        }
        Ok(())
    }
}

/// Cursor over a posting chain. Yields `CorruptChain` if a block is revisited.
pub struct Chain<'a> {
    store: &'a PostingStore,
    head: BlockOffset,
    next: Option<BlockOffset>,
    visited: HashSet<BlockOffset>,
}

impl Iterator for Chain<'_> {
    type Item = Result<(BlockOffset, PostingBlock)>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.next.take()?;
        if !self.visited.insert(offset) {
            return Some(Err(IndexError::CorruptChain { head: self.head, offset }));
        }
        match self.store.read_block(offset) {
            Ok(block) => {
                self.next = block.next;
                Some(Ok((offset, block)))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store(dir: &Path, policy: LoadPolicy) -> PostingStore {
        PostingStore::open(dir.join("ids.db"), policy, false).unwrap()
    }

    #[test]
    fn block_layout_is_48_little_endian_bytes() {
        assert_eq!(BLOCK_SIZE, 48);
        let mut block = PostingBlock::with_first(7);
        block.next = Some(96);
        let bytes = block.encode();
        assert_eq!(&bytes[0..4], &7i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &[0xff; 4]);
        assert_eq!(&bytes[36..40], &[0xff; 4]);
        assert_eq!(&bytes[40..48], &96i64.to_le_bytes());

        assert_eq!(&PostingBlock::empty().encode()[40..48], &[0xff; 8]);
    }

    #[test]
    fn create_chain_writes_one_block() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path(), LoadPolicy::Strict);
        assert_eq!(s.end_of_file().unwrap(), 0);
        s.create_chain(0, 5).unwrap();
        assert_eq!(s.end_of_file().unwrap(), BLOCK_SIZE as u64);
        assert_eq!(s.read_block(0).unwrap(), PostingBlock::with_first(5));
        assert_eq!(s.retrieve(0).unwrap(), vec![5]);
    }

    #[test]
    fn append_fills_slots_in_place() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path(), LoadPolicy::Strict);
        s.create_chain(0, 1).unwrap();
        s.append(0, 2).unwrap();
        s.append(0, 3).unwrap();
        assert_eq!(s.end_of_file().unwrap(), BLOCK_SIZE as u64);
        let block = s.read_block(0).unwrap();
        assert_eq!(&block.slots[..4], &[1, 2, 3, EMPTY_SLOT]);
        assert_eq!(block.next, None);
    }

    #[test]
    fn full_tail_grows_a_new_block() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path(), LoadPolicy::Strict);
        s.create_chain(0, 0).unwrap();
        for id in 1..=10 {
            s.append(0, id).unwrap();
        }
        assert_eq!(s.block_count().unwrap(), 2);

        let head = s.read_block(0).unwrap();
        assert!(head.is_full());
        assert_eq!(head.next, Some(BLOCK_SIZE as u64));
        assert_eq!(s.read_block(BLOCK_SIZE as u64).unwrap(), PostingBlock::with_first(10));
        assert_eq!(s.retrieve(0).unwrap(), (0..=10).collect::<Vec<_>>());
    }

    #[test]
    fn head_offset_is_stable_across_interleaved_chains() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path(), LoadPolicy::Strict);
        s.create_chain(0, 100).unwrap();
        s.create_chain(48, 200).unwrap();
        for id in 0..25 {
            s.append(0, id).unwrap();
            s.append(48, 1000 + id).unwrap();
        }
        let a = s.retrieve(0).unwrap();
        let b = s.retrieve(48).unwrap();
        assert_eq!(a.len(), 26);
        assert_eq!(a[0], 100);
        assert_eq!(b.len(), 26);
        assert_eq!(b[0], 200);
        assert!(a.iter().all(|id| *id < 1000));
    }

    #[test]
    fn retrieve_drops_duplicates_keeping_first_position() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path(), LoadPolicy::Strict);
        s.create_chain(0, 4).unwrap();
        for id in [2, 4, 9, 2, 4] {
            s.append(0, id).unwrap();
        }
        let block = s.read_block(0).unwrap();
        assert_eq!(block.ids().count(), 6);
        assert_eq!(s.retrieve(0).unwrap(), vec![4, 2, 9]);
    }

    #[test]
    fn truncated_block_reads_missing_slots_as_empty() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path(), LoadPolicy::Tolerant);
        s.create_chain(0, 1).unwrap();
        for id in 2..=7 {
            s.append(0, id).unwrap();
        }
        s.file.set_len(5 * SLOT_SIZE as u64).unwrap();
        assert_eq!(s.retrieve(0).unwrap(), vec![1, 2, 3, 4, 5]);

        let strict = store(dir.path(), LoadPolicy::Strict);
        assert!(matches!(
            strict.retrieve(0),
            Err(IndexError::DegradedRead { offset: 0, slot: Some(5) })
        ));
    }

    #[test]
    fn append_repairs_truncated_tail() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path(), LoadPolicy::Tolerant);
        s.create_chain(0, 1).unwrap();
        s.append(0, 2).unwrap();
        s.file.set_len(2 * SLOT_SIZE as u64).unwrap();

        s.append(0, 3).unwrap();
        assert_eq!(s.end_of_file().unwrap(), BLOCK_SIZE as u64);
        let strict = store(dir.path(), LoadPolicy::Strict);
        assert_eq!(strict.retrieve(0).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn looping_chain_is_detected() {
        let dir = tempdir().unwrap();
        let mut s = store(dir.path(), LoadPolicy::Tolerant);
        let mut first = PostingBlock::with_first(1);
        first.next = Some(BLOCK_SIZE as u64);
        let mut second = PostingBlock::with_first(2);
        second.slots = [2; BLOCK_CAPACITY];
        second.next = Some(0);
        s.write_block(0, &first).unwrap();
        s.write_block(BLOCK_SIZE as u64, &second).unwrap();

        assert_eq!(s.retrieve(0).unwrap(), vec![1, 2]);
        assert!(matches!(s.append(0, 3), Err(IndexError::CorruptChain { head: 0, offset: 0 })));

        let strict = store(dir.path(), LoadPolicy::Strict);
        assert!(matches!(strict.retrieve(BLOCK_SIZE as u64), Err(IndexError::CorruptChain { .. })));
    }

    #[test]
    fn negative_pointer_other_than_sentinel() {
        let dir = tempdir().unwrap();
        let s = store(dir.path(), LoadPolicy::Strict);
        let mut bytes = PostingBlock::with_first(3).encode();
        bytes[40..48].copy_from_slice(&(-5i64).to_le_bytes());
        std::fs::write(s.path(), bytes).unwrap();

        assert!(matches!(s.read_block(0), Err(IndexError::InvalidPointer { offset: 0, value: -5 })));
        let tolerant = store(dir.path(), LoadPolicy::Tolerant);
        assert_eq!(tolerant.retrieve(0).unwrap(), vec![3]);
    }
}
