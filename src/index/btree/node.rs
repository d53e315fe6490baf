//! B-tree node page.
//!
//! # Layout (big-endian)
//! ```text
//! ┌─────────────┬─────────────┬─────────────┬─────────┬─────────┬─────┐
//! │ entry count │ prev node   │ next node   │ entry 0 │ entry 1 │ ... │
//! │   (4 B)     │   (4 B)     │   (4 B)     │         │         │     │
//! └─────────────┴─────────────┴─────────────┴─────────┴─────────┴─────┘
//! ```
//! Each entry is `key_length` key bytes followed by a 4-byte value: a
//! record number in leaves, a child node pointer in internal nodes.

use std::cmp::Ordering;

use crate::common::{BlockPtr, Error, Result};
use crate::storage::{Block, BlockFile};

/// Size of the node page header.
pub const NODE_HEADER_SIZE: usize = 12;

const OFFSET_COUNT: usize = 0;
const OFFSET_PREV: usize = 4;
const OFFSET_NEXT: usize = 8;

/// Number of entries a node page can hold.
#[inline]
pub fn node_capacity(page_size: usize, key_length: usize) -> usize {
    page_size.saturating_sub(NODE_HEADER_SIZE) / (key_length + 4)
}

/// One node page held in memory.
///
/// Besides the page, a node carries its search cursor (`cur_entry`). The
/// cursor is set by searches and kept in step with inserts and splits so
/// that a parent always points at the child it last descended into.
#[derive(Debug)]
pub struct IndexNode {
    ptr: BlockPtr,
    block: Block,
    key_length: usize,
    subtree_depth: u32,
    num_entries: usize,
    capacity: usize,
    prev: BlockPtr,
    next: BlockPtr,
    cur_entry: usize,
}

impl IndexNode {
    /// Create an empty node at a freshly allocated block.
    pub fn create(
        ptr: BlockPtr,
        page_size: usize,
        key_length: usize,
        subtree_depth: u32,
        prev: BlockPtr,
        next: BlockPtr,
    ) -> Self {
        let mut node = Self {
            ptr,
            block: Block::new(page_size),
            key_length,
            subtree_depth,
            num_entries: 0,
            capacity: node_capacity(page_size, key_length),
            prev,
            next,
            cur_entry: 0,
        };
        node.write_header();
        node
    }

    /// Read the node at `ptr`.
    ///
    /// # Errors
    /// `Error::Corrupt` if the pointer is null or the stored entry count
    /// exceeds the page capacity.
    pub fn load(
        blocks: &mut BlockFile,
        ptr: BlockPtr,
        key_length: usize,
        subtree_depth: u32,
    ) -> Result<Self> {
        if ptr.is_none() {
            return Err(Error::corrupt(ptr, "null node pointer"));
        }

        let page_size = blocks.page_size();
        let block = blocks.read_block(ptr, page_size)?;
        let capacity = node_capacity(page_size, key_length);

        let num_entries = block.read_u32(OFFSET_COUNT) as usize;
        if num_entries > capacity {
            return Err(Error::corrupt(
                ptr,
                format!("{} entries exceed node capacity {}", num_entries, capacity),
            ));
        }

        let prev = BlockPtr::new(block.read_u32(OFFSET_PREV));
        let next = BlockPtr::new(block.read_u32(OFFSET_NEXT));

        Ok(Self {
            ptr,
            block,
            key_length,
            subtree_depth,
            num_entries,
            capacity,
            prev,
            next,
            cur_entry: 0,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn ptr(&self) -> BlockPtr {
        self.ptr
    }

    #[inline]
    pub fn prev(&self) -> BlockPtr {
        self.prev
    }

    #[inline]
    pub fn next(&self) -> BlockPtr {
        self.next
    }

    #[inline]
    pub fn num_entries(&self) -> usize {
        self.num_entries
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.num_entries >= self.capacity
    }

    #[inline]
    pub fn subtree_depth(&self) -> u32 {
        self.subtree_depth
    }

    /// Leaves have a subtree depth of 1.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.subtree_depth == 1
    }

    #[inline]
    pub fn cur_entry(&self) -> usize {
        self.cur_entry
    }

    #[inline]
    pub fn set_cur_entry(&mut self, entry: usize) {
        self.cur_entry = entry;
    }

    #[cfg(test)]
    pub(crate) fn is_dirty(&self) -> bool {
        self.block.is_dirty()
    }

    #[inline]
    fn entry_size(&self) -> usize {
        self.key_length + 4
    }

    #[inline]
    fn entry_offset(&self, entry: usize) -> usize {
        NODE_HEADER_SIZE + entry * self.entry_size()
    }

    /// Key bytes of entry `entry`.
    pub fn key_at(&self, entry: usize) -> &[u8] {
        self.block.bytes(self.entry_offset(entry), self.key_length)
    }

    /// Record number or child pointer of entry `entry`.
    pub fn value_at(&self, entry: usize) -> u32 {
        self.block.read_u32(self.entry_offset(entry) + self.key_length)
    }

    /// Compare a search key with the key of entry `entry`.
    pub fn compare_key(&self, key: &[u8], entry: usize) -> Ordering {
        key.cmp(self.key_at(entry))
    }

    /// Key representing this node in its parent: the key of entry 0.
    pub fn node_key(&self) -> Vec<u8> {
        self.key_at(0).to_vec()
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    fn write_header(&mut self) {
        self.block.write_u32(OFFSET_COUNT, self.num_entries as u32);
        self.block.write_u32(OFFSET_PREV, self.prev.0);
        self.block.write_u32(OFFSET_NEXT, self.next.0);
    }

    pub fn set_prev(&mut self, prev: BlockPtr) {
        self.prev = prev;
        self.block.write_u32(OFFSET_PREV, prev.0);
    }

    pub fn set_next(&mut self, next: BlockPtr) {
        self.next = next;
        self.block.write_u32(OFFSET_NEXT, next.0);
    }

    /// Overwrite entry `entry`. A `None` key writes the all-zero key.
    pub fn write_entry(&mut self, entry: usize, key: Option<&[u8]>, value: u32) {
        let offset = self.entry_offset(entry);
        match key {
            Some(key) => self.block.write_bytes(offset, key),
            None => self.block.zero(offset, self.key_length),
        }
        self.block.write_u32(offset + self.key_length, value);
    }

    /// Insert an entry at position `at`, shifting later entries right.
    ///
    /// # Errors
    /// `Error::NodeFull` if there is no free slot.
    pub fn insert_at(&mut self, at: usize, key: &[u8], value: u32) -> Result<()> {
        if self.is_full() {
            return Err(Error::NodeFull(self.ptr));
        }

        if at < self.num_entries {
            let src = self.entry_offset(at);
            let len = (self.num_entries - at) * self.entry_size();
            self.block.move_bytes(src, src + self.entry_size(), len);
        }
        self.write_entry(at, Some(key), value);
        self.num_entries += 1;
        self.block.write_u32(OFFSET_COUNT, self.num_entries as u32);
        Ok(())
    }

    /// Raw bytes of `count` entries starting at `start`.
    pub fn entry_bytes(&self, start: usize, count: usize) -> &[u8] {
        self.block
            .bytes(self.entry_offset(start), count * self.entry_size())
    }

    /// Replace all entries with `count` entries from a raw buffer.
    pub fn set_entries(&mut self, bytes: &[u8], count: usize) {
        let used = self.entry_offset(self.num_entries);
        self.block.zero(NODE_HEADER_SIZE, used - NODE_HEADER_SIZE);
        self.block.write_bytes(NODE_HEADER_SIZE, bytes);
        self.num_entries = count;
        self.block.write_u32(OFFSET_COUNT, count as u32);
    }

    /// Keep only the first `count` entries.
    pub fn truncate(&mut self, count: usize) {
        if count >= self.num_entries {
            return;
        }
        let start = self.entry_offset(count);
        let len = (self.num_entries - count) * self.entry_size();
        self.block.zero(start, len);
        self.num_entries = count;
        self.block.write_u32(OFFSET_COUNT, count as u32);
    }

    /// Remove the first `count` entries, shifting the rest to the front.
    pub fn drain_front(&mut self, count: usize) {
        let count = count.min(self.num_entries);
        let remaining = self.num_entries - count;
        let src = self.entry_offset(count);
        self.block
            .move_bytes(src, NODE_HEADER_SIZE, remaining * self.entry_size());
        let tail = self.entry_offset(remaining);
        self.block.zero(tail, count * self.entry_size());
        self.num_entries = remaining;
        self.block.write_u32(OFFSET_COUNT, remaining as u32);
    }

    /// Drop all entries and change the subtree depth. Used when the root
    /// hands its entries to a new child.
    pub fn reset(&mut self, subtree_depth: u32) {
        self.truncate(0);
        self.subtree_depth = subtree_depth;
        self.cur_entry = 0;
    }

    /// Write the page back if it was modified.
    pub fn commit(&mut self, blocks: &mut BlockFile) -> Result<()> {
        if self.block.is_dirty() {
            blocks.write_block(self.ptr, &mut self.block)?;
        }
        Ok(())
    }
}
