//! B-tree over node pages.
//!
//! # Node Cache
//! A tree keeps exactly one node per level in memory, in `path`:
//! ```text
//! path[0]  root             (subtree depth = depth)
//! path[1]  child of root    (subtree depth = depth - 1)
//! ...
//! path[depth-1]  leaf       (subtree depth = 1)
//! ```
//! The parent of `path[i]` is `path[i - 1]`, and `path[i - 1].cur_entry()`
//! is the entry pointing at `path[i]` after a descent. Moving a level to a
//! different node commits the old node if it was modified, then loads the
//! new one.
//!
//! The root never moves: a root split copies the root's entries into a new
//! child and leaves the root in place one level higher, so descriptors
//! never need a new root pointer.

use std::cmp::Ordering;
use std::fmt;
use std::io::Write;

use crate::common::config::MAX_SUBTREE_DEPTH;
use crate::common::{BlockPtr, Error, Result};
use crate::index::header::IndexDescriptor;
use crate::index::key::{FieldType, KeyCodec};
use crate::storage::BlockFile;

use super::node::{node_capacity, IndexNode};

/// Where an entry goes in its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// At its sorted position (leaf inserts).
    Sorted,
    /// Right after the current entry (new child after a split).
    AfterCurrent { make_current: bool },
}

/// Metadata of one index, as reported by
/// [`IndexFile::index_info`](crate::index::IndexFile::index_info).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub key_length: usize,
    pub subtree_depth: u32,
    pub node_capacity: usize,
    pub unique: bool,
    pub field_type: Option<FieldType>,
    pub root: BlockPtr,
    /// Node and root splits since the index was opened or created.
    pub splits: u64,
}

/// Shape of a tree that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    pub depth: u32,
    /// Number of nodes on each level, root level first.
    pub nodes_per_level: Vec<usize>,
    /// Number of leaf entries.
    pub entries: usize,
}

impl fmt::Display for IndexSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "depth {}, {} entries, nodes per level {:?}",
            self.depth, self.entries, self.nodes_per_level
        )
    }
}

/// One B-tree index.
pub struct IndexTree {
    root: BlockPtr,
    key_length: usize,
    depth: u32,
    unique: bool,
    field_type: Option<FieldType>,
    codec: Option<KeyCodec>,
    path: Vec<IndexNode>,
    /// Set by a successful `find_first`; `find_next` continues from the
    /// leaf cursor only while it is set.
    positioned: bool,
    splits: u64,
}

impl IndexTree {
    /// Create an empty tree with a single leaf root.
    pub fn create(blocks: &mut BlockFile, key_length: usize) -> Result<Self> {
        let ptr = blocks.allocate()?;
        let root = IndexNode::create(
            ptr,
            blocks.page_size(),
            key_length,
            1,
            BlockPtr::NONE,
            BlockPtr::NONE,
        );

        Ok(Self {
            root: ptr,
            key_length,
            depth: 1,
            unique: false,
            field_type: None,
            codec: None,
            path: vec![root],
            positioned: false,
            splits: 0,
        })
    }

    /// Open the tree described by a header descriptor.
    pub fn open(blocks: &mut BlockFile, desc: &IndexDescriptor) -> Result<Self> {
        let root = IndexNode::load(blocks, desc.root, desc.key_length, desc.subtree_depth)?;

        Ok(Self {
            root: desc.root,
            key_length: desc.key_length,
            depth: desc.subtree_depth,
            unique: false,
            field_type: None,
            codec: None,
            path: vec![root],
            positioned: false,
            splits: 0,
        })
    }

    #[inline]
    pub fn key_length(&self) -> usize {
        self.key_length
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    #[inline]
    pub fn root(&self) -> BlockPtr {
        self.root
    }

    #[inline]
    pub fn codec(&self) -> Option<KeyCodec> {
        self.codec
    }

    #[inline]
    pub fn field_type(&self) -> Option<FieldType> {
        self.field_type
    }

    /// Select the key codec for `field_type`.
    pub fn set_field_type(&mut self, field_type: FieldType) -> Result<()> {
        self.codec = Some(KeyCodec::for_field(field_type, self.key_length)?);
        self.field_type = Some(field_type);
        Ok(())
    }

    pub fn set_unique(&mut self, unique: bool) {
        self.unique = unique;
    }

    /// Descriptor to persist in the header.
    pub fn descriptor(&self, page_size: usize) -> IndexDescriptor {
        let capacity = node_capacity(page_size, self.key_length);
        IndexDescriptor {
            root: self.root,
            max_entries: u16::try_from(capacity).unwrap_or(u16::MAX),
            subtree_depth: self.depth,
            key_length: self.key_length,
        }
    }

    pub fn info(&self, page_size: usize) -> IndexInfo {
        IndexInfo {
            key_length: self.key_length,
            subtree_depth: self.depth,
            node_capacity: node_capacity(page_size, self.key_length),
            unique: self.unique,
            field_type: self.field_type,
            root: self.root,
            splits: self.splits,
        }
    }

    // ========================================================================
    // Node cache
    // ========================================================================

    /// Make `path[level]` hold the node at `ptr`.
    fn load_level(&mut self, blocks: &mut BlockFile, level: usize, ptr: BlockPtr) -> Result<()> {
        if self.path.get(level).is_some_and(|node| node.ptr() == ptr) {
            return Ok(());
        }

        let subtree_depth = self
            .depth
            .checked_sub(level as u32)
            .filter(|&d| d > 0)
            .ok_or_else(|| Error::corrupt(ptr, "node referenced below the leaf level"))?;
        let node = IndexNode::load(blocks, ptr, self.key_length, subtree_depth)?;

        if let Some(slot) = self.path.get_mut(level) {
            slot.commit(blocks)?;
            *slot = node;
        } else if level == self.path.len() {
            self.path.push(node);
        } else {
            return Err(Error::corrupt(ptr, "node cache has a gap above this level"));
        }
        Ok(())
    }

    /// Write every modified cached node, deepest level first.
    pub fn commit(&mut self, blocks: &mut BlockFile) -> Result<()> {
        for node in self.path.iter_mut().rev() {
            node.commit(blocks)?;
        }
        Ok(())
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Find the first record whose key equals `key`.
    ///
    /// Leaves every level positioned on the path to the leaf where `key`
    /// is, or would be inserted.
    pub fn find_first(&mut self, blocks: &mut BlockFile, key: &[u8]) -> Result<Option<u32>> {
        self.positioned = false;
        let found = self.find_first_at(blocks, 0, key)?;
        self.positioned = found.is_some();
        Ok(found)
    }

    fn find_first_at(
        &mut self,
        blocks: &mut BlockFile,
        level: usize,
        key: &[u8],
    ) -> Result<Option<u32>> {
        let unique = self.unique;
        let node = &mut self.path[level];
        let n = node.num_entries();
        node.set_cur_entry(0);

        if node.is_leaf() {
            for i in 0..n {
                match node.compare_key(key, i) {
                    Ordering::Greater => continue,
                    Ordering::Equal => {
                        node.set_cur_entry(i);
                        return Ok(Some(node.value_at(i)));
                    }
                    Ordering::Less => {
                        node.set_cur_entry(i);
                        return Ok(None);
                    }
                }
            }
            node.set_cur_entry(n);
            return Ok(None);
        }

        if n == 0 {
            return Err(Error::corrupt(node.ptr(), "empty internal node"));
        }

        // First entry >= key, or the last entry.
        let mut cur = 0;
        let mut cmp = node.compare_key(key, 0);
        while cmp == Ordering::Greater && cur + 1 < n {
            cur += 1;
            cmp = node.compare_key(key, cur);
        }

        // Entry keys are the first keys of their children, so the candidate
        // is normally the preceding child. Duplicates of an equal key may
        // also end the preceding child, so look there first.
        let mut visits = 1;
        if cur > 0 && (cmp == Ordering::Less || (cmp == Ordering::Equal && !unique)) {
            cur -= 1;
            if cmp == Ordering::Equal {
                visits = 2;
            }
        }

        for entry in cur..cur + visits {
            let node = &mut self.path[level];
            node.set_cur_entry(entry);
            let child = BlockPtr::new(node.value_at(entry));

            self.load_level(blocks, level + 1, child)?;
            if let Some(record) = self.find_first_at(blocks, level + 1, key)? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Return the next record with key `key` after a successful
    /// `find_first` or `find_next`.
    pub fn find_next(&mut self, blocks: &mut BlockFile, key: &[u8]) -> Result<Option<u32>> {
        if !self.positioned {
            return Ok(None);
        }
        let leaf_level = self.depth as usize - 1;
        let Some(leaf) = self.path.get_mut(leaf_level) else {
            return Ok(None);
        };

        let cur = leaf.cur_entry() + 1;
        leaf.set_cur_entry(cur);
        if cur >= leaf.num_entries() && leaf.next().is_some() {
            let next = leaf.next();
            tracing::trace!(from = %leaf.ptr(), to = %next, "moving to next leaf");
            self.load_level(blocks, leaf_level, next)?;
            self.path[leaf_level].set_cur_entry(0);
        }

        let leaf = &self.path[leaf_level];
        let cur = leaf.cur_entry();
        if cur < leaf.num_entries() && leaf.compare_key(key, cur) == Ordering::Equal {
            return Ok(Some(leaf.value_at(cur)));
        }
        self.positioned = false;
        Ok(None)
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    /// Insert `(key, record)`.
    ///
    /// Duplicate keys are allowed and are inserted before existing equal
    /// keys.
    ///
    /// # Errors
    /// `Error::DepthOverflow` before any node is split or written if the
    /// insert would grow the tree past [`MAX_SUBTREE_DEPTH`] levels.
    pub fn add_entry(&mut self, blocks: &mut BlockFile, key: &[u8], record: u32) -> Result<()> {
        self.find_first(blocks, key)?;
        self.positioned = false;

        // Splits cascade to the root only if every node on the path is full.
        if self.depth >= MAX_SUBTREE_DEPTH
            && self
                .path
                .iter()
                .take(self.depth as usize)
                .all(IndexNode::is_full)
        {
            return Err(Error::DepthOverflow {
                depth: self.depth + 1,
            });
        }

        let leaf_level = self.depth as usize - 1;
        self.add_entry_at(blocks, leaf_level, key, record, Placement::Sorted)
    }

    /// Add an entry to `path[level]`, splitting it first if it is full.
    fn add_entry_at(
        &mut self,
        blocks: &mut BlockFile,
        level: usize,
        key: &[u8],
        value: u32,
        placement: Placement,
    ) -> Result<()> {
        let mut level = level;
        if self.path[level].is_full() {
            if level == 0 {
                self.split_root(blocks)?;
                return self.add_entry_at(blocks, 1, key, value, placement);
            }

            // A split can cascade up to the root; a root split pushes every
            // level below the root down by one.
            let depth_before = self.depth;
            self.split_node(blocks, level)?;
            level += (self.depth - depth_before) as usize;
        }

        self.insert_entry(level, key, value, placement)
    }

    fn insert_entry(
        &mut self,
        level: usize,
        key: &[u8],
        value: u32,
        placement: Placement,
    ) -> Result<()> {
        let node = &mut self.path[level];
        let n = node.num_entries();
        let at = match placement {
            Placement::AfterCurrent { .. } => node.cur_entry() + 1,
            Placement::Sorted => (0..n)
                .find(|&i| node.compare_key(key, i) != Ordering::Greater)
                .unwrap_or(n),
        };

        node.insert_at(at, key, value)?;

        if let Placement::AfterCurrent { make_current: true } = placement {
            node.set_cur_entry(at);
        } else if node.cur_entry() >= at {
            node.set_cur_entry(node.cur_entry() + 1);
        }

        if at == 0 && level > 0 {
            let node_key = node.node_key();
            let ptr = node.ptr();
            self.update_cur_child_entry(level - 1, &node_key, ptr);
        }
        Ok(())
    }

    /// Rewrite the parent entry of the node below `level`.
    fn update_cur_child_entry(&mut self, level: usize, key: &[u8], child: BlockPtr) {
        let parent = &mut self.path[level];
        let cur = parent.cur_entry();
        if cur == 0 && parent.prev().is_none() {
            parent.write_entry(cur, None, child.0);
        } else {
            parent.write_entry(cur, Some(key), child.0);
        }
    }

    /// Record a split of the child below `level`: rewrite the current
    /// entry for the first half and add the second half right after it.
    #[allow(clippy::too_many_arguments)]
    fn update_split_child(
        &mut self,
        blocks: &mut BlockFile,
        level: usize,
        key1: &[u8],
        ptr1: BlockPtr,
        key2: &[u8],
        ptr2: BlockPtr,
        second_is_current: bool,
    ) -> Result<()> {
        self.update_cur_child_entry(level, key1, ptr1);
        self.add_entry_at(
            blocks,
            level,
            key2,
            ptr2.0,
            Placement::AfterCurrent {
                make_current: second_is_current,
            },
        )
    }

    /// Split the full, non-root node `path[level]`.
    ///
    /// The half holding the cursor stays in place; the other half moves to
    /// a new sibling. The parent is updated last, which may split it too.
    fn split_node(&mut self, blocks: &mut BlockFile, level: usize) -> Result<()> {
        let page_size = blocks.page_size();
        let key_length = self.key_length;
        let new_ptr = blocks.allocate()?;

        let this = &mut self.path[level];
        let depth = this.subtree_depth();
        let n = this.num_entries();
        let n1 = (n + 1) / 2;
        let n2 = n - n1;

        let (key1, ptr1, key2, ptr2, second_is_current) = if this.cur_entry() < n1 {
            // Upper half moves to a new node after this one.
            let old_next = this.next();
            let mut new_node =
                IndexNode::create(new_ptr, page_size, key_length, depth, this.ptr(), old_next);
            new_node.set_entries(this.entry_bytes(n1, n2), n2);

            this.truncate(n1);
            this.set_next(new_ptr);
            if old_next.is_some() {
                let mut neighbor = IndexNode::load(blocks, old_next, key_length, depth)?;
                neighbor.set_prev(new_ptr);
                neighbor.commit(blocks)?;
            }
            new_node.commit(blocks)?;

            (this.node_key(), this.ptr(), new_node.node_key(), new_ptr, false)
        } else {
            // Lower half moves to a new node before this one.
            let old_prev = this.prev();
            let mut new_node =
                IndexNode::create(new_ptr, page_size, key_length, depth, old_prev, this.ptr());
            new_node.set_entries(this.entry_bytes(0, n1), n1);

            this.drain_front(n1);
            this.set_cur_entry(this.cur_entry() - n1);
            this.set_prev(new_ptr);
            if old_prev.is_some() {
                let mut neighbor = IndexNode::load(blocks, old_prev, key_length, depth)?;
                neighbor.set_next(new_ptr);
                neighbor.commit(blocks)?;
            }
            new_node.commit(blocks)?;

            (new_node.node_key(), new_ptr, this.node_key(), this.ptr(), true)
        };

        self.splits += 1;
        tracing::trace!(
            node_level = level,
            first = %ptr1,
            second = %ptr2,
            entries = n,
            "split node"
        );

        self.update_split_child(blocks, level - 1, &key1, ptr1, &key2, ptr2, second_is_current)
    }

    /// Grow the tree by one level.
    ///
    /// All root entries move to a single new child, the root points at that
    /// child only, and the child is split right away.
    ///
    /// # Errors
    /// `Error::DepthOverflow` before anything is modified if the new depth
    /// could not be stored in the header.
    fn split_root(&mut self, blocks: &mut BlockFile) -> Result<()> {
        let new_depth = self.depth + 1;
        if new_depth > MAX_SUBTREE_DEPTH {
            return Err(Error::DepthOverflow { depth: new_depth });
        }

        let page_size = blocks.page_size();
        let child_ptr = blocks.allocate()?;

        let root = &mut self.path[0];
        let n = root.num_entries();
        let mut child = IndexNode::create(
            child_ptr,
            page_size,
            self.key_length,
            root.subtree_depth(),
            BlockPtr::NONE,
            BlockPtr::NONE,
        );
        child.set_entries(root.entry_bytes(0, n), n);
        child.set_cur_entry(root.cur_entry());

        root.reset(new_depth);
        root.insert_at(0, &child.node_key(), child_ptr.0)?;
        root.set_cur_entry(0);

        self.depth = new_depth;
        self.path.insert(1, child);
        self.splits += 1;
        tracing::debug!(root = %self.root, depth = new_depth, "split root node");

        self.split_node(blocks, 1)
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Walk every level along its sibling chain and check the tree's
    /// structural invariants.
    ///
    /// Cached nodes are committed first so the walk sees current data.
    pub fn validate(&mut self, blocks: &mut BlockFile) -> Result<IndexSummary> {
        self.commit(blocks)?;

        let mut summary = IndexSummary {
            depth: self.depth,
            nodes_per_level: Vec::with_capacity(self.depth as usize),
            entries: 0,
        };

        // (parent key, child) pairs the current level must match, in order.
        let mut expected: Vec<(Vec<u8>, BlockPtr)> = vec![(vec![0; self.key_length], self.root)];

        for level in 0..self.depth as usize {
            let subtree_depth = self.depth - level as u32;
            let mut children = Vec::new();
            let mut last_key: Option<Vec<u8>> = None;
            let mut prev = BlockPtr::NONE;
            let mut ptr = expected.first().map_or(BlockPtr::NONE, |e| e.1);
            let mut count = 0;

            while ptr.is_some() {
                let node = IndexNode::load(blocks, ptr, self.key_length, subtree_depth)?;
                let Some((parent_key, expected_ptr)) = expected.get(count) else {
                    return Err(Error::corrupt(ptr, "node not referenced by any parent"));
                };
                if *expected_ptr != ptr {
                    return Err(Error::corrupt(
                        ptr,
                        format!("sibling chain diverges from parent entry {}", expected_ptr),
                    ));
                }
                if node.prev() != prev {
                    return Err(Error::corrupt(
                        ptr,
                        format!("prev link {} should be {}", node.prev(), prev),
                    ));
                }

                let n = node.num_entries();
                if n == 0 && self.depth > 1 {
                    return Err(Error::corrupt(ptr, "empty node"));
                }
                if n > 0 && parent_key.as_slice() > node.key_at(0) {
                    return Err(Error::corrupt(ptr, "parent key exceeds the node's first key"));
                }

                for i in 0..n {
                    let key = node.key_at(i);
                    if last_key.as_deref().is_some_and(|last| key < last) {
                        return Err(Error::corrupt(ptr, format!("entry {} is out of order", i)));
                    }
                    last_key = Some(key.to_vec());

                    if !node.is_leaf() {
                        if i == 0 && prev.is_none() && key.iter().any(|&b| b != 0) {
                            return Err(Error::corrupt(
                                ptr,
                                "first node of an internal level must start with a zero key",
                            ));
                        }
                        children.push((key.to_vec(), BlockPtr::new(node.value_at(i))));
                    }
                }

                if node.is_leaf() {
                    summary.entries += n;
                }
                prev = ptr;
                ptr = node.next();
                count += 1;
            }

            if count != expected.len() {
                return Err(Error::corrupt(
                    prev,
                    format!(
                        "level {} chain has {} nodes, parents reference {}",
                        level,
                        count,
                        expected.len()
                    ),
                ));
            }

            summary.nodes_per_level.push(count);
            expected = children;
        }

        Ok(summary)
    }

    /// Write every node, level by level, to `out`.
    pub fn dump(&mut self, blocks: &mut BlockFile, out: &mut dyn Write) -> Result<()> {
        self.commit(blocks)?;

        writeln!(
            out,
            "  root {} depth {} key length {}",
            self.root, self.depth, self.key_length
        )?;

        let mut first = self.root;
        for level in 0..self.depth as usize {
            let subtree_depth = self.depth - level as u32;
            let mut ptr = first;
            first = BlockPtr::NONE;

            while ptr.is_some() {
                let node = IndexNode::load(blocks, ptr, self.key_length, subtree_depth)?;
                writeln!(
                    out,
                    "  level {} node {} ({} entries, prev {}, next {})",
                    level,
                    ptr,
                    node.num_entries(),
                    node.prev(),
                    node.next()
                )?;
                for i in 0..node.num_entries() {
                    let key: String = node.key_at(i).iter().map(|b| format!("{:02x}", b)).collect();
                    writeln!(out, "    {:>3}: {} -> {}", i, key, node.value_at(i))?;
                }
                if first.is_none() && !node.is_leaf() && node.num_entries() > 0 {
                    first = BlockPtr::new(node.value_at(0));
                }
                ptr = node.next();
            }
        }
        Ok(())
    }
}

impl fmt::Debug for IndexTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexTree")
            .field("root", &self.root)
            .field("key_length", &self.key_length)
            .field("depth", &self.depth)
            .field("unique", &self.unique)
            .field("field_type", &self.field_type)
            .field("cached_levels", &self.path.len())
            .finish()
    }
}
