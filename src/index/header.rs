//! Index file header.
//!
//! # Layout (big-endian)
//! ```text
//! Offset  Size  Field
//! ------  ----  -----------------------------
//!  0      4     Magic (24242424)
//!  4      2     Constant 100
//!  6      2     Node page size
//!  8      4     Constant 0
//! 12      2     Number of index slots
//! 14      2     Constant 0x15e7
//! 16      2     Constant 10
//! 18      2     Constant 0x611d
//! 20     28     Zero
//! 48     16*n   Index descriptors
//! ```
//!
//! Each descriptor:
//! ```text
//!  0      4     Root node pointer (0 = empty slot)
//!  4      2     Max entries per node
//!  6      1     Subtree depth
//!  7      1     Key length
//!  8      8     Zero
//! ```

use crate::common::config::{
    DEFAULT_PAGE_SIZE, HEADER_SIZE, MAX_INDEXES, MAX_KEY_LENGTH, MAX_SUBTREE_DEPTH,
};
use crate::common::{BlockPtr, Error, Result};
use crate::storage::Block;

/// Magic number at the start of every index file.
pub const IND_MAGIC: u32 = 24_242_424;

const OFFSET_MAGIC: usize = 0;
const OFFSET_VERSION: usize = 4;
/// Node page size. Other writers always store 512 (or 0) here, so their
/// files are read with 512-byte nodes.
const OFFSET_PAGE_SIZE: usize = 6;
const OFFSET_RESERVED: usize = 8;
const OFFSET_NUM_INDEXES: usize = 12;
const OFFSET_UNKNOWN: usize = 14;
const DESCRIPTORS_START: usize = 48;
const DESCRIPTOR_SIZE: usize = 16;

/// Persisted description of one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub root: BlockPtr,
    pub max_entries: u16,
    pub subtree_depth: u32,
    pub key_length: usize,
}

/// Decoded header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub page_size: usize,
    /// One entry per slot; `None` for slots whose root pointer is 0.
    pub descriptors: Vec<Option<IndexDescriptor>>,
}

impl FileHeader {
    /// Header of a file with no indexes.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            descriptors: Vec::new(),
        }
    }

    /// Decode and validate a header block.
    ///
    /// # Errors
    /// - `Error::InvalidMagic` if the magic number is wrong.
    /// - `Error::InvalidIndexCount` if the slot count is outside `1..=29`.
    /// - `Error::Corrupt` if a present descriptor has an invalid key length
    ///   or depth.
    ///
    /// The word at offset 6 is taken as the node page size, with 0 read as
    /// 512. Files from other writers are assumed to hold 512 there.
    pub fn from_block(block: &Block) -> Result<Self> {
        let magic = block.read_u32(OFFSET_MAGIC);
        if magic != IND_MAGIC {
            return Err(Error::InvalidMagic {
                found: magic,
                expected: IND_MAGIC,
            });
        }

        let count = block.read_u16(OFFSET_NUM_INDEXES);
        if count == 0 || usize::from(count) > MAX_INDEXES {
            return Err(Error::InvalidIndexCount(count));
        }

        let page_size = match block.read_u16(OFFSET_PAGE_SIZE) {
            0 => DEFAULT_PAGE_SIZE,
            n => usize::from(n),
        };

        let mut descriptors = Vec::with_capacity(usize::from(count));
        for slot in 0..usize::from(count) {
            let base = DESCRIPTORS_START + slot * DESCRIPTOR_SIZE;
            let root = BlockPtr::new(block.read_u32(base));
            if root.is_none() {
                descriptors.push(None);
                continue;
            }

            let max_entries = block.read_u16(base + 4);
            let subtree_depth = u32::from(block.read_u8(base + 6));
            let key_length = usize::from(block.read_u8(base + 7));

            if key_length == 0 || key_length > MAX_KEY_LENGTH {
                return Err(Error::corrupt(
                    BlockPtr::NONE,
                    format!("index {} has key length {}", slot + 1, key_length),
                ));
            }
            if subtree_depth == 0 {
                return Err(Error::corrupt(
                    BlockPtr::NONE,
                    format!("index {} has subtree depth 0", slot + 1),
                ));
            }

            descriptors.push(Some(IndexDescriptor {
                root,
                max_entries,
                subtree_depth,
                key_length,
            }));
        }

        Ok(Self {
            page_size,
            descriptors,
        })
    }

    /// Encode into a fresh header block.
    ///
    /// # Errors
    /// `Error::DepthOverflow` if a tree is deeper than one byte can record.
    pub fn to_block(&self) -> Result<Block> {
        let mut block = Block::new(HEADER_SIZE);

        block.write_u32(OFFSET_MAGIC, IND_MAGIC);
        block.write_u16(OFFSET_VERSION, 100);
        block.write_u16(OFFSET_PAGE_SIZE, u16::try_from(self.page_size).unwrap_or(0));
        block.write_u32(OFFSET_RESERVED, 0);
        // Slot count never exceeds MAX_INDEXES.
        block.write_u16(OFFSET_NUM_INDEXES, self.descriptors.len() as u16);
        block.write_u16(OFFSET_UNKNOWN, 0x15e7);
        block.write_u16(OFFSET_UNKNOWN + 2, 10);
        block.write_u16(OFFSET_UNKNOWN + 4, 0x611d);

        for (slot, descriptor) in self.descriptors.iter().enumerate() {
            let Some(desc) = descriptor else {
                continue;
            };
            if desc.subtree_depth > MAX_SUBTREE_DEPTH {
                return Err(Error::DepthOverflow {
                    depth: desc.subtree_depth,
                });
            }

            let base = DESCRIPTORS_START + slot * DESCRIPTOR_SIZE;
            block.write_u32(base, desc.root.0);
            block.write_u16(base + 4, desc.max_entries);
            block.write_u8(base + 6, desc.subtree_depth as u8);
            block.write_u8(base + 7, desc.key_length as u8);
        }

        Ok(block)
    }
}
