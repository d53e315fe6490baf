//! Block file - block-granular I/O and allocation over a [`BlockStorage`].

use crate::common::config::HEADER_SIZE;
use crate::common::{BlockPtr, Error, Result};

use super::block::Block;
use super::block_storage::BlockStorage;
use super::stats::IoStats;

/// Reads, writes and allocates blocks of one index file.
///
/// # Allocation
/// The header block always sits at offset 0. Node blocks are handed out
/// after it in steps of the page size:
/// ```text
/// 0        512      512+P    512+2P
/// │ header │ node 1 │ node 2 │ ...
/// ```
/// The cursor only moves forward; blocks are never freed. When an existing
/// file is opened, the cursor resumes after its last (possibly partial)
/// block.
pub struct BlockFile {
    storage: Box<dyn BlockStorage>,
    page_size: usize,
    /// Offset of the next block to hand out.
    next_block: u64,
    stats: IoStats,
}

impl BlockFile {
    /// Wrap `storage`, positioning the allocator after its current end.
    pub fn new(mut storage: Box<dyn BlockStorage>, page_size: usize) -> Result<Self> {
        let len = storage.len()?;
        let header = HEADER_SIZE as u64;
        let page = page_size as u64;
        let next_block = if len <= header {
            header
        } else {
            header + (len - header).div_ceil(page) * page
        };

        Ok(Self {
            storage,
            page_size,
            next_block,
            stats: IoStats::default(),
        })
    }

    /// Size of node blocks in bytes.
    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Change the node block size. Used when an existing file's header
    /// records a page size different from the one requested.
    pub fn set_page_size(&mut self, page_size: usize) -> Result<()> {
        let len = self.storage.len()?;
        self.page_size = page_size;
        let header = HEADER_SIZE as u64;
        let page = page_size as u64;
        self.next_block = if len <= header {
            header
        } else {
            header + (len - header).div_ceil(page) * page
        };
        Ok(())
    }

    /// Read `size` bytes at `ptr` into a fresh block.
    pub fn read_block(&mut self, ptr: BlockPtr, size: usize) -> Result<Block> {
        let mut data = vec![0u8; size];
        self.storage.read_at(ptr.offset(), &mut data)?;
        self.stats.blocks_read += 1;
        Ok(Block::from_vec(data))
    }

    /// Write `block` at `ptr` and mark it clean.
    pub fn write_block(&mut self, ptr: BlockPtr, block: &mut Block) -> Result<()> {
        self.storage.write_at(ptr.offset(), block.as_slice())?;
        self.stats.blocks_written += 1;
        block.mark_clean();
        Ok(())
    }

    /// Reserve the next node block.
    ///
    /// Nothing is written; the block reaches storage when its node is
    /// committed.
    ///
    /// # Errors
    /// `Error::FileTooLarge` if the offset would not fit a block pointer.
    pub fn allocate(&mut self) -> Result<BlockPtr> {
        let offset = u32::try_from(self.next_block).map_err(|_| Error::FileTooLarge)?;
        self.next_block += self.page_size as u64;
        self.stats.blocks_allocated += 1;
        Ok(BlockPtr::new(offset))
    }

    /// Offset the next allocation will return.
    #[inline]
    pub fn next_block(&self) -> u64 {
        self.next_block
    }

    /// Flush storage to durable media.
    pub fn sync(&mut self) -> Result<()> {
        self.storage.sync()
    }

    /// Current I/O counters.
    #[inline]
    pub fn stats(&self) -> IoStats {
        self.stats
    }
}
