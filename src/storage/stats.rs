//! Block I/O statistics.

use std::fmt;

/// Counters kept by a [`BlockFile`](super::BlockFile).
///
/// The engine is single-threaded, so these are plain counters rather than
/// atomics. [`BlockFile::stats`](super::BlockFile::stats) hands out a copy.
///
/// # Example
/// ```
/// use tabindex::storage::IoStats;
///
/// let stats = IoStats { blocks_read: 3, blocks_written: 1, blocks_allocated: 2 };
/// assert_eq!(stats.total_io(), 4);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoStats {
    /// Number of blocks read from storage.
    pub blocks_read: u64,

    /// Number of blocks written to storage.
    pub blocks_written: u64,

    /// Number of node blocks handed out by the allocator.
    pub blocks_allocated: u64,
}

impl IoStats {
    /// Reads plus writes.
    pub fn total_io(&self) -> u64 {
        self.blocks_read + self.blocks_written
    }

    /// Reset all counters to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Display for IoStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IoStats {{ read: {}, written: {}, allocated: {} }}",
            self.blocks_read, self.blocks_written, self.blocks_allocated
        )
    }
}
