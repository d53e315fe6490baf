//! Block pointer type.

use std::fmt;

/// Byte offset of a block in the index file.
///
/// Pointers are stored on disk as 32-bit integers. Offset 0 is the header
/// block, so a zero pointer doubles as "no block" in sibling links and
/// descriptors.
///
/// # Example
/// ```
/// use tabindex::BlockPtr;
///
/// let ptr = BlockPtr::new(1024);
/// assert!(ptr.is_some());
/// assert!(BlockPtr::NONE.is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlockPtr(pub u32);

impl BlockPtr {
    /// The null pointer.
    pub const NONE: BlockPtr = BlockPtr(0);

    /// Create a new BlockPtr.
    #[inline]
    pub fn new(offset: u32) -> Self {
        BlockPtr(offset)
    }

    /// Check if this pointer is null.
    #[inline]
    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// Check if this pointer references a block.
    #[inline]
    pub fn is_some(&self) -> bool {
        !self.is_none()
    }

    /// File offset of the block.
    #[inline]
    pub fn offset(&self) -> u64 {
        u64::from(self.0)
    }
}

impl fmt::Display for BlockPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "Block(NONE)")
        } else {
            write!(f, "Block({})", self.0)
        }
    }
}
