//! Block - an in-memory copy of one fixed-size region of the index file.
//!
//! A [`Block`] is a raw byte buffer with big-endian accessors and a dirty
//! flag. Header blocks and node pages are both held in blocks.

/// A block of file data.
///
/// All multi-byte integers in the index file are big-endian; the accessors
/// here are the only place that encodes or decodes them. Every mutating
/// accessor marks the block dirty so that commits can skip clean blocks.
///
/// # Panics
/// Accessors panic if the requested range lies outside the block. Callers
/// compute offsets from validated entry counts.
///
/// # Example
/// ```
/// use tabindex::storage::Block;
///
/// let mut block = Block::new(512);
/// block.write_u32(4, 0x0102_0304);
/// assert_eq!(block.as_slice()[4..8], [1, 2, 3, 4]);
/// assert!(block.is_dirty());
/// ```
#[derive(Clone)]
pub struct Block {
    data: Vec<u8>,
    dirty: bool,
}

impl Block {
    /// Create a new zeroed block.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0u8; size],
            dirty: false,
        }
    }

    /// Wrap bytes read from storage. The block starts clean.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data, dirty: false }
    }

    /// Get immutable slice of block data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Size of the block in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the block has no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the block was modified since it was read or last committed.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the block as matching its on-disk copy.
    #[inline]
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn read_u8(&self, offset: usize) -> u8 {
        self.data[offset]
    }

    pub fn write_u8(&mut self, offset: usize, value: u8) {
        self.dirty = true;
        self.data[offset] = value;
    }

    pub fn read_u16(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.data[offset], self.data[offset + 1]])
    }

    pub fn write_u16(&mut self, offset: usize, value: u16) {
        self.write_bytes(offset, &value.to_be_bytes());
    }

    pub fn read_u32(&self, offset: usize) -> u32 {
        u32::from_be_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ])
    }

    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.write_bytes(offset, &value.to_be_bytes());
    }

    /// Borrow `len` bytes starting at `offset`.
    #[inline]
    pub fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.dirty = true;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Zero `len` bytes starting at `offset`.
    pub fn zero(&mut self, offset: usize, len: usize) {
        self.dirty = true;
        self.data[offset..offset + len].fill(0);
    }

    /// Move `len` bytes from `src` to `dest` within the block. The ranges
    /// may overlap.
    pub fn move_bytes(&mut self, src: usize, dest: usize, len: usize) {
        self.dirty = true;
        self.data.copy_within(src..src + len, dest);
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("len", &self.data.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
