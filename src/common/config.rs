//! Configuration constants and per-file settings.

use std::fmt;

use super::error::{Error, Result};

/// Size of the header block at the start of every index file.
///
/// The header always occupies the first 512 bytes, whatever the node page
/// size. Node blocks are allocated after it.
pub const HEADER_SIZE: usize = 512;

/// Default size of a node page in bytes.
///
/// This is the size every file written by other tools uses.
pub const DEFAULT_PAGE_SIZE: usize = 512;

/// Smallest node page size accepted by [`IndexConfig::validate`].
pub const MIN_PAGE_SIZE: usize = 64;

/// Largest node page size (must fit the 16-bit header word).
pub const MAX_PAGE_SIZE: usize = 32768;

/// Maximum number of indexes one file can hold.
pub const MAX_INDEXES: usize = 29;

/// Maximum key length in bytes. Longer text fields are truncated.
pub const MAX_KEY_LENGTH: usize = 128;

/// Maximum subtree depth, bounded by the one-byte header field.
pub const MAX_SUBTREE_DEPTH: u32 = 255;

/// A node must hold at least this many entries for splitting to make
/// progress.
pub const MIN_ENTRIES_PER_NODE: usize = 3;

/// How an index file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read an existing file. Searches only.
    Read,
    /// Create a new file (truncating any existing one).
    Write,
    /// Open an existing file for searching and updating.
    ReadWrite,
}

impl AccessMode {
    /// Whether indexes and entries may be added in this mode.
    #[inline]
    pub fn is_writable(self) -> bool {
        matches!(self, AccessMode::Write | AccessMode::ReadWrite)
    }

    /// Whether the header is read from an existing file on open.
    #[inline]
    pub fn reads_existing(self) -> bool {
        matches!(self, AccessMode::Read | AccessMode::ReadWrite)
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::Read => write!(f, "read"),
            AccessMode::Write => write!(f, "write"),
            AccessMode::ReadWrite => write!(f, "read-write"),
        }
    }
}

/// Settings applied when an index file is created.
///
/// Files opened for reading take their page size from the header instead.
///
/// # Example
/// ```
/// use tabindex::IndexConfig;
///
/// let config = IndexConfig::default().with_page_size(1024);
/// assert_eq!(config.page_size, 1024);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    /// Size of every node page in bytes.
    pub page_size: usize,
}

impl IndexConfig {
    /// Set the node page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Check that the settings describe a usable file.
    pub fn validate(&self) -> Result<()> {
        validate_page_size(self.page_size)
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

pub(crate) fn validate_page_size(page_size: usize) -> Result<()> {
    if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(Error::InvalidPageSize(page_size));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_holds_all_descriptors() {
        // 48 bytes of file header plus one 16-byte descriptor per index.
        assert_eq!(48 + MAX_INDEXES * 16, HEADER_SIZE);
    }

    #[test]
    fn test_default_config() {
        let config = IndexConfig::default();
        assert_eq!(config.page_size, 512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_page_size_bounds() {
        assert!(IndexConfig::default().with_page_size(MIN_PAGE_SIZE).validate().is_ok());
        assert!(IndexConfig::default().with_page_size(MAX_PAGE_SIZE).validate().is_ok());
        assert!(IndexConfig::default().with_page_size(32).validate().is_err());
        assert!(IndexConfig::default().with_page_size(65536).validate().is_err());
    }

    #[test]
    fn test_access_mode() {
        assert!(!AccessMode::Read.is_writable());
        assert!(AccessMode::Write.is_writable());
        assert!(AccessMode::ReadWrite.is_writable());
        assert!(!AccessMode::Write.reads_existing());
        assert_eq!(format!("{}", AccessMode::ReadWrite), "read-write");
    }
}
