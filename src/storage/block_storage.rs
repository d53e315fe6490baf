//! Block storage - the byte-addressed backing store under an index file.
//!
//! The index engine only needs positioned reads and writes, the current
//! length, and a durability barrier. [`BlockStorage`] captures that seam;
//! [`FileStorage`] implements it on a real file and [`MemStorage`] on a
//! shared in-memory buffer.

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::rc::Rc;

use crate::common::{AccessMode, Result};

/// Positioned byte storage.
///
/// Implementations are used by a single index file at a time and are not
/// required to be thread-safe.
pub trait BlockStorage {
    /// Fill `buf` with the bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns an I/O error if the range extends past the end of storage.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Write `data` at `offset`, extending the storage if needed.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// Current length in bytes.
    fn len(&mut self) -> Result<u64>;

    /// Whether the storage holds no bytes.
    fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Flush written data to durable storage.
    fn sync(&mut self) -> Result<()>;
}

/// [`BlockStorage`] backed by a file on disk.
///
/// # File Layout
/// ```text
/// ┌──────────┬─────────┬─────────┬─────────┐
/// │  Header  │ Node    │ Node    │  ...    │
/// │ (512 B)  │ (page)  │ (page)  │         │
/// └──────────┴─────────┴─────────┴─────────┘
/// Offset: 0    512     512+page   ...
/// ```
///
/// Writes are not synced individually; [`BlockStorage::sync`] is called
/// when the index file is flushed or closed.
pub struct FileStorage {
    file: File,
}

impl FileStorage {
    /// Open the file at `path` for the given access mode.
    ///
    /// - `Read`: the file must exist and is opened read-only.
    /// - `Write`: the file is created, or truncated if it exists.
    /// - `ReadWrite`: the file must exist and is opened for update.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened in that mode.
    pub fn open<P: AsRef<Path>>(path: P, mode: AccessMode) -> Result<Self> {
        let mut options = OpenOptions::new();
        match mode {
            AccessMode::Read => options.read(true),
            AccessMode::Write => options.read(true).write(true).create(true).truncate(true),
            AccessMode::ReadWrite => options.read(true).write(true),
        };
        let file = options.open(path)?;

        Ok(Self { file })
    }
}

impl BlockStorage for FileStorage {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }

    fn len(&mut self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

/// [`BlockStorage`] backed by memory.
///
/// Clones share the same bytes, so a test can keep a handle, close the
/// index file, and reopen it from the handle.
///
/// # Example
/// ```
/// use tabindex::storage::{BlockStorage, MemStorage};
///
/// let mut storage = MemStorage::new();
/// let mut view = storage.clone();
/// storage.write_at(4, &[7, 8]).unwrap();
/// assert_eq!(view.len().unwrap(), 6);
/// assert_eq!(view.to_vec(), vec![0, 0, 0, 0, 7, 8]);
/// ```
#[derive(Clone, Default)]
pub struct MemStorage {
    data: Rc<RefCell<Vec<u8>>>,
}

impl MemStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage holding `bytes`.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            data: Rc::new(RefCell::new(bytes)),
        }
    }

    /// Copy out the current contents.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.borrow().clone()
    }
}

impl BlockStorage for MemStorage {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let data = self.data.borrow();
        let start = usize::try_from(offset).map_err(|_| eof())?;
        let end = start.checked_add(buf.len()).ok_or_else(eof)?;
        if end > data.len() {
            return Err(eof().into());
        }
        buf.copy_from_slice(&data[start..end]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let mut data = self.data.borrow_mut();
        let start = usize::try_from(offset).map_err(|_| eof())?;
        let end = start + bytes.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn len(&mut self) -> Result<u64> {
        Ok(self.data.borrow().len() as u64)
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

fn eof() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of storage")
}
