//! Index file - up to 29 B-tree indexes sharing one `.ind` file.
//!
//! # Lifecycle
//! ```text
//! IndexFile::new() ──open()──> open (Read | Write | ReadWrite) ──close()──> closed
//! ```
//! Every other operation fails with `Error::NotOpen` while the file is
//! closed. Dropping an open file closes it.
//!
//! # Example
//! ```no_run
//! use tabindex::{AccessMode, FieldType, IndexConfig, IndexFile, KeyValue};
//!
//! let mut file = IndexFile::new(IndexConfig::default());
//! file.open("roads.ind", AccessMode::Write).unwrap();
//!
//! let id = file.create_index(FieldType::Char, 20).unwrap();
//! file.add_entry_value(id, &KeyValue::Text("Main St"), 1).unwrap();
//! file.add_entry_value(id, &KeyValue::Text("Elm St"), 2).unwrap();
//! assert_eq!(file.find_first_value(id, &KeyValue::Text("main st")).unwrap(), Some(1));
//!
//! file.close().unwrap();
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::common::config::{
    validate_page_size, HEADER_SIZE, MAX_INDEXES, MIN_ENTRIES_PER_NODE,
};
use crate::common::{AccessMode, BlockPtr, Error, IndexConfig, IndexId, Result};
use crate::storage::{BlockFile, BlockStorage, FileStorage, IoStats};

use super::btree::{node_capacity, IndexInfo, IndexSummary, IndexTree};
use super::header::FileHeader;
use super::key::{FieldType, KeyValue};

/// Header block location.
const HEADER_PTR: BlockPtr = BlockPtr::NONE;

/// Path of the index file belonging to `path`.
///
/// Any extension other than `.ind` (any case) is replaced with `.ind`. If
/// that file does not exist but an upper-case `.IND` one does, the
/// upper-case path is returned.
pub fn resolve_index_path(path: &Path) -> PathBuf {
    let is_ind = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ind"));
    if is_ind {
        return path.to_path_buf();
    }

    let lower = path.with_extension("ind");
    if !lower.exists() {
        let upper = path.with_extension("IND");
        if upper.exists() {
            return upper;
        }
    }
    lower
}

/// A field index file.
///
/// Indexes are numbered from 1 in header order. A table engine typically
/// creates one index per indexed field, sets its field type, and then adds
/// `(key, record number)` pairs as records are written.
pub struct IndexFile {
    config: IndexConfig,
    inner: Option<OpenIndexFile>,
}

struct OpenIndexFile {
    path: Option<PathBuf>,
    mode: AccessMode,
    blocks: BlockFile,
    indexes: Vec<Option<IndexSlot>>,
}

struct IndexSlot {
    tree: IndexTree,
    /// Reused by `build_key`.
    key_buf: Vec<u8>,
}

impl IndexSlot {
    fn new(tree: IndexTree) -> Self {
        let key_buf = vec![0u8; tree.key_length()];
        Self { tree, key_buf }
    }

    fn build_key(&mut self, id: IndexId, value: &KeyValue<'_>) -> Result<()> {
        let codec = self.tree.codec().ok_or(Error::FieldTypeNotSet(id.0))?;
        codec.encode(value, &mut self.key_buf)
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.len() != self.tree.key_length() {
            return Err(Error::KeySizeMismatch {
                found: key.len(),
                expected: self.tree.key_length(),
            });
        }
        Ok(())
    }
}

impl OpenIndexFile {
    fn slot(&self, id: IndexId) -> Result<&IndexSlot> {
        match self.indexes.get(id.slot()) {
            Some(Some(slot)) => Ok(slot),
            _ => Err(Error::InvalidIndexId {
                id: id.0,
                count: self.indexes.len(),
            }),
        }
    }

    fn slot_mut(&mut self, id: IndexId) -> Result<(&mut BlockFile, &mut IndexSlot)> {
        let count = self.indexes.len();
        match self.indexes.get_mut(id.slot()) {
            Some(Some(slot)) => Ok((&mut self.blocks, slot)),
            _ => Err(Error::InvalidIndexId { id: id.0, count }),
        }
    }

    fn check_writable(&self) -> Result<()> {
        if !self.mode.is_writable() {
            return Err(Error::NotWritable(self.mode));
        }
        Ok(())
    }

    /// Commit every tree, then rewrite the header. No-op in read mode.
    fn commit(&mut self) -> Result<()> {
        if !self.mode.is_writable() {
            return Ok(());
        }

        for slot in self.indexes.iter_mut().flatten() {
            slot.tree.commit(&mut self.blocks)?;
        }

        let page_size = self.blocks.page_size();
        let header = FileHeader {
            page_size,
            descriptors: self
                .indexes
                .iter()
                .map(|slot| slot.as_ref().map(|s| s.tree.descriptor(page_size)))
                .collect(),
        };
        let mut block = header.to_block()?;
        self.blocks.write_block(HEADER_PTR, &mut block)?;
        self.blocks.sync()
    }
}

impl IndexFile {
    /// Create a closed index file handle.
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            inner: None,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open the index file for `path`, resolved with
    /// [`resolve_index_path`].
    ///
    /// # Errors
    /// - `Error::AlreadyOpen` if a file is already open.
    /// - `Error::Io` if the file cannot be opened in `mode`.
    /// - `Error::InvalidMagic` / `Error::InvalidIndexCount` for a corrupt
    ///   header when reading.
    pub fn open<P: AsRef<Path>>(&mut self, path: P, mode: AccessMode) -> Result<()> {
        if self.inner.is_some() {
            return Err(Error::AlreadyOpen);
        }

        let path = resolve_index_path(path.as_ref());
        let storage = FileStorage::open(&path, mode)?;
        self.open_with(Box::new(storage), mode, Some(path))
    }

    /// Open an index file over arbitrary block storage.
    pub fn open_storage(&mut self, storage: Box<dyn BlockStorage>, mode: AccessMode) -> Result<()> {
        self.open_with(storage, mode, None)
    }

    fn open_with(
        &mut self,
        storage: Box<dyn BlockStorage>,
        mode: AccessMode,
        path: Option<PathBuf>,
    ) -> Result<()> {
        if self.inner.is_some() {
            return Err(Error::AlreadyOpen);
        }
        self.config.validate()?;

        let mut blocks = BlockFile::new(storage, self.config.page_size)?;
        let mut indexes = Vec::new();

        if mode.reads_existing() {
            let header_block = blocks.read_block(HEADER_PTR, HEADER_SIZE)?;
            let header = FileHeader::from_block(&header_block)?;
            validate_page_size(header.page_size)?;
            if header.page_size != blocks.page_size() {
                blocks.set_page_size(header.page_size)?;
            }

            for desc in &header.descriptors {
                let slot = match desc {
                    Some(desc) => {
                        check_capacity(header.page_size, desc.key_length)?;
                        Some(IndexSlot::new(IndexTree::open(&mut blocks, desc)?))
                    }
                    None => None,
                };
                indexes.push(slot);
            }
        }

        let mut file = OpenIndexFile {
            path,
            mode,
            blocks,
            indexes,
        };

        if mode == AccessMode::Write {
            file.commit()?;
        }

        tracing::debug!(
            path = ?file.path,
            mode = %mode,
            indexes = file.indexes.len(),
            page_size = file.blocks.page_size(),
            "opened index file"
        );
        self.inner = Some(file);
        Ok(())
    }

    /// Flush all changes and release the file.
    ///
    /// In write modes, every cached node is committed before the header
    /// that references it is rewritten. The file is released even if the
    /// final write fails. Closing a closed file does nothing.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut file) = self.inner.take() else {
            return Ok(());
        };

        let result = file.commit();
        tracing::debug!(
            path = ?file.path,
            stats = %file.blocks.stats(),
            ok = result.is_ok(),
            "closed index file"
        );
        result
    }

    /// Commit all cached nodes and rewrite the header without closing.
    pub fn flush(&mut self) -> Result<()> {
        self.open_file_mut()?.commit()
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Access mode of the open file.
    pub fn mode(&self) -> Option<AccessMode> {
        self.inner.as_ref().map(|f| f.mode)
    }

    /// Resolved path of the open file, if it lives on disk.
    pub fn path(&self) -> Option<&Path> {
        self.inner.as_ref().and_then(|f| f.path.as_deref())
    }

    /// Number of index slots, including empty ones. 0 when closed.
    pub fn num_indexes(&self) -> usize {
        self.inner.as_ref().map_or(0, |f| f.indexes.len())
    }

    /// I/O counters of the open file.
    pub fn stats(&self) -> Result<IoStats> {
        Ok(self.open_file()?.blocks.stats())
    }

    fn open_file(&self) -> Result<&OpenIndexFile> {
        self.inner.as_ref().ok_or(Error::NotOpen)
    }

    fn open_file_mut(&mut self) -> Result<&mut OpenIndexFile> {
        self.inner.as_mut().ok_or(Error::NotOpen)
    }

    fn writable_file_mut(&mut self) -> Result<&mut OpenIndexFile> {
        let file = self.open_file_mut()?;
        file.check_writable()?;
        Ok(file)
    }

    // ========================================================================
    // Index management
    // ========================================================================

    /// Add an empty index on a field of `field_type` and `width`.
    ///
    /// The first empty slot is reused; otherwise a slot is appended.
    ///
    /// # Errors
    /// - `Error::NotWritable` in read mode.
    /// - `Error::UnsupportedFieldType` for date-time fields.
    /// - `Error::InvalidFieldWidth` for a text field of width 0.
    /// - `Error::PageTooSmall` if a node could not hold enough keys.
    /// - `Error::TooManyIndexes` if all 29 slots are in use.
    pub fn create_index(&mut self, field_type: FieldType, width: usize) -> Result<IndexId> {
        let file = self.writable_file_mut()?;

        if !field_type.is_indexable() {
            return Err(Error::UnsupportedFieldType(field_type));
        }
        let key_length = field_type.key_length(width)?;
        check_capacity(file.blocks.page_size(), key_length)?;

        let free = file.indexes.iter().position(Option::is_none);
        if free.is_none() && file.indexes.len() >= MAX_INDEXES {
            return Err(Error::TooManyIndexes);
        }

        let mut tree = IndexTree::create(&mut file.blocks, key_length)?;
        tree.set_field_type(field_type)?;

        let slot = match free {
            Some(slot) => {
                file.indexes[slot] = Some(IndexSlot::new(tree));
                slot
            }
            None => {
                file.indexes.push(Some(IndexSlot::new(tree)));
                file.indexes.len() - 1
            }
        };

        let id = IndexId::from_slot(slot);
        tracing::debug!(index = %id, %field_type, key_length, "created index");
        Ok(id)
    }

    /// Select the key encoding of an index.
    ///
    /// # Errors
    /// `Error::UnsupportedFieldType` or `Error::KeyLengthMismatch` if the
    /// index key length does not fit `field_type`.
    pub fn set_index_field_type(&mut self, id: IndexId, field_type: FieldType) -> Result<()> {
        let (_, slot) = self.open_file_mut()?.slot_mut(id)?;
        slot.tree.set_field_type(field_type)
    }

    /// Mark an index as holding unique keys, which lets searches skip the
    /// duplicate check in internal nodes.
    pub fn set_index_unique(&mut self, id: IndexId, unique: bool) -> Result<()> {
        let (_, slot) = self.open_file_mut()?.slot_mut(id)?;
        slot.tree.set_unique(unique);
        Ok(())
    }

    /// Describe one index.
    pub fn index_info(&self, id: IndexId) -> Result<IndexInfo> {
        let file = self.open_file()?;
        let slot = file.slot(id)?;
        Ok(slot.tree.info(file.blocks.page_size()))
    }

    /// Check the structural invariants of one index.
    pub fn validate_index(&mut self, id: IndexId) -> Result<IndexSummary> {
        let (blocks, slot) = self.open_file_mut()?.slot_mut(id)?;
        slot.tree.validate(blocks)
    }

    // ========================================================================
    // Keys and entries
    // ========================================================================

    /// Encode `value` with the index's codec into the index's key buffer.
    ///
    /// The buffer is overwritten by the next call for the same index.
    ///
    /// # Errors
    /// - `Error::FieldTypeNotSet` if no field type was set.
    /// - `Error::ValueTypeMismatch` if `value` does not fit the codec.
    pub fn build_key(&mut self, id: IndexId, value: &KeyValue<'_>) -> Result<&[u8]> {
        let (_, slot) = self.open_file_mut()?.slot_mut(id)?;
        slot.build_key(id, value)?;
        Ok(&slot.key_buf)
    }

    /// Find the first record with `key`.
    pub fn find_first(&mut self, id: IndexId, key: &[u8]) -> Result<Option<u32>> {
        let (blocks, slot) = self.open_file_mut()?.slot_mut(id)?;
        slot.check_key(key)?;
        slot.tree.find_first(blocks, key)
    }

    /// Find the next record with `key` after `find_first`. Returns
    /// `None` once all records with `key` have been returned.
    pub fn find_next(&mut self, id: IndexId, key: &[u8]) -> Result<Option<u32>> {
        let (blocks, slot) = self.open_file_mut()?.slot_mut(id)?;
        slot.check_key(key)?;
        slot.tree.find_next(blocks, key)
    }

    /// Add `(key, record)` to an index.
    ///
    /// A failed insert may leave the index inconsistent; it should not be
    /// used further.
    ///
    /// # Errors
    /// - `Error::NotWritable` in read mode.
    /// - `Error::InvalidRecordNumber` for record 0.
    /// - `Error::KeySizeMismatch` if `key` has the wrong length.
    /// - `Error::DepthOverflow` if the tree would exceed 255 levels.
    pub fn add_entry(&mut self, id: IndexId, key: &[u8], record: u32) -> Result<()> {
        if record == 0 {
            return Err(Error::InvalidRecordNumber);
        }
        let (blocks, slot) = self.writable_file_mut()?.slot_mut(id)?;
        slot.check_key(key)?;
        slot.tree.add_entry(blocks, key, record)
    }

    /// [`find_first`](Self::find_first) with a key built from `value`.
    pub fn find_first_value(&mut self, id: IndexId, value: &KeyValue<'_>) -> Result<Option<u32>> {
        let (blocks, slot) = self.open_file_mut()?.slot_mut(id)?;
        slot.build_key(id, value)?;
        slot.tree.find_first(blocks, &slot.key_buf)
    }

    /// [`find_next`](Self::find_next) with a key built from `value`.
    pub fn find_next_value(&mut self, id: IndexId, value: &KeyValue<'_>) -> Result<Option<u32>> {
        let (blocks, slot) = self.open_file_mut()?.slot_mut(id)?;
        slot.build_key(id, value)?;
        slot.tree.find_next(blocks, &slot.key_buf)
    }

    /// [`add_entry`](Self::add_entry) with a key built from `value`.
    pub fn add_entry_value(&mut self, id: IndexId, value: &KeyValue<'_>, record: u32) -> Result<()> {
        if record == 0 {
            return Err(Error::InvalidRecordNumber);
        }
        let (blocks, slot) = self.writable_file_mut()?.slot_mut(id)?;
        slot.build_key(id, value)?;
        slot.tree.add_entry(blocks, &slot.key_buf, record)
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Write a human-readable listing of every node of every index.
    pub fn dump(&mut self, out: &mut dyn Write) -> Result<()> {
        let Some(file) = self.inner.as_mut() else {
            writeln!(out, "index file is not open")?;
            return Ok(());
        };

        let path = file
            .path
            .as_ref()
            .map_or_else(|| "<memory>".to_string(), |p| p.display().to_string());
        writeln!(out, "index file {} ({})", path, file.mode)?;
        writeln!(out, "  {} index slots", file.indexes.len())?;

        for (i, slot) in file.indexes.iter_mut().enumerate() {
            if let Some(slot) = slot {
                writeln!(out, "----- index {} -----", i + 1)?;
                slot.tree.dump(&mut file.blocks, out)?;
            }
        }
        Ok(())
    }
}

impl Drop for IndexFile {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("failed to close index file: {e}");
        }
    }
}

impl std::fmt::Debug for IndexFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexFile")
            .field("config", &self.config)
            .field("mode", &self.mode())
            .field("path", &self.path())
            .field("num_indexes", &self.num_indexes())
            .finish()
    }
}

fn check_capacity(page_size: usize, key_length: usize) -> Result<()> {
    let capacity = node_capacity(page_size, key_length);
    if capacity < MIN_ENTRIES_PER_NODE {
        return Err(Error::PageTooSmall {
            page_size,
            key_length,
            capacity,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorKind;
    use crate::storage::MemStorage;
    use tempfile::tempdir;

    fn mem_file(config: IndexConfig) -> (IndexFile, MemStorage) {
        let storage = MemStorage::new();
        let mut file = IndexFile::new(config);
        file.open_storage(Box::new(storage.clone()), AccessMode::Write)
            .unwrap();
        (file, storage)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    #[test]
    fn test_operations_before_open() {
        let mut file = IndexFile::new(IndexConfig::default());
        let id = IndexId::new(1);

        assert!(!file.is_open());
        assert_eq!(file.num_indexes(), 0);
        assert_eq!(
            file.create_index(FieldType::Integer, 4).unwrap_err().kind(),
            ErrorKind::NotInitialized
        );
        assert!(matches!(file.find_first(id, &[0; 4]), Err(Error::NotOpen)));
        assert!(matches!(file.flush(), Err(Error::NotOpen)));
        assert!(file.close().is_ok());
    }

    #[test]
    fn test_write_mode_writes_empty_header() {
        let (file, storage) = mem_file(IndexConfig::default());
        let bytes = storage.to_vec();

        assert_eq!(bytes.len(), 512);
        assert_eq!(bytes[0..4], 24_242_424u32.to_be_bytes());
        assert_eq!(bytes[12..14], [0, 0]);
        drop(file);
    }

    #[test]
    fn test_open_twice_fails() {
        let (mut file, _storage) = mem_file(IndexConfig::default());
        let result = file.open_storage(Box::new(MemStorage::new()), AccessMode::Write);
        assert!(matches!(result, Err(Error::AlreadyOpen)));
    }

    #[test]
    fn test_close_then_reopen() {
        let (mut file, storage) = mem_file(IndexConfig::default());
        let id = file.create_index(FieldType::Integer, 4).unwrap();
        for v in 1..=100 {
            file.add_entry_value(id, &KeyValue::Integer(v), v as u32)
                .unwrap();
        }
        file.close().unwrap();
        assert!(!file.is_open());

        file.open_storage(Box::new(storage), AccessMode::Read).unwrap();
        assert_eq!(file.num_indexes(), 1);
        file.set_index_field_type(id, FieldType::Integer).unwrap();
        for v in 1..=100 {
            assert_eq!(
                file.find_first_value(id, &KeyValue::Integer(v)).unwrap(),
                Some(v as u32)
            );
        }
    }

    #[test]
    fn test_drop_commits() {
        let storage = MemStorage::new();
        {
            let mut file = IndexFile::new(IndexConfig::default());
            file.open_storage(Box::new(storage.clone()), AccessMode::Write)
                .unwrap();
            let id = file.create_index(FieldType::SmallInt, 2).unwrap();
            file.add_entry_value(id, &KeyValue::Integer(-7), 3).unwrap();
        }

        let mut file = IndexFile::new(IndexConfig::default());
        file.open_storage(Box::new(storage), AccessMode::Read).unwrap();
        assert_eq!(file.find_first(IndexId::new(1), &[0x7F, 0xF9]).unwrap(), Some(3));
    }

    #[test]
    fn test_page_size_from_header() {
        let (mut file, storage) = mem_file(IndexConfig::default().with_page_size(1024));
        file.create_index(FieldType::Float, 8).unwrap();
        file.close().unwrap();

        // The requested default is overridden by the persisted size.
        let mut file = IndexFile::new(IndexConfig::default());
        file.open_storage(Box::new(storage), AccessMode::ReadWrite)
            .unwrap();
        let info = file.index_info(IndexId::new(1)).unwrap();
        assert_eq!(info.node_capacity, (1024 - 12) / 12);
    }

    // ========================================================================
    // Index management
    // ========================================================================

    #[test]
    fn test_create_index_key_lengths() {
        let (mut file, _storage) = mem_file(IndexConfig::default());

        let a = file.create_index(FieldType::Char, 300).unwrap();
        let b = file.create_index(FieldType::Time, 0).unwrap();
        assert_eq!(a, IndexId::new(1));
        assert_eq!(b, IndexId::new(2));
        assert_eq!(file.index_info(a).unwrap().key_length, 128);
        assert_eq!(file.index_info(b).unwrap().key_length, 4);
        assert_eq!(file.index_info(b).unwrap().field_type, Some(FieldType::Time));
    }

    #[test]
    fn test_create_index_rejections() {
        let (mut file, _storage) = mem_file(IndexConfig::default());

        assert!(matches!(
            file.create_index(FieldType::DateTime, 8),
            Err(Error::UnsupportedFieldType(FieldType::DateTime))
        ));
        assert!(matches!(
            file.create_index(FieldType::Char, 0),
            Err(Error::InvalidFieldWidth(0))
        ));
        assert_eq!(file.num_indexes(), 0);
    }

    #[test]
    fn test_page_too_small_for_key() {
        let (mut file, _storage) = mem_file(IndexConfig::default().with_page_size(64));
        assert!(file.create_index(FieldType::Integer, 4).is_ok());
        assert!(matches!(
            file.create_index(FieldType::Char, 40),
            Err(Error::PageTooSmall { capacity: 1, .. })
        ));
    }

    #[test]
    fn test_invalid_index_id() {
        let (mut file, _storage) = mem_file(IndexConfig::default());
        file.create_index(FieldType::Integer, 4).unwrap();

        for id in [0, 2] {
            let err = file.find_first(IndexId::new(id), &[0; 4]).unwrap_err();
            assert!(matches!(err, Error::InvalidIndexId { count: 1, .. }));
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    // ========================================================================
    // Keys and entries
    // ========================================================================

    #[test]
    fn test_build_key() {
        let (mut file, _storage) = mem_file(IndexConfig::default());
        let id = file.create_index(FieldType::Char, 4).unwrap();

        assert_eq!(file.build_key(id, &KeyValue::Text("ab")).unwrap(), b"AB\0\0");
        assert!(matches!(
            file.build_key(id, &KeyValue::Integer(1)),
            Err(Error::ValueTypeMismatch(_))
        ));
    }

    #[test]
    fn test_build_key_needs_field_type() {
        let (mut file, storage) = mem_file(IndexConfig::default());
        file.create_index(FieldType::Integer, 4).unwrap();
        file.close().unwrap();

        file.open_storage(Box::new(storage), AccessMode::Read).unwrap();
        let id = IndexId::new(1);
        assert!(matches!(
            file.build_key(id, &KeyValue::Integer(1)),
            Err(Error::FieldTypeNotSet(1))
        ));
        assert!(matches!(
            file.set_index_field_type(id, FieldType::SmallInt),
            Err(Error::KeyLengthMismatch { .. })
        ));
    }

    #[test]
    fn test_add_entry_checks() {
        let (mut file, _storage) = mem_file(IndexConfig::default());
        let id = file.create_index(FieldType::Integer, 4).unwrap();

        assert!(matches!(
            file.add_entry(id, &[0x80, 0, 0, 1], 0),
            Err(Error::InvalidRecordNumber)
        ));
        assert!(matches!(
            file.add_entry(id, &[0x80, 0, 1], 1),
            Err(Error::KeySizeMismatch { found: 3, expected: 4 })
        ));
        assert!(matches!(
            file.find_first(id, &[0; 8]),
            Err(Error::KeySizeMismatch { found: 8, expected: 4 })
        ));
    }

    #[test]
    fn test_read_mode_rejects_writes() {
        let (mut file, storage) = mem_file(IndexConfig::default());
        let id = file.create_index(FieldType::Integer, 4).unwrap();
        file.close().unwrap();

        file.open_storage(Box::new(storage), AccessMode::Read).unwrap();
        assert!(matches!(
            file.add_entry(id, &[0x80, 0, 0, 1], 1),
            Err(Error::NotWritable(AccessMode::Read))
        ));
        assert!(matches!(
            file.create_index(FieldType::Integer, 4),
            Err(Error::NotWritable(AccessMode::Read))
        ));
        assert!(file.flush().is_ok());
    }

    #[test]
    fn test_duplicate_enumeration() {
        let (mut file, _storage) = mem_file(IndexConfig::default());
        let id = file.create_index(FieldType::Char, 8).unwrap();
        file.add_entry_value(id, &KeyValue::Text("A"), 10).unwrap();
        file.add_entry_value(id, &KeyValue::Text("a"), 11).unwrap();
        file.add_entry_value(id, &KeyValue::Text("B"), 12).unwrap();

        let first = file.find_first_value(id, &KeyValue::Text("A")).unwrap();
        let second = file.find_next_value(id, &KeyValue::Text("A")).unwrap();
        let third = file.find_next_value(id, &KeyValue::Text("A")).unwrap();

        let mut found = vec![first.unwrap(), second.unwrap()];
        found.sort_unstable();
        assert_eq!(found, vec![10, 11]);
        assert_eq!(third, None);
    }

    // ========================================================================
    // Paths and diagnostics
    // ========================================================================

    #[test]
    fn test_resolve_index_path() {
        let dir = tempdir().unwrap();

        assert_eq!(
            resolve_index_path(&dir.path().join("roads.tab")),
            dir.path().join("roads.ind")
        );
        assert_eq!(
            resolve_index_path(&dir.path().join("roads.IND")),
            dir.path().join("roads.IND")
        );

        std::fs::write(dir.path().join("parcels.IND"), b"").unwrap();
        assert_eq!(
            resolve_index_path(&dir.path().join("parcels.dat")),
            dir.path().join("parcels.IND")
        );
    }

    #[test]
    fn test_dump() {
        let (mut file, _storage) = mem_file(IndexConfig::default());
        let id = file.create_index(FieldType::Integer, 4).unwrap();
        file.add_entry_value(id, &KeyValue::Integer(1), 9).unwrap();

        let mut out = Vec::new();
        file.dump(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("index file <memory> (write)"));
        assert!(text.contains("----- index 1 -----"));
        assert!(text.contains("80000001 -> 9"));

        file.close().unwrap();
        let mut out = Vec::new();
        file.dump(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "index file is not open\n");
    }
}
