//! Tests for the index file API on real files.

use std::fs;
use std::io;

use tabindex::index::IND_MAGIC;
use tabindex::{
    AccessMode, BlockStorage, Error, ErrorKind, FieldType, IndexConfig, IndexFile, IndexId,
    KeyValue, MemStorage, Result,
};
use tempfile::tempdir;

/// In-memory storage whose writes start failing after a fixed number.
struct FailingStorage {
    inner: MemStorage,
    writes_left: usize,
}

impl FailingStorage {
    fn new(writes_allowed: usize) -> Self {
        Self {
            inner: MemStorage::new(),
            writes_left: writes_allowed,
        }
    }
}

impl BlockStorage for FailingStorage {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.inner.read_at(offset, buf)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        if self.writes_left == 0 {
            return Err(io::Error::other("device full").into());
        }
        self.writes_left -= 1;
        self.inner.write_at(offset, data)
    }

    fn len(&mut self) -> Result<u64> {
        self.inner.len()
    }

    fn sync(&mut self) -> Result<()> {
        self.inner.sync()
    }
}

/// Insert 1..200 until the first failure; returns the failing key and error.
fn insert_until_failure(file: &mut IndexFile, id: IndexId) -> Option<(i32, Error)> {
    (1..200).find_map(|v| {
        file.add_entry_value(id, &KeyValue::Integer(v), v as u32)
            .err()
            .map(|e| (v, e))
    })
}

/// Insertion order for 1..=30 that is neither ascending nor descending.
fn scrambled_1_to_30() -> Vec<i32> {
    // 31 is prime and 13 is coprime to it, so this is a permutation.
    (1..=30).map(|i| (i * 13) % 31).collect()
}

// ============================================================================
// Scenarios
// ============================================================================

/// Integer index with small nodes: 30 keys force several splits.
#[test]
fn test_integer_index_with_splits() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scenario.ind");

    let mut file = IndexFile::new(IndexConfig::default().with_page_size(64));
    file.open(&path, AccessMode::Write).unwrap();
    let id = file.create_index(FieldType::Integer, 4).unwrap();

    let order = scrambled_1_to_30();
    let mut sorted = order.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, (1..=30).collect::<Vec<_>>());

    for &v in &order {
        file.add_entry_value(id, &KeyValue::Integer(v), (v * 100) as u32)
            .unwrap();
    }

    let info = file.index_info(id).unwrap();
    assert_eq!(info.node_capacity, 6);
    assert!(info.splits >= 3, "only {} splits", info.splits);
    assert!(info.subtree_depth >= 2);

    assert_eq!(
        file.find_first_value(id, &KeyValue::Integer(15)).unwrap(),
        Some(1500)
    );
    assert_eq!(file.find_first_value(id, &KeyValue::Integer(31)).unwrap(), None);

    let summary = file.validate_index(id).unwrap();
    assert_eq!(summary.entries, 30);
    file.close().unwrap();

    // Same answers after reopening.
    let mut file = IndexFile::new(IndexConfig::default());
    file.open(&path, AccessMode::Read).unwrap();
    file.set_index_field_type(id, FieldType::Integer).unwrap();
    for v in 1..=30 {
        assert_eq!(
            file.find_first_value(id, &KeyValue::Integer(v)).unwrap(),
            Some((v * 100) as u32)
        );
    }
    assert_eq!(file.find_first_value(id, &KeyValue::Integer(31)).unwrap(), None);
}

/// Non-unique string index: duplicates are enumerated exactly once.
#[test]
fn test_string_index_duplicates() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("names.ind");

    let mut file = IndexFile::new(IndexConfig::default());
    file.open(&path, AccessMode::Write).unwrap();
    let id = file.create_index(FieldType::Char, 10).unwrap();

    file.add_entry_value(id, &KeyValue::Text("A"), 10).unwrap();
    file.add_entry_value(id, &KeyValue::Text("A"), 11).unwrap();
    file.add_entry_value(id, &KeyValue::Text("B"), 12).unwrap();

    let key = file.build_key(id, &KeyValue::Text("A")).unwrap().to_vec();
    let first = file.find_first(id, &key).unwrap().unwrap();
    assert!(first == 10 || first == 11);

    let second = file.find_next(id, &key).unwrap().unwrap();
    assert_eq!(first + second, 21);

    assert_eq!(file.find_next(id, &key).unwrap(), None);

    let key = file.build_key(id, &KeyValue::Text("b")).unwrap().to_vec();
    assert_eq!(file.find_first(id, &key).unwrap(), Some(12));
    assert_eq!(file.find_next(id, &key).unwrap(), None);
}

// ============================================================================
// Access modes
// ============================================================================

#[test]
fn test_read_write_mode_extends_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("grow.ind");

    {
        let mut file = IndexFile::new(IndexConfig::default().with_page_size(64));
        file.open(&path, AccessMode::Write).unwrap();
        let id = file.create_index(FieldType::Integer, 4).unwrap();
        for v in 1..=20 {
            file.add_entry_value(id, &KeyValue::Integer(v), v as u32)
                .unwrap();
        }
        file.close().unwrap();
    }
    let size_before = fs::metadata(&path).unwrap().len();

    {
        let mut file = IndexFile::new(IndexConfig::default());
        file.open(&path, AccessMode::ReadWrite).unwrap();
        let first = IndexId::new(1);
        file.set_index_field_type(first, FieldType::Integer).unwrap();
        for v in 21..=40 {
            file.add_entry_value(first, &KeyValue::Integer(v), v as u32)
                .unwrap();
        }

        let second = file.create_index(FieldType::Char, 8).unwrap();
        assert_eq!(second, IndexId::new(2));
        file.add_entry_value(second, &KeyValue::Text("x"), 99).unwrap();
        file.close().unwrap();
    }
    assert!(fs::metadata(&path).unwrap().len() > size_before);

    let mut file = IndexFile::new(IndexConfig::default());
    file.open(&path, AccessMode::Read).unwrap();
    assert_eq!(file.num_indexes(), 2);
    file.set_index_field_type(IndexId::new(1), FieldType::Integer)
        .unwrap();
    file.set_index_field_type(IndexId::new(2), FieldType::Char)
        .unwrap();

    for v in 1..=40 {
        assert_eq!(
            file.find_first_value(IndexId::new(1), &KeyValue::Integer(v))
                .unwrap(),
            Some(v as u32)
        );
    }
    assert_eq!(
        file.find_first_value(IndexId::new(2), &KeyValue::Text("X"))
            .unwrap(),
        Some(99)
    );
    assert!(file.validate_index(IndexId::new(1)).is_ok());
}

#[test]
fn test_read_mode_is_search_only() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ro.ind");

    let mut file = IndexFile::new(IndexConfig::default());
    file.open(&path, AccessMode::Write).unwrap();
    let id = file.create_index(FieldType::Integer, 4).unwrap();
    file.add_entry_value(id, &KeyValue::Integer(1), 1).unwrap();
    file.close().unwrap();

    file.open(&path, AccessMode::Read).unwrap();
    let err = file.add_entry(id, &[0x80, 0, 0, 2], 2).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(file.create_index(FieldType::Integer, 4).is_err());
    assert_eq!(file.find_first(id, &[0x80, 0, 0, 1]).unwrap(), Some(1));
}

#[test]
fn test_open_missing_file() {
    let dir = tempdir().unwrap();
    let mut file = IndexFile::new(IndexConfig::default());

    let err = file
        .open(dir.path().join("missing.ind"), AccessMode::Read)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(!file.is_open());
}

#[test]
fn test_open_resolves_extension() {
    let dir = tempdir().unwrap();

    let mut file = IndexFile::new(IndexConfig::default());
    file.open(dir.path().join("roads.tab"), AccessMode::Write)
        .unwrap();
    assert_eq!(file.path(), Some(dir.path().join("roads.ind").as_path()));
    file.create_index(FieldType::Integer, 4).unwrap();
    file.close().unwrap();

    assert!(dir.path().join("roads.ind").exists());
    file.open(dir.path().join("roads.dat"), AccessMode::Read)
        .unwrap();
    assert_eq!(file.num_indexes(), 1);
}

// ============================================================================
// Header limits and corruption
// ============================================================================

#[test]
fn test_index_limit_and_slot_reuse() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("many.ind");

    let mut file = IndexFile::new(IndexConfig::default());
    file.open(&path, AccessMode::Write).unwrap();
    for i in 1..=29 {
        assert_eq!(
            file.create_index(FieldType::SmallInt, 2).unwrap(),
            IndexId::new(i)
        );
    }
    let err = file.create_index(FieldType::SmallInt, 2).unwrap_err();
    assert!(matches!(err, Error::TooManyIndexes));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    file.close().unwrap();

    // Clear the root pointer of index 5 to free its slot.
    let mut bytes = fs::read(&path).unwrap();
    let descriptor = 48 + 4 * 16;
    bytes[descriptor..descriptor + 4].fill(0);
    fs::write(&path, &bytes).unwrap();

    file.open(&path, AccessMode::ReadWrite).unwrap();
    assert_eq!(file.num_indexes(), 29);
    assert!(matches!(
        file.index_info(IndexId::new(5)),
        Err(Error::InvalidIndexId { id: 5, count: 29 })
    ));
    assert_eq!(
        file.create_index(FieldType::Integer, 4).unwrap(),
        IndexId::new(5)
    );
    assert_eq!(file.index_info(IndexId::new(5)).unwrap().key_length, 4);
}

#[test]
fn test_corrupt_header_is_fatal() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.ind");

    let mut file = IndexFile::new(IndexConfig::default());
    file.open(&path, AccessMode::Write).unwrap();
    file.create_index(FieldType::Integer, 4).unwrap();
    file.close().unwrap();
    let good = fs::read(&path).unwrap();
    assert_eq!(good[0..4], IND_MAGIC.to_be_bytes());

    let mut bytes = good.clone();
    bytes[0] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();
    let err = file.open(&path, AccessMode::Read).unwrap_err();
    assert!(matches!(err, Error::InvalidMagic { .. }));
    assert_eq!(err.kind(), ErrorKind::Corrupt);
    assert!(!file.is_open());

    let mut bytes = good.clone();
    bytes[12..14].copy_from_slice(&30u16.to_be_bytes());
    fs::write(&path, &bytes).unwrap();
    assert!(matches!(
        file.open(&path, AccessMode::ReadWrite),
        Err(Error::InvalidIndexCount(30))
    ));

    let mut bytes = good;
    bytes[12..14].copy_from_slice(&0u16.to_be_bytes());
    fs::write(&path, &bytes).unwrap();
    assert!(matches!(
        file.open(&path, AccessMode::Read),
        Err(Error::InvalidIndexCount(0))
    ));
}

#[test]
fn test_corrupt_node_count() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("node.ind");

    let mut file = IndexFile::new(IndexConfig::default());
    file.open(&path, AccessMode::Write).unwrap();
    file.create_index(FieldType::Integer, 4).unwrap();
    file.close().unwrap();

    // Root node of index 1 sits right after the header.
    let mut bytes = fs::read(&path).unwrap();
    bytes[512..516].copy_from_slice(&1000u32.to_be_bytes());
    fs::write(&path, &bytes).unwrap();

    let err = file.open(&path, AccessMode::Read).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Corrupt);
}

// ============================================================================
// Storage failures
// ============================================================================

#[test]
fn test_write_failure_reaches_caller() {
    let mut file = IndexFile::new(IndexConfig::default().with_page_size(64));
    file.open_storage(Box::new(FailingStorage::new(4)), AccessMode::Write)
        .unwrap();
    let id = file.create_index(FieldType::Integer, 4).unwrap();

    let (key, err) = insert_until_failure(&mut file, id).expect("storage never failed");
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(key > 6, "failed at key {} before any split", key);

    let err = file.close().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(!file.is_open());
}

#[test]
fn test_close_failure_reaches_caller() {
    // The header written at open uses the only allowed write.
    let mut file = IndexFile::new(IndexConfig::default());
    file.open_storage(Box::new(FailingStorage::new(1)), AccessMode::Write)
        .unwrap();
    let id = file.create_index(FieldType::Integer, 4).unwrap();
    file.add_entry_value(id, &KeyValue::Integer(1), 1).unwrap();

    assert_eq!(file.flush().unwrap_err().kind(), ErrorKind::Io);
    assert_eq!(file.close().unwrap_err().kind(), ErrorKind::Io);
    assert!(file.close().is_ok());
}

#[test]
fn test_drop_after_write_failure() {
    let mut file = IndexFile::new(IndexConfig::default().with_page_size(64));
    file.open_storage(Box::new(FailingStorage::new(3)), AccessMode::Write)
        .unwrap();
    let id = file.create_index(FieldType::Integer, 4).unwrap();
    assert!(insert_until_failure(&mut file, id).is_some());

    // Closing on drop fails again; the error is logged, not raised.
    assert!(file.is_open());
    drop(file);
}
