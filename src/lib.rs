//! tabindex - on-disk B-tree field indexes for tabular geospatial tables.
//!
//! An index file (`.ind`) lets a table engine answer "which records have
//! field value V" without scanning the table. Each file holds up to 29
//! independent B-tree indexes, one per indexed field, keyed on
//! fixed-length byte keys that sort like the field values.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            tabindex                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Index File (index/ind_file)                 │   │
//! │  │     header + up to 29 indexes + key buffers              │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌───────────────────────────┐  ┌─────────────────────────┐    │
//! │  │  B-tree (index/btree)     │  │  KeyCodec (index/key)   │    │
//! │  │  IndexTree + IndexNode    │  │  integer | text | float │    │
//! │  │  one cached node / level  │  │                         │    │
//! │  └───────────────────────────┘  └─────────────────────────┘    │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Storage Layer (storage/)                       │   │
//! │  │   BlockFile + Block + BlockStorage (file | memory)       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (BlockPtr, IndexId, Error, config)
//! - [`storage`] - Block I/O and allocation
//! - [`index`] - Key encoding, header, B-tree and the index file
//!
//! # Quick Start
//! ```no_run
//! use tabindex::{AccessMode, FieldType, IndexConfig, IndexFile, KeyValue};
//!
//! let mut file = IndexFile::new(IndexConfig::default());
//! file.open("parcels.ind", AccessMode::Write).unwrap();
//!
//! let id = file.create_index(FieldType::Integer, 4).unwrap();
//! file.add_entry_value(id, &KeyValue::Integer(42), 1).unwrap();
//!
//! let key = file.build_key(id, &KeyValue::Integer(42)).unwrap().to_vec();
//! assert_eq!(file.find_first(id, &key).unwrap(), Some(1));
//! file.close().unwrap();
//! ```

pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::{AccessMode, BlockPtr, Error, ErrorKind, IndexConfig, IndexId, Result};
pub use index::{FieldType, IndexFile, IndexInfo, IndexSummary, KeyCodec, KeyValue};
pub use storage::{BlockStorage, FileStorage, IoStats, MemStorage};
