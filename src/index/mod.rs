//! Index layer - field indexes stored in a `.ind` file.
//!
//! - [`IndexFile`] - Container for up to 29 indexes, owns the header
//! - [`btree`] - Node pages and the B-tree algorithms
//! - [`KeyCodec`] - Order-preserving key encoding per field type

pub mod btree;
mod header;
mod ind_file;
mod key;

pub use btree::{IndexInfo, IndexSummary};
pub use header::{FileHeader, IndexDescriptor, IND_MAGIC};
pub use ind_file::{resolve_index_path, IndexFile};
pub use key::{FieldType, KeyCodec, KeyValue};
