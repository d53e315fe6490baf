//! Storage layer - block I/O under the index engine.
//!
//! This module handles persistent storage:
//! - [`BlockStorage`] - Positioned byte storage ([`FileStorage`], [`MemStorage`])
//! - [`BlockFile`] - Block reads/writes plus the allocation cursor
//! - [`Block`] - In-memory block with big-endian accessors

mod block;
mod block_file;
mod block_storage;
mod stats;

pub use block::Block;
pub use block_file::BlockFile;
pub use block_storage::{BlockStorage, FileStorage, MemStorage};
pub use stats::IoStats;
