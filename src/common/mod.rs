//! Common types and utilities shared across the crate.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`AccessMode`]
//! - Error types
//! - Identifiers ([`BlockPtr`], [`IndexId`])

mod block_ptr;
pub mod config;
pub mod error;
mod index_id;

pub use block_ptr::BlockPtr;
pub use config::{AccessMode, IndexConfig};
pub use error::{Error, ErrorKind, Result};
pub use index_id::IndexId;
