//! Error types for the index engine.

use thiserror::Error;

use super::block_ptr::BlockPtr;
use super::config::{AccessMode, MAX_INDEXES, MAX_SUBTREE_DEPTH};
use crate::index::FieldType;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
///
/// Callers that only care about "what went wrong" rather than the exact
/// variant can match on this instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file or index cannot be set up as requested.
    Configuration,
    /// The underlying storage failed.
    Io,
    /// A call was made with arguments or in a mode that is not allowed.
    Validation,
    /// The file has not been opened.
    NotInitialized,
    /// Persisted data does not describe a valid index file.
    Corrupt,
}

/// All errors produced by the index engine.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the block storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Header does not start with the index file magic number.
    #[error("invalid magic cookie: got {found}, expected {expected}")]
    InvalidMagic { found: u32, expected: u32 },

    /// Header index count is outside `1..=29`.
    #[error("invalid number of indexes ({0}), expected 1..={}", MAX_INDEXES)]
    InvalidIndexCount(u16),

    /// A node or descriptor read from disk is inconsistent.
    #[error("corrupt index data at {ptr}: {reason}")]
    Corrupt { ptr: BlockPtr, reason: String },

    /// Field type has no key encoding.
    #[error("index on fields of type {0} is not supported")]
    UnsupportedFieldType(FieldType),

    /// Field width cannot produce a key.
    #[error("invalid field width {0} for a text index")]
    InvalidFieldWidth(usize),

    /// Key length stored for an index does not fit the requested field type.
    #[error("index key length ({key_length}) does not match field type ({field_type})")]
    KeyLengthMismatch {
        key_length: usize,
        field_type: FieldType,
    },

    /// The file already holds the maximum number of indexes.
    #[error("cannot add a new index: a file can contain at most {} indexes", MAX_INDEXES)]
    TooManyIndexes,

    /// Node page size outside the supported range.
    #[error("unsupported node page size {0}")]
    InvalidPageSize(usize),

    /// Node page too small to hold enough keys of this length.
    #[error("page size {page_size} holds only {capacity} entries of {key_length}-byte keys")]
    PageTooSmall {
        page_size: usize,
        key_length: usize,
        capacity: usize,
    },

    /// Tree grew deeper than the header can record.
    #[error("index is too deep (subtree depth {depth}, cannot exceed {})", MAX_SUBTREE_DEPTH)]
    DepthOverflow { depth: u32 },

    /// Allocation cursor ran past the 32-bit block pointer range.
    #[error("index file exceeds the addressable size")]
    FileTooLarge,

    /// Index number out of range or naming an absent index.
    #[error("no field index number {id}: valid range is [1..{count}]")]
    InvalidIndexId { id: usize, count: usize },

    /// Write operation on a file opened without write access.
    #[error("operation requires write access, file is open for {0}")]
    NotWritable(AccessMode),

    /// Key length differs from the index key length.
    #[error("key is {found} bytes, index expects {expected}")]
    KeySizeMismatch { found: usize, expected: usize },

    /// Value variant cannot be encoded by the index key codec.
    #[error("value cannot be encoded as a {0} key")]
    ValueTypeMismatch(&'static str),

    /// No field type has been set, so no key codec is selected.
    #[error("field type has not been set for index {0}")]
    FieldTypeNotSet(usize),

    /// Record numbers start at 1.
    #[error("record number must be positive")]
    InvalidRecordNumber,

    /// Insert attempted into a node with no free slot.
    #[error("node at {0} is full")]
    NodeFull(BlockPtr),

    /// Operation attempted before `open()`.
    #[error("index file has not been opened")]
    NotOpen,

    /// `open()` called on an already open file.
    #[error("index file is already open")]
    AlreadyOpen,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::InvalidMagic { .. } | Error::InvalidIndexCount(_) | Error::Corrupt { .. } => {
                ErrorKind::Corrupt
            }
            Error::UnsupportedFieldType(_)
            | Error::InvalidFieldWidth(_)
            | Error::KeyLengthMismatch { .. }
            | Error::TooManyIndexes
            | Error::InvalidPageSize(_)
            | Error::PageTooSmall { .. }
            | Error::DepthOverflow { .. }
            | Error::FileTooLarge => ErrorKind::Configuration,
            Error::InvalidIndexId { .. }
            | Error::NotWritable(_)
            | Error::KeySizeMismatch { .. }
            | Error::ValueTypeMismatch(_)
            | Error::FieldTypeNotSet(_)
            | Error::InvalidRecordNumber
            | Error::NodeFull(_)
            | Error::AlreadyOpen => ErrorKind::Validation,
            Error::NotOpen => ErrorKind::NotInitialized,
        }
    }

    pub(crate) fn corrupt(ptr: BlockPtr, reason: impl Into<String>) -> Self {
        Error::Corrupt {
            ptr,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidIndexId { id: 4, count: 2 };
        assert_eq!(
            format!("{}", err),
            "no field index number 4: valid range is [1..2]"
        );

        let err = Error::InvalidMagic {
            found: 7,
            expected: 24242424,
        };
        assert_eq!(
            format!("{}", err),
            "invalid magic cookie: got 7, expected 24242424"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {} // Success
            _ => panic!("Expected Io error"),
        }
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::TooManyIndexes.kind(), ErrorKind::Configuration);
        assert_eq!(Error::DepthOverflow { depth: 256 }.kind(), ErrorKind::Configuration);
        assert_eq!(
            Error::UnsupportedFieldType(FieldType::DateTime).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(Error::NotWritable(AccessMode::Read).kind(), ErrorKind::Validation);
        assert_eq!(Error::NotOpen.kind(), ErrorKind::NotInitialized);
        assert_eq!(Error::InvalidIndexCount(0).kind(), ErrorKind::Corrupt);
        assert_eq!(
            Error::corrupt(BlockPtr::new(512), "bad").kind(),
            ErrorKind::Corrupt
        );
    }

    #[test]
    fn test_result_type_alias() {
        fn might_fail() -> Result<u32> {
            Ok(42)
        }

        assert_eq!(might_fail().unwrap(), 42);
    }
}
