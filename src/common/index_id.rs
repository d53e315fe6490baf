//! Index identifier type.

use std::fmt;

/// Identifies an index within a file.
///
/// Index numbers are 1-based, matching the order of descriptors in the
/// file header. [`IndexId::slot`] gives the 0-based position.
///
/// # Example
/// ```
/// use tabindex::IndexId;
///
/// let id = IndexId::new(3);
/// assert_eq!(id.slot(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexId(pub usize);

impl IndexId {
    /// Create a new IndexId from a 1-based number.
    #[inline]
    pub fn new(id: usize) -> Self {
        IndexId(id)
    }

    /// Build the id for a 0-based header slot.
    #[inline]
    pub(crate) fn from_slot(slot: usize) -> Self {
        IndexId(slot + 1)
    }

    /// 0-based position in the header. Id 0 wraps to `usize::MAX`, which
    /// no slot lookup matches.
    #[inline]
    pub fn slot(&self) -> usize {
        self.0.wrapping_sub(1)
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Index({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_id_slot() {
        assert_eq!(IndexId::new(1).slot(), 0);
        assert_eq!(IndexId::from_slot(28), IndexId::new(29));
        assert_eq!(IndexId::new(0).slot(), usize::MAX);
    }

    #[test]
    fn test_index_id_display() {
        assert_eq!(format!("{}", IndexId::new(7)), "Index(7)");
    }
}
