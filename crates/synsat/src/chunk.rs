//! Partitioning of the profile axis into solver-sized batches.

use std::ops::Range;

use crate::error::{Result, SynsatError};

/// Contiguous, ordered chunks covering `0..total`.
///
/// Every chunk except possibly the last holds exactly `capacity` profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkIndex {
    total: usize,
    capacity: usize,
    ranges: Vec<Range<usize>>,
}

impl ChunkIndex {
    pub fn new(total: usize, capacity: usize) -> Result<Self> {
        if total == 0 {
            return Err(SynsatError::EmptySelection("no profiles to partition".to_string()));
        }
        if capacity == 0 {
            return Err(SynsatError::config("chunk capacity must be positive"));
        }

        let ranges = (0..total)
            .step_by(capacity)
            .map(|start| start..(start + capacity).min(total))
            .collect();

        Ok(Self {
            total,
            capacity,
            ranges,
        })
    }

    /// One chunk over all profiles.
    pub fn single(total: usize) -> Result<Self> {
        Self::new(total, total.max(1))
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<Range<usize>> {
        self.ranges.get(i).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.ranges.iter().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_with_remainder() {
        let index = ChunkIndex::new(10_000, 4_000).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.get(0), Some(0..4_000));
        assert_eq!(index.get(1), Some(4_000..8_000));
        assert_eq!(index.get(2), Some(8_000..10_000));
    }

    #[test]
    fn test_exact_multiple() {
        let index = ChunkIndex::new(8, 4).unwrap();
        assert_eq!(index.iter().collect::<Vec<_>>(), vec![0..4, 4..8]);
    }

    #[test]
    fn test_twenty_five_by_ten() {
        let sizes: Vec<usize> = ChunkIndex::new(25, 10).unwrap().iter().map(|r| r.len()).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
    }

    #[test]
    fn test_single_chunk() {
        let index = ChunkIndex::single(123).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(0), Some(0..123));
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(matches!(ChunkIndex::new(0, 10), Err(SynsatError::EmptySelection(_))));
        assert!(matches!(ChunkIndex::new(10, 0), Err(SynsatError::Config(_))));
        assert!(ChunkIndex::single(0).is_err());
    }
}
