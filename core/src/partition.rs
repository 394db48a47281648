//! # Partitioning
//!
//! Splits `N` units of work into `W` contiguous chunks, one per worker.
//!
//! Sizes are as even as possible: every chunk gets `N / W` units and the first `N % W` chunks
//! get one extra. Chunks are laid end to end in owner order, so the offset of chunk `i` is the
//! sum of the lengths before it and the last chunk ends exactly at `N`. When `N < W` the trailing
//! chunks are empty and their owners simply contribute nothing.
//!
//! ```rust
//! use parwork::partition::partition;
//!
//! let chunks = partition(10, 3).unwrap();
//! let lens: Vec<usize> = chunks.iter().map(|c| c.len).collect();
//! assert_eq!(lens, vec![4, 3, 3]);
//! assert_eq!(chunks[2].offset, 7);
//! ```

use crate::{Error, Result};
use std::ops::Range;

/// A contiguous range of work units assigned to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkDescriptor {
    /// Rank of the worker that computes this chunk.
    pub owner: usize,
    /// Index of the first unit.
    pub offset: usize,
    /// Number of units. May be zero.
    pub len: usize,
}

impl ChunkDescriptor {
    pub fn new(owner: usize, offset: usize, len: usize) -> Self {
        Self { owner, offset, len }
    }

    /// One past the last unit.
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Computes the chunk list for `size` units over `workers` workers.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] when `workers == 0`.
pub fn partition(size: usize, workers: usize) -> Result<Vec<ChunkDescriptor>> {
    if workers == 0 {
        return Err(Error::InvalidConfiguration(
            "worker count must be at least 1".to_string(),
        ));
    }

    let base = size / workers;
    let remainder = size % workers;

    let mut offset = 0;
    let chunks = (0..workers)
        .map(|owner| {
            let len = base + usize::from(owner < remainder);
            let chunk = ChunkDescriptor::new(owner, offset, len);
            offset += len;
            chunk
        })
        .collect();

    Ok(chunks)
}

/// A validated partition: the chunk list together with the problem size it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    size: usize,
    chunks: Vec<ChunkDescriptor>,
}

impl Partition {
    pub fn new(size: usize, workers: usize) -> Result<Self> {
        Ok(Self {
            size,
            chunks: partition(size, workers)?,
        })
    }

    pub fn chunks(&self) -> &[ChunkDescriptor] {
        &self.chunks
    }

    pub fn workers(&self) -> usize {
        self.chunks.len()
    }

    pub fn problem_size(&self) -> usize {
        self.size
    }

    /// Number of chunks, one per worker, including empty ones.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// True only for a partition of nothing; empty chunks still count as chunks.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChunkDescriptor> {
        self.chunks.iter()
    }
}

impl<'a> IntoIterator for &'a Partition {
    type Item = &'a ChunkDescriptor;
    type IntoIter = std::slice::Iter<'a, ChunkDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_split() {
        let chunks = partition(12, 4).unwrap();
        assert!(chunks.iter().all(|c| c.len == 3));
        assert_eq!(chunks[3].end(), 12);
    }

    #[test]
    fn test_remainder_goes_to_first_chunks() {
        let chunks = partition(11, 4).unwrap();
        let lens: Vec<usize> = chunks.iter().map(|c| c.len).collect();
        assert_eq!(lens, vec![3, 3, 3, 2]);
        let offsets: Vec<usize> = chunks.iter().map(|c| c.offset).collect();
        assert_eq!(offsets, vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_fewer_units_than_workers() {
        let chunks = partition(2, 5).unwrap();
        let lens: Vec<usize> = chunks.iter().map(|c| c.len).collect();
        assert_eq!(lens, vec![1, 1, 0, 0, 0]);
        assert!(chunks[4].is_empty());
        assert_eq!(chunks[4].offset, 2);
    }

    #[test]
    fn test_empty_problem() {
        let chunks = partition(0, 3).unwrap();
        assert!(chunks.iter().all(|c| c.is_empty() && c.offset == 0));
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(
            partition(10, 0),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_partition_wrapper() {
        let p = Partition::new(7, 2).unwrap();
        assert_eq!(p.workers(), 2);
        assert_eq!(p.problem_size(), 7);
        let owners: Vec<usize> = p.iter().map(|c| c.owner).collect();
        assert_eq!(owners, vec![0, 1]);
        assert_eq!((&p).into_iter().map(|c| c.len).sum::<usize>(), 7);
    }
}
