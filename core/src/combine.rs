//! Result placement and combining.
//!
//! Every backend writes into one output buffer allocated by the coordinator. A workload's
//! [`OutputLayout`] says where each chunk's results go:
//!
//! - [`OutputLayout::PerChunk`]: one slot per worker, indexed by owner (partial sums).
//! - [`OutputLayout::PerUnit`]: `width` slots per work unit, at the chunk's own offset (rows of a
//!   grid or of a product matrix, one id per hello item).
//!
//! Because chunks are disjoint, regions are disjoint, so the output can be split into
//! independent `&mut` slices up front and handed to workers without locks.

use crate::partition::{ChunkDescriptor, Partition};
use crate::{Error, Result};
use parwork_kernels::KernelElem;
use std::ops::Range;

/// Where a chunk's results land in the combined output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    PerChunk,
    PerUnit { width: usize },
}

impl OutputLayout {
    /// Length of the output buffer for a whole partition.
    pub fn buffer_len(&self, partition: &Partition) -> usize {
        match *self {
            OutputLayout::PerChunk => partition.workers(),
            OutputLayout::PerUnit { width } => partition.problem_size() * width,
        }
    }

    /// Output slots owned by `chunk`.
    pub fn region(&self, chunk: &ChunkDescriptor) -> Range<usize> {
        match *self {
            OutputLayout::PerChunk => chunk.owner..chunk.owner + 1,
            OutputLayout::PerUnit { width } => chunk.offset * width..chunk.end() * width,
        }
    }

    pub fn region_len(&self, chunk: &ChunkDescriptor) -> usize {
        self.region(chunk).len()
    }
}

/// A worker's contribution: the chunk it computed and the values for its region.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialResult<E> {
    pub chunk: ChunkDescriptor,
    pub data: Vec<E>,
}

impl<E> PartialResult<E> {
    pub fn new(chunk: ChunkDescriptor, data: Vec<E>) -> Self {
        Self { chunk, data }
    }
}

/// Splits `out` into one mutable region per chunk, in chunk order.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] if the chunks are not in ascending region order or a region
/// falls outside `out`.
pub fn split_regions<'a, E>(
    out: &'a mut [E],
    layout: OutputLayout,
    chunks: &[ChunkDescriptor],
) -> Result<Vec<&'a mut [E]>> {
    let total = out.len();
    let mut rest = out;
    let mut consumed = 0;
    let mut regions = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        let region = layout.region(chunk);
        if region.start < consumed || region.end > total {
            return Err(Error::ShapeMismatch {
                expected: vec![consumed, total],
                got: vec![region.start, region.end],
            });
        }

        let taken = std::mem::take(&mut rest);
        let (_, tail) = taken.split_at_mut(region.start - consumed);
        let (head, tail) = tail.split_at_mut(region.len());
        regions.push(head);
        rest = tail;
        consumed = region.end;
    }

    Ok(regions)
}

/// Copies a partial result into its region of `out`.
pub fn place<E: Copy>(
    out: &mut [E],
    layout: OutputLayout,
    partial: &PartialResult<E>,
) -> Result<()> {
    let region = layout.region(&partial.chunk);
    if region.end > out.len() || region.len() != partial.data.len() {
        return Err(Error::ShapeMismatch {
            expected: vec![region.len()],
            got: vec![partial.data.len()],
        });
    }
    out[region].copy_from_slice(&partial.data);
    Ok(())
}

/// Sums per-worker (or per-group) partials into the final total.
pub fn sum_partials<E: KernelElem>(partials: &[E]) -> E {
    partials.iter().fold(E::zero(), |mut acc, &p| {
        acc += p;
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_len() {
        let p = Partition::new(10, 3).unwrap();
        assert_eq!(OutputLayout::PerChunk.buffer_len(&p), 3);
        assert_eq!(OutputLayout::PerUnit { width: 4 }.buffer_len(&p), 40);
    }

    #[test]
    fn test_split_regions_per_unit() {
        let p = Partition::new(5, 2).unwrap();
        let layout = OutputLayout::PerUnit { width: 2 };
        let mut out = vec![0u32; layout.buffer_len(&p)];

        let regions = split_regions(&mut out, layout, p.chunks()).unwrap();
        let lens: Vec<usize> = regions.iter().map(|r| r.len()).collect();
        assert_eq!(lens, vec![6, 4]);

        for (i, region) in regions.into_iter().enumerate() {
            region.fill(i as u32 + 1);
        }
        assert_eq!(out, vec![1, 1, 1, 1, 1, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn test_split_regions_per_chunk_with_empty_chunks() {
        let p = Partition::new(1, 3).unwrap();
        let mut out = vec![0i64; 3];

        let regions = split_regions(&mut out, OutputLayout::PerChunk, p.chunks()).unwrap();
        assert!(regions.iter().all(|r| r.len() == 1));
    }

    #[test]
    fn test_split_regions_rejects_out_of_order() {
        let chunks = vec![ChunkDescriptor::new(1, 2, 2), ChunkDescriptor::new(0, 0, 2)];
        let mut out = vec![0u8; 4];
        let err = split_regions(&mut out, OutputLayout::PerUnit { width: 1 }, &chunks);
        assert!(matches!(err, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_place_checks_length() {
        let layout = OutputLayout::PerUnit { width: 1 };
        let mut out = vec![0u32; 4];

        let good = PartialResult::new(ChunkDescriptor::new(1, 2, 2), vec![7, 8]);
        place(&mut out, layout, &good).unwrap();
        assert_eq!(out, vec![0, 0, 7, 8]);

        let bad = PartialResult::new(ChunkDescriptor::new(0, 0, 2), vec![1]);
        assert!(place(&mut out, layout, &bad).is_err());
    }

    #[test]
    fn test_sum_partials() {
        assert_eq!(sum_partials(&[1i64, 2, 3]), 6);
        assert_eq!(sum_partials::<i64>(&[]), 0);
    }
}
