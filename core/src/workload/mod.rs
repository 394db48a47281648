//! # Workloads
//!
//! A [`Workload`] describes one partition-compute-reduce problem independently of where it runs:
//! how many units to partition, where each chunk's results land, how to compute a chunk, what a
//! worker in another address space must be sent, and how the combined buffer becomes the final
//! answer. [`Offload`] adds the device program for accelerator backends.
//!
//! | Workload | Units | Layout | Output |
//! |---|---|---|---|
//! | [`Hello`] | items | one `u32` per item | identity vector |
//! | [`ArraySum`] | elements | one `i64` per worker | scalar sum |
//! | [`Derivative`] | grid rows | one row per row | grid of d/dx |
//! | [`Matmul`] | rows of `A` | one row of `C` per row | product matrix |

use crate::accel::{Accelerator, Kernel, KernelSource};
use crate::combine::OutputLayout;
use crate::partition::ChunkDescriptor;
use crate::{Error, Result};
use std::fmt::Debug;
use std::ops::Range;

pub mod derivative;
pub mod hello;
pub mod matmul;
pub mod sum;

pub use derivative::{Derivative, RowBlock};
pub use hello::Hello;
pub use matmul::{Matmul, MatmulInput, MatmulShard};
pub use sum::ArraySum;

/// A dense row-major `f64` matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if `data.len() != rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::ShapeMismatch {
                expected: vec![rows, cols],
                got: vec![data.len()],
            });
        }
        Ok(Self { rows, cols, data })
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        Self::from_fn(n, n, |i, j| if i == j { 1.0 } else { 0.0 })
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                data.push(f(i, j));
            }
        }
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        if i < self.rows && j < self.cols {
            Some(self.data[i * self.cols + j])
        } else {
            None
        }
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Contiguous storage of a range of rows.
    pub fn row_block(&self, rows: Range<usize>) -> &[f64] {
        &self.data[rows.start * self.cols..rows.end * self.cols]
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }
}

/// One partition-compute-reduce problem.
///
/// `execute` and `execute_shard` must produce identical values for the same chunk; the first
/// reads the coordinator's input in place, the second a worker's private copy.
pub trait Workload: Sync {
    type Input: Sync;
    /// Element type of the combined output buffer.
    type Elem: Copy + Default + Send + Sync + Debug + 'static;
    /// What a worker in a separate address space receives for its chunk.
    type Shard: Send;
    type Output;

    fn name(&self) -> &'static str;

    /// Validates `input` and returns the number of units to partition.
    fn units(&self, input: &Self::Input) -> Result<usize>;

    fn layout(&self, input: &Self::Input) -> OutputLayout;

    /// Called once in each worker's context before it computes its chunk.
    fn announce(&self, _chunk: &ChunkDescriptor, _workers: usize) {}

    /// Computes `chunk` from the shared input into its output region.
    fn execute(
        &self,
        input: &Self::Input,
        chunk: &ChunkDescriptor,
        out: &mut [Self::Elem],
    ) -> Result<()>;

    /// Copies the part of `input` that `chunk` needs.
    fn shard(&self, input: &Self::Input, chunk: &ChunkDescriptor) -> Self::Shard;

    /// Computes `chunk` from a shard into its output region.
    fn execute_shard(
        &self,
        shard: &Self::Shard,
        chunk: &ChunkDescriptor,
        out: &mut [Self::Elem],
    ) -> Result<()>;

    /// Turns the combined output buffer into the final answer.
    fn finish(&self, input: &Self::Input, out: Vec<Self::Elem>) -> Result<Self::Output>;
}

/// A workload that can also run as a single device dispatch.
pub trait Offload: Workload {
    fn kernel_source(&self) -> KernelSource;

    /// Uploads `input`, runs the built `kernel` once with work-groups of `group_size` lanes,
    /// and reads the result back.
    fn offload<A: Accelerator>(
        &self,
        kernel: &mut Kernel<A>,
        group_size: usize,
        input: &Self::Input,
    ) -> Result<Self::Output>;
}

/// Converts a size to the `u32` a device kernel takes.
pub(crate) fn device_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        Error::InvalidConfiguration(format!("{what} = {value} does not fit a device u32"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_new_checks_len() {
        assert!(Matrix::new(2, 2, vec![1.0; 4]).is_ok());
        assert!(matches!(
            Matrix::new(2, 3, vec![1.0; 4]),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_matrix_accessors() {
        let m = Matrix::from_fn(3, 2, |i, j| (i * 10 + j) as f64);
        assert_eq!(m.shape(), [3, 2]);
        assert_eq!(m.get(2, 1), Some(21.0));
        assert_eq!(m.get(3, 0), None);
        assert_eq!(m.row(1), &[10.0, 11.0]);
        assert_eq!(m.row_block(1..3), &[10.0, 11.0, 20.0, 21.0]);
    }

    #[test]
    fn test_identity() {
        let i = Matrix::identity(3);
        assert_eq!(i.data().iter().sum::<f64>(), 3.0);
        assert_eq!(i.get(1, 1), Some(1.0));
        assert_eq!(i.get(0, 1), Some(0.0));
    }
}
