//! # parwork-kernels
//!
//! Chunk-local executors shared by every `parwork` backend.
//!
//! A kernel here is a plain function over slices: it knows nothing about threads, channels or
//! devices. The shared-memory backend calls it on a borrowed slice of the coordinator's input,
//! the message-passing backend calls it on a worker's private copy, and the host accelerator
//! calls it from inside an emulated work-group.
//!
//! - [`cpu_sum`]: integer reduction into a wider accumulator.
//! - [`cpu_derivative_x`]: finite-difference derivative along the columns of a row block.
//! - [`cpu_matmul_rows`]: a block of output rows of `C = A * B`.
//! - [`tree`]: the log-time work-group reduction used before the host-side combine.

use num_traits::{FromPrimitive, Num, NumAssign, ToPrimitive};
use std::fmt::Debug;
use thiserror::Error;

pub mod cpu_derivative;
pub mod cpu_matmul;
pub mod cpu_sum;
pub mod tree;

pub use cpu_derivative::cpu_derivative_x;
pub use cpu_matmul::{cpu_matmul, cpu_matmul_rows, matmul_element};
pub use cpu_sum::cpu_sum;
pub use tree::{group_partial, group_reduce, groups_for, tree_reduce};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("Invalid group size {0}: must be a non-zero power of two")]
    InvalidGroupSize(usize),
}

pub type Result<T> = std::result::Result<T, KernelError>;

/// Trait bound for elements that can be processed by kernels.
/// This mirrors the element bounds used by `parwork` workloads so both crates agree on what a
/// partial result can hold.
pub trait KernelElem:
    Num + NumAssign + Copy + Clone + Debug + Send + Sync + FromPrimitive + ToPrimitive + PartialOrd
{
}

impl<T> KernelElem for T where
    T: Num
        + NumAssign
        + Copy
        + Clone
        + Debug
        + Send
        + Sync
        + FromPrimitive
        + ToPrimitive
        + PartialOrd
{
}
