//! # parwork
//!
//! Partition-compute-reduce over interchangeable execution backends.
//!
//! A problem of `N` units is split into `W` contiguous chunks ([`partition`]), each chunk is
//! computed by one worker, and the partial results are combined into a single answer
//! ([`combine`]). The same [`Workload`] runs on:
//!
//! - [`SharedMemory`]: a rayon pool writing disjoint regions of one output buffer;
//! - [`MessagePassing`]: ranks that share nothing and exchange tagged messages with rank 0;
//! - [`AcceleratorBackend`]: one dispatch per run on an [`Accelerator`], either the in-process
//!   [`HostDevice`] or a GPU through `wgpu` with the `gpu` feature.
//!
//! Four workloads are provided: [`Hello`], [`ArraySum`], [`Derivative`] and [`Matmul`].
//!
//! ## Example
//!
//! ```rust
//! use parwork::{ArraySum, Backend, SharedMemory};
//!
//! let backend = SharedMemory::new(3).unwrap();
//! let input: Vec<i32> = (1..=10).collect();
//! assert_eq!(backend.run(&ArraySum, &input).unwrap(), 55);
//! ```

pub mod accel;
pub mod backend;
pub mod combine;
pub mod config;
pub mod error;
pub mod harness;
pub mod logging;
pub mod partition;
pub mod transport;
pub mod workload;

pub use accel::{Accelerator, HostDevice, Kernel, KernelState};
#[cfg(feature = "gpu")]
pub use accel::WgpuDevice;
pub use backend::{AcceleratorBackend, AnyBackend, Backend};
pub use config::{BackendKind, RunConfig, Sweeps};
pub use error::{Error, Result};
pub use harness::{Report, Summary, Sweep};
pub use partition::{ChunkDescriptor, Partition};
pub use transport::{ChannelMode, MessagePassing, SharedMemory, TransportError};
pub use workload::{ArraySum, Derivative, Hello, Matmul, MatmulInput, Matrix, Offload, Workload};
