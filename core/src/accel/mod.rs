//! # Accelerator offload
//!
//! Device-side execution with explicit resource handling: programs are built and bound through
//! the [`Kernel`] state machine, buffers are typed RAII handles ([`DeviceBuffer`]), and each
//! workload run is one upload, one dispatch over an [`NdRange`], and one blocking read.
//!
//! Two devices implement [`Accelerator`]:
//!
//! - [`HostDevice`]: a software device that emulates work-groups on the calling thread.
//! - `WgpuDevice` (feature `gpu`): a GPU reached through `wgpu`, running the WGSL in [`shaders`].

pub mod buffer;
pub mod device;
#[cfg(feature = "gpu")]
pub mod gpu;
pub mod host;
pub mod kernel;
pub mod shaders;

pub use buffer::DeviceBuffer;
pub use device::{Access, Accelerator, BufferId, KernelArg, KernelSource, NdRange, ProgramId};
#[cfg(feature = "gpu")]
pub use gpu::WgpuDevice;
pub use host::{ArgView, HostDevice, HostKernel, Invocation};
pub use kernel::{Kernel, KernelState};
