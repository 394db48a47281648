use super::host::HostKernel;
use crate::Result;

/// Handle to a device allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub(crate) u64);

/// Handle to a compiled program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub(crate) u64);

/// How a kernel is allowed to touch a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// One positional kernel argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelArg {
    Buffer(BufferId),
    I32(i32),
    U32(u32),
    F64(f64),
}

/// Global and local work sizes of a dispatch, in up to two dimensions.
///
/// The global size is always a multiple of the local size, so a range built from a problem size
/// may cover more items than exist; kernels guard against the excess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdRange {
    pub global: [usize; 2],
    pub local: [usize; 2],
}

impl NdRange {
    /// One-dimensional range over at least `items`, rounded up to whole groups of `local`.
    pub fn linear(items: usize, local: usize) -> Self {
        Self::grid([items, 1], [local, 1])
    }

    /// One-dimensional range of exactly `groups` work-groups.
    pub fn linear_groups(groups: usize, local: usize) -> Self {
        Self {
            global: [groups * local, 1],
            local: [local, 1],
        }
    }

    /// Two-dimensional range over at least `items[0] x items[1]`.
    pub fn grid(items: [usize; 2], local: [usize; 2]) -> Self {
        let local = [local[0].max(1), local[1].max(1)];
        let global = [
            items[0].div_ceil(local[0]) * local[0],
            items[1].div_ceil(local[1]) * local[1],
        ];
        Self { global, local }
    }

    /// Number of work-groups along each dimension.
    pub fn groups(&self) -> [usize; 2] {
        [
            self.global[0] / self.local[0].max(1),
            self.global[1] / self.local[1].max(1),
        ]
    }

    pub fn global_items(&self) -> usize {
        self.global[0] * self.global[1]
    }
}

/// A device program in every form a backend may need it.
#[derive(Clone, Copy)]
pub struct KernelSource {
    pub name: &'static str,
    pub entry: &'static str,
    /// WGSL text for GPU backends.
    pub wgsl: &'static str,
    /// `@workgroup_size` declared in `wgsl`.
    pub workgroup_size: [usize; 2],
    /// Native entry point for [`HostDevice`](super::HostDevice).
    pub host: Option<HostKernel>,
}

impl std::fmt::Debug for KernelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelSource")
            .field("name", &self.name)
            .field("entry", &self.entry)
            .field("workgroup_size", &self.workgroup_size)
            .field("host", &self.host.is_some())
            .finish()
    }
}

/// A byte-level compute device.
///
/// Programs and buffers are referred to by handle. Dispatch may return before the device has
/// finished; [`finish`](Accelerator::finish) and [`read`](Accelerator::read) block.
pub trait Accelerator: Send + Sync {
    fn name(&self) -> String;

    /// Compiles `source`. On failure the error is the build log.
    fn build(&self, source: &KernelSource) -> std::result::Result<ProgramId, String>;

    fn release_program(&self, program: ProgramId);

    fn alloc(&self, bytes: usize, access: Access) -> Result<BufferId>;

    /// Host-to-device copy into the start of `buffer`.
    fn write(&self, buffer: BufferId, data: &[u8]) -> Result<()>;

    fn dispatch(&self, program: ProgramId, args: &[KernelArg], range: NdRange) -> Result<()>;

    /// Blocks until all dispatched work has completed.
    fn finish(&self) -> Result<()>;

    /// Blocking device-to-host copy of the first `out.len()` bytes of `buffer`.
    fn read(&self, buffer: BufferId, out: &mut [u8]) -> Result<()>;

    fn release_buffer(&self, buffer: BufferId);
}
