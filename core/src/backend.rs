//! Execution backends.
//!
//! A [`Backend`] runs any [`Offload`] workload end to end. The two CPU strategies go through
//! [`transport::drive`](crate::transport::drive); the accelerator backend uploads, dispatches
//! once and reads back. [`AnyBackend`] picks one at runtime from a [`RunConfig`].

use crate::accel::{Accelerator, HostDevice, Kernel};
use crate::config::{BackendKind, RunConfig};
use crate::transport::{drive, MessagePassing, SharedMemory};
use crate::workload::Offload;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[cfg(feature = "gpu")]
use crate::accel::WgpuDevice;

pub trait Backend {
    fn name(&self) -> String;

    /// Threads, ranks, or lanes per work-group, depending on the backend.
    fn workers(&self) -> usize;

    fn run<W: Offload>(&self, workload: &W, input: &W::Input) -> Result<W::Output>;
}

impl Backend for SharedMemory {
    fn name(&self) -> String {
        "threads".to_string()
    }

    fn workers(&self) -> usize {
        crate::transport::Transport::workers(self)
    }

    fn run<W: Offload>(&self, workload: &W, input: &W::Input) -> Result<W::Output> {
        drive(self, workload, input)
    }
}

impl Backend for MessagePassing {
    fn name(&self) -> String {
        "processes".to_string()
    }

    fn workers(&self) -> usize {
        crate::transport::Transport::workers(self)
    }

    fn run<W: Offload>(&self, workload: &W, input: &W::Input) -> Result<W::Output> {
        drive(self, workload, input)
    }
}

/// Runs workloads as single device dispatches.
///
/// Kernels are built on first use and kept for later sizes. A kernel that fails to build is
/// not kept, so every run of that workload reports the build log again.
pub struct AcceleratorBackend<A: Accelerator> {
    device: Arc<A>,
    group_size: usize,
    kernels: Mutex<HashMap<&'static str, Kernel<A>>>,
}

impl<A: Accelerator> AcceleratorBackend<A> {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] unless `group_size` is a non-zero power of two.
    pub fn new(device: A, group_size: usize) -> Result<Self> {
        Self::with_device(Arc::new(device), group_size)
    }

    pub fn with_device(device: Arc<A>, group_size: usize) -> Result<Self> {
        if group_size == 0 || !group_size.is_power_of_two() {
            return Err(Error::InvalidConfiguration(format!(
                "group size must be a non-zero power of two, got {group_size}"
            )));
        }
        Ok(Self {
            device,
            group_size,
            kernels: Mutex::new(HashMap::new()),
        })
    }

    pub fn device(&self) -> &Arc<A> {
        &self.device
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    pub fn cached_kernels(&self) -> usize {
        self.kernels.lock().len()
    }
}

impl<A: Accelerator> Backend for AcceleratorBackend<A> {
    fn name(&self) -> String {
        self.device.name()
    }

    fn workers(&self) -> usize {
        self.group_size
    }

    fn run<W: Offload>(&self, workload: &W, input: &W::Input) -> Result<W::Output> {
        let source = workload.kernel_source();
        let mut kernels = self.kernels.lock();

        let kernel = match kernels.entry(source.name) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let mut kernel = Kernel::new(Arc::clone(&self.device), source);
                kernel.build()?;
                entry.insert(kernel)
            }
        };

        debug!(workload = workload.name(), device = %self.device.name(), "offload");
        workload.offload(kernel, self.group_size, input)
    }
}

/// Backend chosen at runtime.
pub enum AnyBackend {
    Threads(SharedMemory),
    Processes(MessagePassing),
    Device(AcceleratorBackend<HostDevice>),
    #[cfg(feature = "gpu")]
    Gpu(AcceleratorBackend<WgpuDevice>),
}

impl AnyBackend {
    /// Builds the backend named by `config.backend`.
    ///
    /// # Errors
    ///
    /// Invalid settings are [`Error::InvalidConfiguration`]. Asking for `gpu` in a build
    /// without the `gpu` feature, or on a machine without an adapter, is
    /// [`Error::BackendSetup`].
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        config.validate()?;

        match config.backend {
            BackendKind::Threads => Ok(AnyBackend::Threads(SharedMemory::new(config.workers)?)),
            BackendKind::Processes => Ok(AnyBackend::Processes(
                MessagePassing::new(config.workers)?.with_mode(config.channel_mode),
            )),
            BackendKind::Device => {
                let device = match config.device_memory_limit {
                    Some(limit) => HostDevice::with_memory_limit(limit),
                    None => HostDevice::new(),
                };
                Ok(AnyBackend::Device(AcceleratorBackend::new(
                    device,
                    config.group_size,
                )?))
            }
            #[cfg(feature = "gpu")]
            BackendKind::Gpu => Ok(AnyBackend::Gpu(AcceleratorBackend::new(
                WgpuDevice::new()?,
                config.group_size,
            )?)),
            #[cfg(not(feature = "gpu"))]
            BackendKind::Gpu => Err(Error::BackendSetup {
                stage: "gpu",
                reason: "built without the `gpu` feature".to_string(),
            }),
        }
    }
}

impl Backend for AnyBackend {
    fn name(&self) -> String {
        match self {
            AnyBackend::Threads(b) => b.name(),
            AnyBackend::Processes(b) => b.name(),
            AnyBackend::Device(b) => b.name(),
            #[cfg(feature = "gpu")]
            AnyBackend::Gpu(b) => b.name(),
        }
    }

    fn workers(&self) -> usize {
        match self {
            AnyBackend::Threads(b) => Backend::workers(b),
            AnyBackend::Processes(b) => Backend::workers(b),
            AnyBackend::Device(b) => b.workers(),
            #[cfg(feature = "gpu")]
            AnyBackend::Gpu(b) => b.workers(),
        }
    }

    fn run<W: Offload>(&self, workload: &W, input: &W::Input) -> Result<W::Output> {
        match self {
            AnyBackend::Threads(b) => b.run(workload, input),
            AnyBackend::Processes(b) => b.run(workload, input),
            AnyBackend::Device(b) => b.run(workload, input),
            #[cfg(feature = "gpu")]
            AnyBackend::Gpu(b) => b.run(workload, input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::ArraySum;

    #[test]
    fn test_group_size_validated() {
        assert!(AcceleratorBackend::new(HostDevice::new(), 0).is_err());
        assert!(AcceleratorBackend::new(HostDevice::new(), 100).is_err());
        assert!(AcceleratorBackend::new(HostDevice::new(), 128).is_ok());
    }

    #[test]
    fn test_kernel_built_once() {
        let backend = AcceleratorBackend::new(HostDevice::new(), 4).unwrap();
        assert_eq!(backend.run(&ArraySum, &vec![1; 10]).unwrap(), 10);
        assert_eq!(backend.run(&ArraySum, &vec![2; 10]).unwrap(), 20);
        assert_eq!(backend.cached_kernels(), 1);
        assert_eq!(backend.device().live_programs(), 1);
        assert_eq!(backend.device().live_buffers(), 0);
    }

    #[test]
    fn test_from_config_selects_backend() {
        let config = RunConfig::default()
            .with_workers(3)
            .with_backend(BackendKind::Processes);
        let backend = AnyBackend::from_config(&config).unwrap();
        assert_eq!(backend.name(), "processes");
        assert_eq!(backend.workers(), 3);
    }
}
