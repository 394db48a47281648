use crate::transport::TransportError;
use parwork_kernels::KernelError;
use thiserror::Error;

/// Error type for every `parwork` operation.
#[derive(Error, Debug)]
pub enum Error {
    /// A worker count, size, group size or environment value is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// Input dimensions are inconsistent (e.g. `A.cols != B.rows`).
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    /// The runtime, a thread pool or a device could not be brought up.
    #[error("Backend setup failed during {stage}: {reason}")]
    BackendSetup { stage: &'static str, reason: String },
    /// A device program failed to compile. `log` carries the compiler output.
    #[error("Kernel `{kernel}` failed to build:\n{log}")]
    KernelBuild { kernel: String, log: String },
    /// A kernel was driven through its lifecycle out of order.
    #[error("Invalid kernel transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
    /// A device buffer could not be reserved.
    #[error("Device allocation of {requested} bytes failed ({available} bytes available)")]
    Allocation { requested: usize, available: usize },
    /// Any other device-side failure (enqueue, transfer, completion).
    #[error("Device error: {0}")]
    Device(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Kernel(#[from] KernelError),
}

pub type Result<T> = std::result::Result<T, Error>;
