use super::device::{Accelerator, KernelArg, KernelSource, NdRange, ProgramId};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, trace};

/// Lifecycle of a device kernel.
///
/// `Uncompiled -> Built -> Bound -> Dispatched -> Completed -> Released`. A completed kernel may
/// be bound again for the next problem size. `Failed` is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelState {
    Uncompiled,
    Built,
    Bound,
    Dispatched,
    Completed,
    Released,
    Failed { log: String },
}

impl KernelState {
    pub fn name(&self) -> &'static str {
        match self {
            KernelState::Uncompiled => "Uncompiled",
            KernelState::Built => "Built",
            KernelState::Bound => "Bound",
            KernelState::Dispatched => "Dispatched",
            KernelState::Completed => "Completed",
            KernelState::Released => "Released",
            KernelState::Failed { .. } => "Failed",
        }
    }
}

/// A program on a specific device, driven through [`KernelState`].
pub struct Kernel<A: Accelerator> {
    device: Arc<A>,
    source: KernelSource,
    state: KernelState,
    program: Option<ProgramId>,
    args: Vec<KernelArg>,
}

impl<A: Accelerator> Kernel<A> {
    pub fn new(device: Arc<A>, source: KernelSource) -> Self {
        Self {
            device,
            source,
            state: KernelState::Uncompiled,
            program: None,
            args: Vec::new(),
        }
    }

    pub fn device(&self) -> &Arc<A> {
        &self.device
    }

    pub fn source(&self) -> &KernelSource {
        &self.source
    }

    pub fn state(&self) -> &KernelState {
        &self.state
    }

    /// Build log of a failed kernel.
    pub fn log(&self) -> Option<&str> {
        match &self.state {
            KernelState::Failed { log } => Some(log),
            _ => None,
        }
    }

    /// Whether the kernel can accept a new set of arguments.
    pub fn is_ready(&self) -> bool {
        matches!(
            self.state,
            KernelState::Built | KernelState::Bound | KernelState::Completed
        )
    }

    fn transition(&self, to: &'static str) -> Error {
        Error::InvalidTransition {
            from: self.state.name(),
            to,
        }
    }

    /// Compiles the program. A failure moves the kernel to `Failed` and returns the log.
    pub fn build(&mut self) -> Result<()> {
        if self.state != KernelState::Uncompiled {
            return Err(self.transition("Built"));
        }

        match self.device.build(&self.source) {
            Ok(program) => {
                debug!(kernel = self.source.name, device = %self.device.name(), "kernel built");
                self.program = Some(program);
                self.state = KernelState::Built;
                Ok(())
            }
            Err(log) => {
                self.state = KernelState::Failed { log: log.clone() };
                Err(Error::KernelBuild {
                    kernel: self.source.name.to_string(),
                    log,
                })
            }
        }
    }

    /// Sets the positional arguments for the next dispatch.
    pub fn bind(&mut self, args: Vec<KernelArg>) -> Result<()> {
        if !self.is_ready() {
            return Err(self.transition("Bound"));
        }
        self.args = args;
        self.state = KernelState::Bound;
        Ok(())
    }

    /// Enqueues the kernel over `range`.
    pub fn dispatch(&mut self, range: NdRange) -> Result<()> {
        let program = match (&self.state, self.program) {
            (KernelState::Bound, Some(program)) => program,
            _ => return Err(self.transition("Dispatched")),
        };

        trace!(kernel = self.source.name, global = ?range.global, local = ?range.local, "dispatch");
        self.device.dispatch(program, &self.args, range)?;
        self.state = KernelState::Dispatched;
        Ok(())
    }

    /// Blocks until the dispatched work is done.
    pub fn wait(&mut self) -> Result<()> {
        if self.state != KernelState::Dispatched {
            return Err(self.transition("Completed"));
        }
        self.device.finish()?;
        self.args.clear();
        self.state = KernelState::Completed;
        Ok(())
    }

    /// Bind, dispatch and wait in one step.
    pub fn launch(&mut self, args: Vec<KernelArg>, range: NdRange) -> Result<()> {
        self.bind(args)?;
        self.dispatch(range)?;
        self.wait()
    }

    /// Frees the program. Releasing twice is a no-op.
    pub fn release(&mut self) {
        if let Some(program) = self.program.take() {
            self.device.release_program(program);
        }
        self.args.clear();
        if !matches!(self.state, KernelState::Failed { .. }) {
            self.state = KernelState::Released;
        }
    }
}

impl<A: Accelerator> Drop for Kernel<A> {
    fn drop(&mut self) {
        if let Some(program) = self.program.take() {
            self.device.release_program(program);
        }
    }
}

impl<A: Accelerator> std::fmt::Debug for Kernel<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("name", &self.source.name)
            .field("state", &self.state)
            .finish()
    }
}
