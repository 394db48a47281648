//! A software accelerator.
//!
//! `HostDevice` keeps buffers in host memory and runs kernels as native functions that iterate
//! over the work-groups of the dispatched [`NdRange`]. It needs no driver, so it is always
//! available, and it enforces the same discipline as a real device: explicit allocation,
//! explicit copies, programs that must be built before use, and an optional memory ceiling.

use super::device::{Access, Accelerator, BufferId, KernelArg, KernelSource, NdRange, ProgramId};
use crate::{Error, Result};
use bytemuck::Pod;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::trace;

/// Native entry point of a host kernel.
pub type HostKernel = fn(&mut Invocation<'_>) -> Result<()>;

/// Buffer storage. Backed by `u64` words so every element type up to 8 bytes is aligned.
#[derive(Debug)]
pub struct HostBuffer {
    words: Vec<u64>,
    bytes: usize,
    access: Access,
}

impl HostBuffer {
    fn new(bytes: usize, access: Access) -> Self {
        Self {
            words: vec![0; bytes.div_ceil(8)],
            bytes,
            access,
        }
    }

    fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.words)[..self.bytes]
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)[..self.bytes]
    }
}

/// A resolved kernel argument as the kernel sees it.
#[derive(Debug)]
pub enum BoundArg {
    Buffer { id: u64, buffer: HostBuffer },
    I32(i32),
    U32(u32),
    F64(f64),
}

/// One dispatch of a host kernel.
pub struct Invocation<'a> {
    range: NdRange,
    args: &'a mut [BoundArg],
}

impl<'a> Invocation<'a> {
    pub fn range(&self) -> NdRange {
        self.range
    }

    /// Borrows argument `output` as a writable typed slice and every other argument read-only.
    pub fn split<O: Pod>(&mut self, output: usize) -> Result<(ArgView<'_>, &mut [O])> {
        if output >= self.args.len() {
            return Err(Error::Device(format!("no kernel argument at index {output}")));
        }
        let (before, rest) = self.args.split_at_mut(output);
        let (target, after) = rest
            .split_first_mut()
            .ok_or_else(|| Error::Device(format!("no kernel argument at index {output}")))?;

        let out = match target {
            BoundArg::Buffer { buffer, .. } if buffer.access != Access::ReadOnly => {
                bytemuck::try_cast_slice_mut(buffer.as_bytes_mut()).map_err(|e| {
                    Error::Device(format!("argument {output} cannot be viewed as output: {e}"))
                })?
            }
            BoundArg::Buffer { .. } => {
                return Err(Error::Device(format!(
                    "argument {output} is a read-only buffer"
                )))
            }
            _ => return Err(Error::Device(format!("argument {output} is not a buffer"))),
        };

        Ok((
            ArgView {
                before,
                after,
                hole: output,
            },
            out,
        ))
    }
}

/// Read-only view of the arguments around the output buffer.
pub struct ArgView<'a> {
    before: &'a [BoundArg],
    after: &'a [BoundArg],
    hole: usize,
}

impl<'a> ArgView<'a> {
    fn get(&self, index: usize) -> Result<&'a BoundArg> {
        let arg = if index < self.hole {
            self.before.get(index)
        } else if index == self.hole {
            return Err(Error::Device(format!(
                "argument {index} is borrowed as the output"
            )));
        } else {
            self.after.get(index - self.hole - 1)
        };
        arg.ok_or_else(|| Error::Device(format!("no kernel argument at index {index}")))
    }

    pub fn slice<T: Pod>(&self, index: usize) -> Result<&'a [T]> {
        match self.get(index)? {
            BoundArg::Buffer { buffer, .. } => bytemuck::try_cast_slice(buffer.as_bytes())
                .map_err(|e| Error::Device(format!("argument {index}: {e}"))),
            other => Err(Error::Device(format!(
                "argument {index} is a scalar ({other:?}), expected a buffer"
            ))),
        }
    }

    pub fn i32(&self, index: usize) -> Result<i32> {
        match self.get(index)? {
            BoundArg::I32(v) => Ok(*v),
            other => Err(scalar_mismatch(index, "i32", other)),
        }
    }

    pub fn u32(&self, index: usize) -> Result<u32> {
        match self.get(index)? {
            BoundArg::U32(v) => Ok(*v),
            other => Err(scalar_mismatch(index, "u32", other)),
        }
    }

    pub fn f64(&self, index: usize) -> Result<f64> {
        match self.get(index)? {
            BoundArg::F64(v) => Ok(*v),
            other => Err(scalar_mismatch(index, "f64", other)),
        }
    }
}

fn scalar_mismatch(index: usize, expected: &str, got: &BoundArg) -> Error {
    Error::Device(format!("argument {index}: expected {expected}, got {got:?}"))
}

struct HostProgram {
    name: &'static str,
    entry: HostKernel,
}

#[derive(Default)]
struct HostState {
    next_id: u64,
    buffers: HashMap<u64, HostBuffer>,
    programs: HashMap<u64, HostProgram>,
    allocated: usize,
}

impl HostState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Software accelerator running kernels on the calling thread.
#[derive(Default)]
pub struct HostDevice {
    state: Mutex<HostState>,
    memory_limit: Option<usize>,
}

impl HostDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the total bytes that may be allocated at once.
    pub fn with_memory_limit(limit: usize) -> Self {
        Self {
            state: Mutex::default(),
            memory_limit: Some(limit),
        }
    }

    pub fn memory_limit(&self) -> Option<usize> {
        self.memory_limit
    }

    pub fn allocated_bytes(&self) -> usize {
        self.state.lock().allocated
    }

    pub fn live_buffers(&self) -> usize {
        self.state.lock().buffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.lock().programs.len()
    }
}

impl Accelerator for HostDevice {
    fn name(&self) -> String {
        "host".to_string()
    }

    fn build(&self, source: &KernelSource) -> std::result::Result<ProgramId, String> {
        let entry = source.host.ok_or_else(|| {
            format!(
                "{}: no host entry point `{}` in program source",
                source.name, source.entry
            )
        })?;

        let mut state = self.state.lock();
        let id = state.next_id();
        state.programs.insert(
            id,
            HostProgram {
                name: source.name,
                entry,
            },
        );
        Ok(ProgramId(id))
    }

    fn release_program(&self, program: ProgramId) {
        self.state.lock().programs.remove(&program.0);
    }

    fn alloc(&self, bytes: usize, access: Access) -> Result<BufferId> {
        let mut state = self.state.lock();
        if let Some(limit) = self.memory_limit {
            let available = limit.saturating_sub(state.allocated);
            if bytes > available {
                return Err(Error::Allocation {
                    requested: bytes,
                    available,
                });
            }
        }

        let id = state.next_id();
        state.buffers.insert(id, HostBuffer::new(bytes, access));
        state.allocated += bytes;
        trace!(buffer = id, bytes, "host alloc");
        Ok(BufferId(id))
    }

    fn write(&self, buffer: BufferId, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        let target = state
            .buffers
            .get_mut(&buffer.0)
            .ok_or_else(|| Error::Device(format!("write to unknown buffer {}", buffer.0)))?;
        if data.len() > target.bytes {
            return Err(Error::Device(format!(
                "write of {} bytes overflows buffer {} ({} bytes)",
                data.len(),
                buffer.0,
                target.bytes
            )));
        }
        target.as_bytes_mut()[..data.len()].copy_from_slice(data);
        Ok(())
    }

    fn dispatch(&self, program: ProgramId, args: &[KernelArg], range: NdRange) -> Result<()> {
        let (name, entry, mut bound) = {
            let mut state = self.state.lock();
            let (name, entry) = match state.programs.get(&program.0) {
                Some(p) => (p.name, p.entry),
                None => {
                    return Err(Error::Device(format!(
                        "dispatch of unknown program {}",
                        program.0
                    )))
                }
            };

            let mut bound = Vec::with_capacity(args.len());
            for arg in args {
                let resolved = match *arg {
                    KernelArg::Buffer(id) => match state.buffers.remove(&id.0) {
                        Some(buffer) => BoundArg::Buffer { id: id.0, buffer },
                        None => {
                            restore(&mut state, bound);
                            return Err(Error::Device(format!(
                                "buffer {} is unknown or bound twice",
                                id.0
                            )));
                        }
                    },
                    KernelArg::I32(v) => BoundArg::I32(v),
                    KernelArg::U32(v) => BoundArg::U32(v),
                    KernelArg::F64(v) => BoundArg::F64(v),
                };
                bound.push(resolved);
            }
            (name, entry, bound)
        };

        trace!(kernel = name, groups = ?range.groups(), "host dispatch");
        let result = entry(&mut Invocation {
            range,
            args: &mut bound,
        });

        restore(&mut self.state.lock(), bound);
        result
    }

    fn finish(&self) -> Result<()> {
        // Dispatch runs to completion before returning.
        Ok(())
    }

    fn read(&self, buffer: BufferId, out: &mut [u8]) -> Result<()> {
        let state = self.state.lock();
        let source = state
            .buffers
            .get(&buffer.0)
            .ok_or_else(|| Error::Device(format!("read from unknown buffer {}", buffer.0)))?;
        if out.len() > source.bytes {
            return Err(Error::Device(format!(
                "read of {} bytes past the end of buffer {} ({} bytes)",
                out.len(),
                buffer.0,
                source.bytes
            )));
        }
        out.copy_from_slice(&source.as_bytes()[..out.len()]);
        Ok(())
    }

    fn release_buffer(&self, buffer: BufferId) {
        let mut state = self.state.lock();
        if let Some(released) = state.buffers.remove(&buffer.0) {
            state.allocated -= released.bytes;
        }
    }
}

fn restore(state: &mut HostState, bound: Vec<BoundArg>) {
    for arg in bound {
        if let BoundArg::Buffer { id, buffer } = arg {
            state.buffers.insert(id, buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn double(inv: &mut Invocation<'_>) -> Result<()> {
        let (args, out) = inv.split::<i32>(1)?;
        let input = args.slice::<i32>(0)?;
        for (o, &i) in out.iter_mut().zip(input) {
            *o = 2 * i;
        }
        Ok(())
    }

    const DOUBLE: KernelSource = KernelSource {
        name: "double",
        entry: "main",
        wgsl: "",
        workgroup_size: [1, 1],
        host: Some(double),
    };

    #[test]
    fn test_write_dispatch_read() {
        let device = HostDevice::new();
        let program = device.build(&DOUBLE).unwrap();
        let input = device.alloc(12, Access::ReadOnly).unwrap();
        let output = device.alloc(12, Access::WriteOnly).unwrap();

        device
            .write(input, bytemuck::cast_slice(&[1i32, 2, 3]))
            .unwrap();
        device
            .dispatch(
                program,
                &[KernelArg::Buffer(input), KernelArg::Buffer(output)],
                NdRange::linear(3, 1),
            )
            .unwrap();
        device.finish().unwrap();

        let mut out = [0i32; 3];
        device
            .read(output, bytemuck::cast_slice_mut(&mut out))
            .unwrap();
        assert_eq!(out, [2, 4, 6]);
        assert_eq!(device.live_buffers(), 2);
    }

    #[test]
    fn test_read_only_output_rejected() {
        let device = HostDevice::new();
        let program = device.build(&DOUBLE).unwrap();
        let a = device.alloc(4, Access::ReadOnly).unwrap();
        let b = device.alloc(4, Access::ReadOnly).unwrap();

        let err = device.dispatch(
            program,
            &[KernelArg::Buffer(a), KernelArg::Buffer(b)],
            NdRange::linear(1, 1),
        );
        assert!(matches!(err, Err(Error::Device(_))));
        // Buffers survive a failed dispatch.
        assert_eq!(device.live_buffers(), 2);
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let device = HostDevice::new();
        let program = device.build(&DOUBLE).unwrap();
        let a = device.alloc(4, Access::ReadWrite).unwrap();

        let err = device.dispatch(
            program,
            &[KernelArg::Buffer(a), KernelArg::Buffer(a)],
            NdRange::linear(1, 1),
        );
        assert!(matches!(err, Err(Error::Device(_))));
        assert_eq!(device.live_buffers(), 1);
    }

    #[test]
    fn test_release_returns_memory() {
        let device = HostDevice::with_memory_limit(64);
        let a = device.alloc(40, Access::ReadWrite).unwrap();
        assert!(matches!(
            device.alloc(40, Access::ReadWrite),
            Err(Error::Allocation {
                requested: 40,
                available: 24
            })
        ));
        device.release_buffer(a);
        assert_eq!(device.allocated_bytes(), 0);
        assert!(device.alloc(40, Access::ReadWrite).is_ok());
    }
}
