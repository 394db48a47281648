//! WebGPU accelerator.

use super::device::{Access, Accelerator, BufferId, KernelArg, KernelSource, NdRange, ProgramId};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, info};
use wgpu::util::DeviceExt;

struct WgpuProgram {
    name: &'static str,
    pipeline: wgpu::ComputePipeline,
    workgroup_size: [usize; 2],
}

#[derive(Default)]
struct WgpuState {
    next_id: u64,
    buffers: HashMap<u64, wgpu::Buffer>,
    programs: HashMap<u64, WgpuProgram>,
}

impl WgpuState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// A GPU reached through `wgpu`.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    state: Mutex<WgpuState>,
}

fn aligned(bytes: usize) -> u64 {
    let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
    (bytes.div_ceil(align) * align).max(align) as u64
}

/// Work-group counts for `dispatch_workgroups`, each at most `max`.
fn workgroup_counts(groups: [usize; 2], max: u32) -> Result<[u32; 2]> {
    let mut counts = [0u32; 2];
    for (count, &n) in counts.iter_mut().zip(groups.iter()) {
        *count = u32::try_from(n)
            .ok()
            .filter(|&c| c <= max)
            .ok_or_else(|| {
                Error::Device(format!(
                    "{n} work-groups exceed the per-dimension limit of {max}"
                ))
            })?;
    }
    Ok(counts)
}

impl WgpuDevice {
    /// Picks the highest-performance adapter and opens a device on it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendSetup`] if no adapter is found or the device request fails.
    pub fn new() -> Result<Self> {
        pollster::block_on(Self::init())
    }

    async fn init() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| Error::BackendSetup {
                stage: "adapter",
                reason: "no suitable GPU adapter found".to_string(),
            })?;

        let adapter_name = adapter.get_info().name;
        let required_features = adapter.features() & wgpu::Features::SHADER_F64;
        if required_features.is_empty() {
            info!(adapter = %adapter_name, "adapter lacks SHADER_F64; f64 kernels will not build");
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("parwork device"),
                    required_features,
                    required_limits: adapter.limits(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| Error::BackendSetup {
                stage: "device",
                reason: e.to_string(),
            })?;

        Ok(Self {
            device,
            queue,
            adapter_name,
            state: Mutex::default(),
        })
    }

    fn scalar_buffer(&self, label: &str, contents: &[u8]) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::STORAGE,
            })
    }
}

impl Accelerator for WgpuDevice {
    fn name(&self) -> String {
        format!("wgpu:{}", self.adapter_name)
    }

    fn build(&self, source: &KernelSource) -> std::result::Result<ProgramId, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(source.name),
                source: wgpu::ShaderSource::Wgsl(source.wgsl.into()),
            });
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(source.name),
                layout: None,
                module: &module,
                entry_point: source.entry,
                compilation_options: Default::default(),
                cache: None,
            });

        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(err.to_string());
        }

        let mut state = self.state.lock();
        let id = state.next_id();
        state.programs.insert(
            id,
            WgpuProgram {
                name: source.name,
                pipeline,
                workgroup_size: source.workgroup_size,
            },
        );
        Ok(ProgramId(id))
    }

    fn release_program(&self, program: ProgramId) {
        self.state.lock().programs.remove(&program.0);
    }

    fn alloc(&self, bytes: usize, _access: Access) -> Result<BufferId> {
        let limits = self.device.limits();
        let available = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
        let size = aligned(bytes);
        if size > available {
            return Err(Error::Allocation {
                requested: bytes,
                available: available as usize,
            });
        }

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("parwork buffer"),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let mut state = self.state.lock();
        let id = state.next_id();
        state.buffers.insert(id, buffer);
        Ok(BufferId(id))
    }

    fn write(&self, buffer: BufferId, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let state = self.state.lock();
        let target = state
            .buffers
            .get(&buffer.0)
            .ok_or_else(|| Error::Device(format!("write to unknown buffer {}", buffer.0)))?;

        if data.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT == 0 {
            self.queue.write_buffer(target, 0, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(aligned(data.len()) as usize, 0);
            self.queue.write_buffer(target, 0, &padded);
        }
        Ok(())
    }

    fn dispatch(&self, program: ProgramId, args: &[KernelArg], range: NdRange) -> Result<()> {
        let state = self.state.lock();
        let program = state
            .programs
            .get(&program.0)
            .ok_or_else(|| Error::Device(format!("dispatch of unknown program {}", program.0)))?;
        if range.local != program.workgroup_size {
            return Err(Error::Device(format!(
                "{}: local size {:?} does not match the compiled workgroup size {:?}",
                program.name, range.local, program.workgroup_size
            )));
        }
        let counts = workgroup_counts(
            range.groups(),
            self.device.limits().max_compute_workgroups_per_dimension,
        )?;

        let mut buffers = Vec::new();
        let mut ints: Vec<u32> = Vec::new();
        let mut floats: Vec<f64> = Vec::new();
        for arg in args {
            match *arg {
                KernelArg::Buffer(id) => buffers.push(state.buffers.get(&id.0).ok_or_else(
                    || Error::Device(format!("dispatch with unknown buffer {}", id.0)),
                )?),
                KernelArg::I32(v) => ints.push(u32::from_ne_bytes(v.to_ne_bytes())),
                KernelArg::U32(v) => ints.push(v),
                KernelArg::F64(v) => floats.push(v),
            }
        }

        let int_params = (!ints.is_empty())
            .then(|| self.scalar_buffer("parwork u32 params", bytemuck::cast_slice(&ints)));
        let float_params = (!floats.is_empty())
            .then(|| self.scalar_buffer("parwork f64 params", bytemuck::cast_slice(&floats)));

        let entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .copied()
            .chain(int_params.as_ref())
            .chain(float_params.as_ref())
            .enumerate()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(program.name),
            layout: &program.pipeline.get_bind_group_layout(0),
            entries: &entries,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(program.name),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(program.name),
                timestamp_writes: None,
            });
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(counts[0], counts[1], 1);
        }
        self.queue.submit(Some(encoder.finish()));

        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(Error::Device(format!("{}: {err}", program.name)));
        }
        debug!(kernel = program.name, groups = ?range.groups(), "wgpu dispatch submitted");
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        self.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }

    fn read(&self, buffer: BufferId, out: &mut [u8]) -> Result<()> {
        if out.is_empty() {
            return Ok(());
        }
        let state = self.state.lock();
        let source = state
            .buffers
            .get(&buffer.0)
            .ok_or_else(|| Error::Device(format!("read from unknown buffer {}", buffer.0)))?;

        let size = aligned(out.len());
        if size > source.size() {
            return Err(Error::Device(format!(
                "read of {} bytes past the end of buffer {}",
                out.len(),
                buffer.0
            )));
        }

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("parwork staging buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("parwork read encoder"),
            });
        encoder.copy_buffer_to_buffer(source, 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        pollster::block_on(rx)
            .map_err(|_| Error::Device("buffer map callback dropped".to_string()))?
            .map_err(|e| Error::Device(e.to_string()))?;

        let data = slice.get_mapped_range();
        out.copy_from_slice(&data[..out.len()]);
        drop(data);
        staging.unmap();
        Ok(())
    }

    fn release_buffer(&self, buffer: BufferId) {
        if let Some(released) = self.state.lock().buffers.remove(&buffer.0) {
            released.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workgroup_counts_within_limit() {
        assert_eq!(workgroup_counts([3, 1], 65_535).unwrap(), [3, 1]);
        assert_eq!(workgroup_counts([65_535, 65_535], 65_535).unwrap(), [65_535, 65_535]);
    }

    #[test]
    fn test_workgroup_counts_rejects_oversized_grid() {
        assert!(matches!(
            workgroup_counts([65_536, 1], 65_535),
            Err(Error::Device(_))
        ));
        assert!(matches!(
            workgroup_counts([1, 70_000], 65_535),
            Err(Error::Device(_))
        ));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_workgroup_counts_rejects_truncation() {
        let n = u32::MAX as usize + 2;
        assert!(matches!(
            workgroup_counts([n, 1], u32::MAX),
            Err(Error::Device(_))
        ));
    }
}
