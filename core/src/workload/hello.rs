use super::{device_u32, Offload, Workload};
use crate::accel::{
    shaders, Access, Accelerator, DeviceBuffer, Invocation, Kernel, KernelArg, KernelSource,
    NdRange,
};
use crate::combine::OutputLayout;
use crate::partition::ChunkDescriptor;
use crate::{Error, Result};
use tracing::info;

/// Every worker greets and writes its own global ids: `out[i] = i`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hello;

fn write_ids(chunk: &ChunkDescriptor, out: &mut [u32]) -> Result<()> {
    if out.len() != chunk.len {
        return Err(Error::ShapeMismatch {
            expected: vec![chunk.len],
            got: vec![out.len()],
        });
    }
    for (slot, id) in out.iter_mut().zip(chunk.range()) {
        *slot = device_u32(id, "item id")?;
    }
    Ok(())
}

fn hello_host(inv: &mut Invocation<'_>) -> Result<()> {
    let range = inv.range();
    let (args, result) = inv.split::<u32>(0)?;
    let n = args.u32(1)? as usize;

    for gid in 0..range.global[0].min(n).min(result.len()) {
        result[gid] = gid as u32;
    }
    Ok(())
}

impl Workload for Hello {
    type Input = usize;
    type Elem = u32;
    type Shard = ();
    type Output = Vec<u32>;

    fn name(&self) -> &'static str {
        "hello"
    }

    fn units(&self, input: &usize) -> Result<usize> {
        device_u32(*input, "item count")?;
        Ok(*input)
    }

    fn layout(&self, _input: &usize) -> OutputLayout {
        OutputLayout::PerUnit { width: 1 }
    }

    fn announce(&self, chunk: &ChunkDescriptor, workers: usize) {
        info!(
            worker = chunk.owner,
            items = chunk.len,
            "hello from worker {} of {}",
            chunk.owner,
            workers
        );
    }

    fn execute(&self, _input: &usize, chunk: &ChunkDescriptor, out: &mut [u32]) -> Result<()> {
        write_ids(chunk, out)
    }

    fn shard(&self, _input: &usize, _chunk: &ChunkDescriptor) {}

    fn execute_shard(&self, _shard: &(), chunk: &ChunkDescriptor, out: &mut [u32]) -> Result<()> {
        write_ids(chunk, out)
    }

    fn finish(&self, _input: &usize, out: Vec<u32>) -> Result<Vec<u32>> {
        Ok(out)
    }
}

impl Offload for Hello {
    fn kernel_source(&self) -> KernelSource {
        KernelSource {
            name: "hello",
            entry: "main",
            wgsl: shaders::HELLO,
            workgroup_size: [64, 1],
            host: Some(hello_host),
        }
    }

    fn offload<A: Accelerator>(
        &self,
        kernel: &mut Kernel<A>,
        _group_size: usize,
        input: &usize,
    ) -> Result<Vec<u32>> {
        let n = self.units(input)?;
        if n == 0 {
            return Ok(Vec::new());
        }
        let count = device_u32(n, "item count")?;

        let device = kernel.device().clone();
        let result = DeviceBuffer::<u32, A>::zeroed(&device, n, Access::WriteOnly)?;
        let range = NdRange::linear(n, kernel.source().workgroup_size[0]);

        kernel.launch(vec![result.arg(), KernelArg::U32(count)], range)?;
        info!(
            device = %device.name(),
            groups = range.groups()[0],
            "hello from {} work-groups",
            range.groups()[0]
        );

        result.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_writes_global_ids() {
        let chunk = ChunkDescriptor::new(1, 3, 2);
        let mut out = vec![0u32; 2];
        Hello.execute(&5, &chunk, &mut out).unwrap();
        assert_eq!(out, vec![3, 4]);
    }

    #[test]
    fn test_empty_chunk_is_noop() {
        let chunk = ChunkDescriptor::new(4, 3, 0);
        let mut out: Vec<u32> = vec![];
        assert!(Hello.execute_shard(&(), &chunk, &mut out).is_ok());
    }
}
