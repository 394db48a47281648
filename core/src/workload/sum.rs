use super::{device_u32, Offload, Workload};
use crate::accel::{
    shaders, Access, Accelerator, DeviceBuffer, Invocation, Kernel, KernelArg, KernelSource,
    NdRange,
};
use crate::combine::{sum_partials, OutputLayout};
use crate::partition::ChunkDescriptor;
use crate::{Error, Result};
use parwork_kernels::{cpu_sum, group_reduce, groups_for};
use tracing::{debug, trace};

/// Sum of an `i32` array, accumulated as `i64`.
///
/// Each worker reduces its slice into its own slot; the slots are added in owner order. On a
/// device, every work-group tree-reduces a grid-stride slice into an `i64` partial and the host
/// adds the per-group partials.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArraySum;

fn reduce_into(data: &[i32], chunk: &ChunkDescriptor, out: &mut [i64]) -> Result<()> {
    if out.len() != 1 {
        return Err(Error::ShapeMismatch {
            expected: vec![1],
            got: vec![out.len()],
        });
    }
    out[0] = cpu_sum::<i32, i64>(data);
    trace!(worker = chunk.owner, len = chunk.len, partial = out[0], "chunk reduced");
    Ok(())
}

fn reduce_sum_host(inv: &mut Invocation<'_>) -> Result<()> {
    let range = inv.range();
    let (args, partials) = inv.split::<i64>(1)?;
    let input = args.slice::<i32>(0)?;
    let n = (args.u32(2)? as usize).min(input.len());

    let groups = range.groups()[0];
    let sums = group_reduce::<i32, i64>(&input[..n], range.local[0], groups)?;
    if partials.len() < sums.len() {
        return Err(Error::Device(format!(
            "partials buffer holds {} groups, dispatch has {}",
            partials.len(),
            sums.len()
        )));
    }
    partials[..sums.len()].copy_from_slice(&sums);
    Ok(())
}

impl Workload for ArraySum {
    type Input = Vec<i32>;
    type Elem = i64;
    type Shard = Vec<i32>;
    type Output = i64;

    fn name(&self) -> &'static str {
        "sum"
    }

    fn units(&self, input: &Vec<i32>) -> Result<usize> {
        Ok(input.len())
    }

    fn layout(&self, _input: &Vec<i32>) -> OutputLayout {
        OutputLayout::PerChunk
    }

    fn execute(&self, input: &Vec<i32>, chunk: &ChunkDescriptor, out: &mut [i64]) -> Result<()> {
        reduce_into(&input[chunk.range()], chunk, out)
    }

    fn shard(&self, input: &Vec<i32>, chunk: &ChunkDescriptor) -> Vec<i32> {
        input[chunk.range()].to_vec()
    }

    fn execute_shard(
        &self,
        shard: &Vec<i32>,
        chunk: &ChunkDescriptor,
        out: &mut [i64],
    ) -> Result<()> {
        if shard.len() != chunk.len {
            return Err(Error::ShapeMismatch {
                expected: vec![chunk.len],
                got: vec![shard.len()],
            });
        }
        reduce_into(shard, chunk, out)
    }

    fn finish(&self, _input: &Vec<i32>, out: Vec<i64>) -> Result<i64> {
        Ok(sum_partials(&out))
    }
}

impl Offload for ArraySum {
    fn kernel_source(&self) -> KernelSource {
        KernelSource {
            name: "reduce_sum",
            entry: "main",
            wgsl: shaders::REDUCE_SUM,
            workgroup_size: [256, 1],
            host: Some(reduce_sum_host),
        }
    }

    fn offload<A: Accelerator>(
        &self,
        kernel: &mut Kernel<A>,
        group_size: usize,
        input: &Vec<i32>,
    ) -> Result<i64> {
        let n = input.len();
        if n == 0 {
            return Ok(0);
        }

        let groups = groups_for(n, group_size);
        let device = kernel.device().clone();
        let data = DeviceBuffer::upload(&device, input, Access::ReadOnly)?;
        let partials = DeviceBuffer::<i64, A>::zeroed(&device, groups, Access::WriteOnly)?;

        kernel.launch(
            vec![
                data.arg(),
                partials.arg(),
                KernelArg::U32(device_u32(n, "array length")?),
            ],
            NdRange::linear_groups(groups, group_size),
        )?;

        let partials = partials.read()?;
        debug!(groups, "combining per-group partials");
        Ok(sum_partials(&partials))
    }
}
