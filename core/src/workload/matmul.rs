use super::{device_u32, Matrix, Offload, Workload};
use crate::accel::{
    shaders, Access, Accelerator, DeviceBuffer, Invocation, Kernel, KernelArg, KernelSource,
    NdRange,
};
use crate::combine::OutputLayout;
use crate::partition::ChunkDescriptor;
use crate::{Error, Result};
use parwork_kernels::{cpu_matmul_rows, matmul_element};
use tracing::debug;

/// The two operands of `C = A * B`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatmulInput {
    a: Matrix,
    b: Matrix,
}

impl MatmulInput {
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if `a.cols() != b.rows()`.
    pub fn new(a: Matrix, b: Matrix) -> Result<Self> {
        check_inner(&a, &b)?;
        Ok(Self { a, b })
    }

    pub fn a(&self) -> &Matrix {
        &self.a
    }

    pub fn b(&self) -> &Matrix {
        &self.b
    }
}

fn check_inner(a: &Matrix, b: &Matrix) -> Result<()> {
    if a.cols() != b.rows() {
        return Err(Error::ShapeMismatch {
            expected: vec![a.rows(), a.cols()],
            got: vec![b.rows(), b.cols()],
        });
    }
    Ok(())
}

/// What a remote worker receives: its rows of `A` and the whole of `B`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatmulShard {
    pub a_rows: Vec<f64>,
    pub b: Matrix,
}

/// Row-partitioned matrix product. `A` is split by rows, `B` is needed in full by every worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct Matmul;

fn matmul_host(inv: &mut Invocation<'_>) -> Result<()> {
    let range = inv.range();
    let (args, c) = inv.split::<f64>(2)?;
    let a = args.slice::<f64>(0)?;
    let b = args.slice::<f64>(1)?;
    let m = args.u32(3)? as usize;
    let k = args.u32(4)? as usize;
    let n = args.u32(5)? as usize;

    if a.len() < m * k || b.len() < k * n || c.len() < m * n {
        return Err(Error::Device(format!(
            "matmul buffers too small for {m}x{k} * {k}x{n}"
        )));
    }

    for row in 0..range.global[0].min(m) {
        let a_row = &a[row * k..(row + 1) * k];
        for col in 0..range.global[1].min(n) {
            c[row * n + col] = matmul_element(a_row, b, n, col);
        }
    }
    Ok(())
}

impl Workload for Matmul {
    type Input = MatmulInput;
    type Elem = f64;
    type Shard = MatmulShard;
    type Output = Matrix;

    fn name(&self) -> &'static str {
        "matmul"
    }

    fn units(&self, input: &MatmulInput) -> Result<usize> {
        check_inner(&input.a, &input.b)?;
        Ok(input.a.rows())
    }

    fn layout(&self, input: &MatmulInput) -> OutputLayout {
        OutputLayout::PerUnit {
            width: input.b.cols(),
        }
    }

    fn execute(
        &self,
        input: &MatmulInput,
        chunk: &ChunkDescriptor,
        out: &mut [f64],
    ) -> Result<()> {
        cpu_matmul_rows(
            input.a.row_block(chunk.range()),
            input.b.data(),
            chunk.len,
            input.a.cols(),
            input.b.cols(),
            out,
        )?;
        Ok(())
    }

    fn shard(&self, input: &MatmulInput, chunk: &ChunkDescriptor) -> MatmulShard {
        debug!(
            worker = chunk.owner,
            bytes = std::mem::size_of_val(input.b.data()),
            "broadcasting B"
        );
        MatmulShard {
            a_rows: input.a.row_block(chunk.range()).to_vec(),
            b: input.b.clone(),
        }
    }

    fn execute_shard(
        &self,
        shard: &MatmulShard,
        chunk: &ChunkDescriptor,
        out: &mut [f64],
    ) -> Result<()> {
        cpu_matmul_rows(
            &shard.a_rows,
            shard.b.data(),
            chunk.len,
            shard.b.rows(),
            shard.b.cols(),
            out,
        )?;
        Ok(())
    }

    fn finish(&self, input: &MatmulInput, out: Vec<f64>) -> Result<Matrix> {
        Matrix::new(input.a.rows(), input.b.cols(), out)
    }
}

impl Offload for Matmul {
    fn kernel_source(&self) -> KernelSource {
        KernelSource {
            name: "matmul",
            entry: "main",
            wgsl: shaders::MATMUL,
            workgroup_size: [8, 8],
            host: Some(matmul_host),
        }
    }

    fn offload<A: Accelerator>(
        &self,
        kernel: &mut Kernel<A>,
        _group_size: usize,
        input: &MatmulInput,
    ) -> Result<Matrix> {
        let m = self.units(input)?;
        let k = input.a.cols();
        let n = input.b.cols();
        if m == 0 || n == 0 || k == 0 {
            return Ok(Matrix::zeros(m, n));
        }

        let device = kernel.device().clone();
        let a = DeviceBuffer::upload(&device, input.a.data(), Access::ReadOnly)?;
        let b = DeviceBuffer::upload(&device, input.b.data(), Access::ReadOnly)?;
        let c = DeviceBuffer::<f64, A>::zeroed(&device, m * n, Access::WriteOnly)?;

        kernel.launch(
            vec![
                a.arg(),
                b.arg(),
                c.arg(),
                KernelArg::U32(device_u32(m, "rows of A")?),
                KernelArg::U32(device_u32(k, "inner dimension")?),
                KernelArg::U32(device_u32(n, "cols of B")?),
            ],
            NdRange::grid([m, n], kernel.source().workgroup_size),
        )?;

        Matrix::new(m, n, c.read()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_rejects_inner_mismatch() {
        let a = Matrix::zeros(2, 3);
        let b = Matrix::zeros(2, 2);
        assert!(matches!(
            MatmulInput::new(a, b),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_shard_carries_all_of_b() {
        let a = Matrix::from_fn(4, 2, |i, j| (i + j) as f64);
        let b = Matrix::identity(2);
        let input = MatmulInput::new(a, b.clone()).unwrap();
        let chunk = ChunkDescriptor::new(1, 2, 2);

        let shard = Matmul.shard(&input, &chunk);
        assert_eq!(shard.b, b);
        assert_eq!(shard.a_rows, vec![2.0, 3.0, 3.0, 4.0]);

        let mut out = vec![0.0; 4];
        Matmul.execute_shard(&shard, &chunk, &mut out).unwrap();
        assert_eq!(out, shard.a_rows);
    }
}
