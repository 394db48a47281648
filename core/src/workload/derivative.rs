use super::{device_u32, Matrix, Offload, Workload};
use crate::accel::{
    shaders, Access, Accelerator, DeviceBuffer, Invocation, Kernel, KernelArg, KernelSource,
    NdRange,
};
use crate::combine::OutputLayout;
use crate::partition::ChunkDescriptor;
use crate::{Error, Result};
use parwork_kernels::cpu_derivative_x;
use tracing::trace;

/// Finite-difference d/dx of a grid, row-partitioned.
///
/// Columns are the x direction. Rows never depend on each other, so a chunk of rows is
/// computed without any halo from its neighbours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derivative {
    dx: f64,
}

/// A worker's private copy of its rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RowBlock {
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Derivative {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] unless `dx` is finite and positive.
    pub fn new(dx: f64) -> Result<Self> {
        if !(dx.is_finite() && dx > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "dx must be finite and positive, got {dx}"
            )));
        }
        Ok(Self { dx })
    }

    pub fn dx(&self) -> f64 {
        self.dx
    }

    fn rows(
        &self,
        data: &[f64],
        cols: usize,
        chunk: &ChunkDescriptor,
        out: &mut [f64],
    ) -> Result<()> {
        if data.len() != chunk.len * cols {
            return Err(Error::ShapeMismatch {
                expected: vec![chunk.len, cols],
                got: vec![data.len()],
            });
        }
        cpu_derivative_x(data, cols, self.dx, out)?;
        trace!(worker = chunk.owner, rows = chunk.len, "rows differentiated");
        Ok(())
    }
}

fn derivative_host(inv: &mut Invocation<'_>) -> Result<()> {
    let range = inv.range();
    let (args, output) = inv.split::<f64>(1)?;
    let input = args.slice::<f64>(0)?;
    let rows = args.u32(2)? as usize;
    let cols = args.u32(3)? as usize;
    let dx = args.f64(4)?;

    // Items past `rows` belong to the rounded-up tail of the range and do nothing.
    for row in 0..range.global[0].min(rows) {
        let span = row * cols..(row + 1) * cols;
        if span.end > input.len() || span.end > output.len() {
            return Err(Error::Device(format!("row {row} is outside the bound buffers")));
        }
        cpu_derivative_x(&input[span.clone()], cols, dx, &mut output[span])?;
    }
    Ok(())
}

impl Workload for Derivative {
    type Input = Matrix;
    type Elem = f64;
    type Shard = RowBlock;
    type Output = Matrix;

    fn name(&self) -> &'static str {
        "derivative"
    }

    fn units(&self, grid: &Matrix) -> Result<usize> {
        if grid.rows() > 0 && grid.cols() < 2 {
            return Err(Error::InvalidConfiguration(format!(
                "derivative needs at least 2 columns, grid is {}x{}",
                grid.rows(),
                grid.cols()
            )));
        }
        Ok(grid.rows())
    }

    fn layout(&self, grid: &Matrix) -> OutputLayout {
        OutputLayout::PerUnit { width: grid.cols() }
    }

    fn execute(&self, grid: &Matrix, chunk: &ChunkDescriptor, out: &mut [f64]) -> Result<()> {
        self.rows(grid.row_block(chunk.range()), grid.cols(), chunk, out)
    }

    fn shard(&self, grid: &Matrix, chunk: &ChunkDescriptor) -> RowBlock {
        RowBlock {
            cols: grid.cols(),
            data: grid.row_block(chunk.range()).to_vec(),
        }
    }

    fn execute_shard(
        &self,
        block: &RowBlock,
        chunk: &ChunkDescriptor,
        out: &mut [f64],
    ) -> Result<()> {
        self.rows(&block.data, block.cols, chunk, out)
    }

    fn finish(&self, grid: &Matrix, out: Vec<f64>) -> Result<Matrix> {
        Matrix::new(grid.rows(), grid.cols(), out)
    }
}

impl Offload for Derivative {
    fn kernel_source(&self) -> KernelSource {
        KernelSource {
            name: "derivative_x",
            entry: "main",
            wgsl: shaders::DERIVATIVE_X,
            workgroup_size: [64, 1],
            host: Some(derivative_host),
        }
    }

    fn offload<A: Accelerator>(
        &self,
        kernel: &mut Kernel<A>,
        _group_size: usize,
        grid: &Matrix,
    ) -> Result<Matrix> {
        let rows = self.units(grid)?;
        if rows == 0 {
            return Ok(Matrix::zeros(0, grid.cols()));
        }

        let device = kernel.device().clone();
        let input = DeviceBuffer::upload(&device, grid.data(), Access::ReadOnly)?;
        let output =
            DeviceBuffer::<f64, A>::zeroed(&device, grid.data().len(), Access::WriteOnly)?;

        kernel.launch(
            vec![
                input.arg(),
                output.arg(),
                KernelArg::U32(device_u32(rows, "grid rows")?),
                KernelArg::U32(device_u32(grid.cols(), "grid cols")?),
                KernelArg::F64(self.dx),
            ],
            NdRange::linear(rows, kernel.source().workgroup_size[0]),
        )?;

        Matrix::new(grid.rows(), grid.cols(), output.read()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_dx() {
        assert!(Derivative::new(0.0).is_err());
        assert!(Derivative::new(-0.1).is_err());
        assert!(Derivative::new(f64::NAN).is_err());
        assert!(Derivative::new(0.01).is_ok());
    }

    #[test]
    fn test_single_column_grid_rejected() {
        let d = Derivative::new(0.1).unwrap();
        let grid = Matrix::zeros(3, 1);
        assert!(matches!(d.units(&grid), Err(Error::InvalidConfiguration(_))));
        assert_eq!(d.units(&Matrix::zeros(0, 1)).unwrap(), 0);
    }

    #[test]
    fn test_execute_matches_shard() {
        let d = Derivative::new(0.5).unwrap();
        let grid = Matrix::from_fn(4, 3, |i, j| (i * j) as f64);
        let chunk = ChunkDescriptor::new(1, 2, 2);

        let mut direct = vec![0.0; 6];
        d.execute(&grid, &chunk, &mut direct).unwrap();

        let mut remote = vec![0.0; 6];
        d.execute_shard(&d.shard(&grid, &chunk), &chunk, &mut remote)
            .unwrap();

        assert_eq!(direct, remote);
        // Row 2 is 0, 2, 4: slope 2 per column, 4 per unit x.
        assert_eq!(&direct[..3], &[4.0, 4.0, 4.0]);
    }
}
