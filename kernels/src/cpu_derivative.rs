use crate::{KernelElem, KernelError, Result};
use num_traits::Float;

/// Finite-difference derivative along the columns of a block of rows.
///
/// `input` and `out` hold `rows * cols` elements in row-major order. For every row:
///
/// - column `0` uses the forward difference `(a[1] - a[0]) / dx`,
/// - column `cols - 1` uses the backward difference `(a[last] - a[last - 1]) / dx`,
/// - every other column uses the central difference `(a[j + 1] - a[j - 1]) / (2 * dx)`.
///
/// Rows are independent, so a block never needs data from a neighbouring block.
/// An empty block is a no-op.
pub fn cpu_derivative_x<T>(input: &[T], cols: usize, dx: T, out: &mut [T]) -> Result<()>
where
    T: KernelElem + Float,
{
    if input.len() != out.len() {
        return Err(KernelError::ShapeMismatch {
            expected: vec![input.len()],
            got: vec![out.len()],
        });
    }
    if input.is_empty() {
        return Ok(());
    }
    if cols < 2 || input.len() % cols != 0 {
        return Err(KernelError::ShapeMismatch {
            expected: vec![input.len() / cols.max(1), cols.max(2)],
            got: vec![input.len(), cols],
        });
    }

    let two_dx = (T::one() + T::one()) * dx;
    let last = cols - 1;

    for (row, out_row) in input.chunks_exact(cols).zip(out.chunks_exact_mut(cols)) {
        out_row[0] = (row[1] - row[0]) / dx;
        for j in 1..last {
            out_row[j] = (row[j + 1] - row[j - 1]) / two_dx;
        }
        out_row[last] = (row[last] - row[last - 1]) / dx;
    }

    Ok(())
}
