use crate::{KernelElem, KernelError, Result};

/// Single element of `C = A * B`: the dot product of one row of `A` with column `col` of `B`.
///
/// `b` is the full right-hand matrix in row-major order with `n` columns.
#[inline]
pub fn matmul_element<T: KernelElem>(a_row: &[T], b: &[T], n: usize, col: usize) -> T {
    let mut sum = T::zero();
    for (kk, &val_a) in a_row.iter().enumerate() {
        sum += val_a * b[kk * n + col];
    }
    sum
}

/// CPU Implementation of a row block of Matrix Multiplication.
///
/// Computes `rows` output rows of `C = A * B` where `a_rows` holds the matching `rows x k` slice
/// of `A` and `b` is the whole `k x n` right-hand side. This is the chunk executor every backend
/// runs: the block is whatever the partitioner assigned to one worker.
///
/// The loop is the plain triple loop on purpose so that timings across backends measure the
/// distribution strategy rather than the kernel.
pub fn cpu_matmul_rows<T>(
    a_rows: &[T],
    b: &[T],
    rows: usize,
    k: usize,
    n: usize,
    out: &mut [T],
) -> Result<()>
where
    T: KernelElem,
{
    if a_rows.len() != rows * k {
        return Err(KernelError::ShapeMismatch {
            expected: vec![rows, k],
            got: vec![a_rows.len()],
        });
    }
    if b.len() != k * n {
        return Err(KernelError::ShapeMismatch {
            expected: vec![k, n],
            got: vec![b.len()],
        });
    }
    if out.len() != rows * n {
        return Err(KernelError::ShapeMismatch {
            expected: vec![rows, n],
            got: vec![out.len()],
        });
    }
    if n == 0 {
        return Ok(());
    }

    for (i, out_row) in out.chunks_exact_mut(n).enumerate() {
        let a_row = &a_rows[i * k..(i + 1) * k];
        for (col, out_elem) in out_row.iter_mut().enumerate() {
            *out_elem = matmul_element(a_row, b, n, col);
        }
    }

    Ok(())
}

/// Sequential reference for a whole `[m, k] x [k, n]` product.
pub fn cpu_matmul<T>(
    lhs_data: &[T],
    rhs_data: &[T],
    lhs_shape: [usize; 2],
    rhs_shape: [usize; 2],
) -> Result<Vec<T>>
where
    T: KernelElem,
{
    let [m, k] = lhs_shape;
    let [rhs_k, n] = rhs_shape;

    if k != rhs_k {
        return Err(KernelError::ShapeMismatch {
            expected: vec![k],
            got: vec![rhs_k],
        });
    }

    let mut out_data = vec![T::zero(); m * n];
    cpu_matmul_rows(lhs_data, rhs_data, m, k, n, &mut out_data)?;
    Ok(out_data)
}
