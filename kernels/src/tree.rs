//! Work-group tree reduction.
//!
//! Models what a device reduction kernel does with its local memory: each lane first
//! accumulates a grid-stride slice of the input, then the group halves the active lanes at every
//! step until lane 0 holds the group's partial. The host combines the per-group partials.

use crate::{KernelElem, KernelError, Result};

/// Number of work-groups needed to cover `n` items, rounded up.
pub fn groups_for(n: usize, group_size: usize) -> usize {
    if group_size == 0 {
        return 0;
    }
    n.div_ceil(group_size)
}

fn check_group_size(group_size: usize) -> Result<()> {
    if group_size == 0 || !group_size.is_power_of_two() {
        return Err(KernelError::InvalidGroupSize(group_size));
    }
    Ok(())
}

/// Reduces `lanes` in place with halving strides and returns lane 0.
///
/// The lane count must be a non-zero power of two, matching a local work size.
pub fn tree_reduce<T: KernelElem>(lanes: &mut [T]) -> Result<T> {
    check_group_size(lanes.len())?;

    let mut stride = lanes.len() / 2;
    while stride > 0 {
        let (low, high) = lanes.split_at_mut(stride);
        for (dst, &src) in low.iter_mut().zip(high[..stride].iter()) {
            *dst += src;
        }
        stride /= 2;
    }

    Ok(lanes[0])
}

/// Partial sum produced by work-group `group`, accumulated in `A`.
///
/// Lane `l` of the group has global id `group * group_size + l` and accumulates every element
/// at `gid, gid + global_size, gid + 2 * global_size, ...`. Lanes past the end contribute zero.
/// As with [`cpu_sum`](crate::cpu_sum), `A` may be wider than `T`.
pub fn group_partial<T, A>(
    data: &[T],
    group: usize,
    group_size: usize,
    global_size: usize,
) -> Result<A>
where
    T: KernelElem,
    A: KernelElem + From<T>,
{
    check_group_size(group_size)?;

    let mut lanes = vec![A::zero(); group_size];
    let stride = global_size.max(1);
    for (l, lane) in lanes.iter_mut().enumerate() {
        let mut idx = group * group_size + l;
        while idx < data.len() {
            *lane += A::from(data[idx]);
            idx += stride;
        }
    }

    tree_reduce(&mut lanes)
}

/// Runs `groups` work-groups of `group_size` lanes over `data` and returns one partial per
/// group. Summing the partials gives the total.
pub fn group_reduce<T, A>(data: &[T], group_size: usize, groups: usize) -> Result<Vec<A>>
where
    T: KernelElem,
    A: KernelElem + From<T>,
{
    check_group_size(group_size)?;

    let global_size = groups * group_size;
    (0..groups)
        .map(|g| group_partial(data, g, group_size, global_size))
        .collect()
}
