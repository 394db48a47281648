use crate::KernelElem;

/// Sums a chunk of elements into a wider accumulator.
///
/// The accumulator type is chosen by the caller so that `i32` inputs can be reduced into an
/// `i64` without overflow. An empty chunk yields zero, which is what a worker holding a
/// zero-length chunk must report.
pub fn cpu_sum<T, A>(data: &[T]) -> A
where
    T: KernelElem,
    A: KernelElem + From<T>,
{
    data.iter().fold(A::zero(), |mut acc, &val| {
        acc += A::from(val);
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_simple() {
        let data: Vec<i32> = (1..=10).collect();
        let total: i64 = cpu_sum(&data);
        assert_eq!(total, 55);
    }

    #[test]
    fn test_sum_empty_is_zero() {
        let total: i64 = cpu_sum::<i32, i64>(&[]);
        assert_eq!(total, 0);
    }

    #[test]
    fn test_sum_widens_past_i32() {
        let data = vec![i32::MAX; 4];
        let total: i64 = cpu_sum(&data);
        assert_eq!(total, 4 * i32::MAX as i64);
    }
}
