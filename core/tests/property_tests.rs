use parwork::partition::partition;
use parwork::transport::drive;
use parwork::{
    AcceleratorBackend, ArraySum, Backend, Derivative, HostDevice, Matmul, MatmulInput, Matrix,
    MessagePassing, SharedMemory,
};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn partition_is_exact_cover(size in 0usize..5000, workers in 1usize..64) {
        let chunks = partition(size, workers).unwrap();
        prop_assert_eq!(chunks.len(), workers);

        let total: usize = chunks.iter().map(|c| c.len).sum();
        prop_assert_eq!(total, size);

        let mut offset = 0;
        for chunk in &chunks {
            prop_assert_eq!(chunk.offset, offset);
            offset += chunk.len;
        }

        let longest = chunks.iter().map(|c| c.len).max().unwrap_or(0);
        let shortest = chunks.iter().map(|c| c.len).min().unwrap_or(0);
        prop_assert!(longest - shortest <= 1);
        prop_assert_eq!(longest, size.div_ceil(workers));
    }

    #[test]
    fn sum_matches_sequential(
        data in prop::collection::vec(0i32..10, 0..400),
        workers in 1usize..12,
    ) {
        let expected: i64 = data.iter().map(|&v| i64::from(v)).sum();
        prop_assert_eq!(drive(&SharedMemory::new(workers).unwrap(), &ArraySum, &data).unwrap(), expected);
        prop_assert_eq!(drive(&MessagePassing::new(workers).unwrap(), &ArraySum, &data).unwrap(), expected);

        let device = AcceleratorBackend::new(HostDevice::new(), 16).unwrap();
        prop_assert_eq!(device.run(&ArraySum, &data).unwrap(), expected);
    }

    #[test]
    fn derivative_of_constant_is_zero(
        value in -1e6f64..1e6,
        rows in 0usize..20,
        cols in 2usize..20,
        dx in 1e-4f64..10.0,
        workers in 1usize..8,
    ) {
        let grid = Matrix::from_fn(rows, cols, |_, _| value);
        let out = drive(&SharedMemory::new(workers).unwrap(), &Derivative::new(dx).unwrap(), &grid).unwrap();
        prop_assert!(out.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn matmul_by_identity(
        rows in 0usize..12,
        cols in 1usize..12,
        seed in any::<u64>(),
        workers in 1usize..8,
    ) {
        let a = Matrix::from_fn(rows, cols, |i, j| ((seed >> ((i + j) % 32)) % 10) as f64);
        let input = MatmulInput::new(a.clone(), Matrix::identity(cols)).unwrap();
        prop_assert_eq!(drive(&MessagePassing::new(workers).unwrap(), &Matmul, &input).unwrap(), a);
    }
}
