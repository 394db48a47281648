use parwork::partition::partition;
use parwork::{Error, Partition};

fn lens(size: usize, workers: usize) -> Vec<usize> {
    partition(size, workers)
        .unwrap()
        .iter()
        .map(|c| c.len)
        .collect()
}

#[test]
fn test_ten_over_three() {
    assert_eq!(lens(10, 3), vec![4, 3, 3]);
    let offsets: Vec<usize> = partition(10, 3).unwrap().iter().map(|c| c.offset).collect();
    assert_eq!(offsets, vec![0, 4, 7]);
}

#[test]
fn test_chunks_tile_the_range() {
    for size in [0, 1, 2, 7, 10, 64, 1001] {
        for workers in 1..=12 {
            let chunks = partition(size, workers).unwrap();
            assert_eq!(chunks.len(), workers);

            let mut next = 0;
            for (rank, chunk) in chunks.iter().enumerate() {
                assert_eq!(chunk.owner, rank);
                assert_eq!(chunk.offset, next, "size {size}, workers {workers}");
                next = chunk.end();
            }
            assert_eq!(next, size);
        }
    }
}

#[test]
fn test_remainder_goes_to_leading_chunks() {
    let size = 23;
    let workers = 5;
    let got = lens(size, workers);
    let big = size.div_ceil(workers);
    let small = size / workers;
    for (rank, len) in got.iter().enumerate() {
        let expected = if rank < size % workers { big } else { small };
        assert_eq!(*len, expected);
    }
}

#[test]
fn test_more_workers_than_units() {
    assert_eq!(lens(3, 5), vec![1, 1, 1, 0, 0]);
    let chunks = partition(3, 5).unwrap();
    assert!(chunks[4].is_empty());
    assert_eq!(chunks[4].range(), 3..3);
}

#[test]
fn test_zero_workers_rejected() {
    assert!(matches!(
        partition(10, 0),
        Err(Error::InvalidConfiguration(_))
    ));
    assert!(Partition::new(10, 0).is_err());
}

#[test]
fn test_partition_iterates_in_rank_order() {
    let p = Partition::new(9, 4).unwrap();
    assert_eq!(p.problem_size(), 9);
    assert_eq!(p.workers(), 4);
    assert_eq!(p.len(), 4);
    assert!(!p.is_empty());
    assert!(Partition::new(0, 3).unwrap().is_empty());
    let owners: Vec<usize> = (&p).into_iter().map(|c| c.owner).collect();
    assert_eq!(owners, vec![0, 1, 2, 3]);
}
