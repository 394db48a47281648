use approx::assert_relative_eq;
use parwork::harness::function_grid;
use parwork::{
    AnyBackend, ArraySum, Backend, BackendKind, ChannelMode, Derivative, Error, Hello, Matmul,
    MatmulInput, Matrix, RunConfig,
};

const WORKER_COUNTS: [usize; 6] = [1, 2, 3, 5, 10, 11];

fn backends(workers: usize) -> Vec<AnyBackend> {
    let base = RunConfig::default().with_workers(workers).with_group_size(4);
    vec![
        AnyBackend::from_config(&base.clone().with_backend(BackendKind::Threads)).unwrap(),
        AnyBackend::from_config(&base.clone().with_backend(BackendKind::Processes)).unwrap(),
        AnyBackend::from_config(
            &base
                .clone()
                .with_backend(BackendKind::Processes)
                .with_channel_mode(ChannelMode::Rendezvous),
        )
        .unwrap(),
        AnyBackend::from_config(&base.with_backend(BackendKind::Device)).unwrap(),
    ]
}

#[test]
fn test_hello_covers_every_item() {
    for workers in WORKER_COUNTS {
        for backend in backends(workers) {
            let ids = backend.run(&Hello, &4).unwrap();
            assert_eq!(ids, vec![0, 1, 2, 3], "{}", backend.name());
        }
    }
}

#[test]
fn test_sum_one_to_ten() {
    let input: Vec<i32> = (1..=10).collect();
    for workers in WORKER_COUNTS {
        for backend in backends(workers) {
            assert_eq!(
                backend.run(&ArraySum, &input).unwrap(),
                55,
                "{} with {workers} workers",
                backend.name()
            );
        }
    }
}

#[test]
fn test_sum_matches_sequential_for_every_worker_count() {
    let input: Vec<i32> = (0..37).map(|i| (i * 7) % 10).collect();
    let expected: i64 = input.iter().map(|&v| i64::from(v)).sum();
    for workers in 1..=input.len() {
        for backend in backends(workers) {
            assert_eq!(backend.run(&ArraySum, &input).unwrap(), expected);
        }
    }
}

#[test]
fn test_empty_inputs() {
    for backend in backends(3) {
        assert_eq!(backend.run(&ArraySum, &Vec::new()).unwrap(), 0);
        assert!(backend.run(&Hello, &0).unwrap().is_empty());
    }
}

#[test]
fn test_derivative_of_constant_rows_is_zero() {
    let grid = Matrix::from_fn(7, 5, |i, _| i as f64 * 1.5 - 2.0);
    let derivative = Derivative::new(0.01).unwrap();
    for workers in WORKER_COUNTS {
        for backend in backends(workers) {
            let out = backend.run(&derivative, &grid).unwrap();
            assert_eq!(out.shape(), [7, 5]);
            assert!(out.data().iter().all(|&v| v == 0.0), "{}", backend.name());
        }
    }
}

#[test]
fn test_derivative_formula_on_small_grid() {
    let dx = 0.01;
    let grid = function_grid(4, dx);
    let derivative = Derivative::new(dx).unwrap();

    for backend in backends(2) {
        let out = backend.run(&derivative, &grid).unwrap();
        for i in 1..3 {
            let row = grid.row(i);
            assert_eq!(out.get(i, 0), Some((row[1] - row[0]) / dx));
            assert_eq!(out.get(i, 3), Some((row[3] - row[2]) / dx));
        }

        // x * (cos(y + dx) - cos(y - dx)) / (2 dx) at x = i dx, y = j dx.
        let interior = [
            ((1, 1), -9.999666671112184e-5),
            ((1, 2), -1.9998333383886013e-4),
            ((2, 1), -1.9999333342224368e-4),
            ((2, 2), -3.9996666767772027e-4),
        ];
        for ((i, j), expected) in interior {
            let got = out.get(i, j).unwrap();
            assert_relative_eq!(got, expected, max_relative = 1e-9);
        }
    }
}

#[test]
fn test_derivative_approximates_analytic_slope() {
    // The grid's second coordinate runs along columns, so the columnwise slope of
    // x * (sin x + cos y) is -x sin y.
    let dx = 0.01;
    let grid = function_grid(32, dx);
    let derivative = Derivative::new(dx).unwrap();
    let out = backends(3)[0].run(&derivative, &grid).unwrap();

    for (i, j) in [(10, 16), (31, 1), (5, 30)] {
        let x = i as f64 * dx;
        let y = j as f64 * dx;
        assert_relative_eq!(out.get(i, j).unwrap(), -x * y.sin(), epsilon = 1e-4);
    }
}

#[test]
fn test_narrow_grid_rejected() {
    let grid = Matrix::zeros(3, 1);
    let derivative = Derivative::new(0.1).unwrap();
    for backend in backends(2) {
        assert!(matches!(
            backend.run(&derivative, &grid),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}

#[test]
fn test_matmul_identity() {
    let a = Matrix::from_fn(9, 9, |i, j| (i * 9 + j) as f64);
    for workers in WORKER_COUNTS {
        for backend in backends(workers) {
            let input = MatmulInput::new(a.clone(), Matrix::identity(9)).unwrap();
            assert_eq!(backend.run(&Matmul, &input).unwrap(), a, "{}", backend.name());
        }
    }
}

#[test]
fn test_matmul_rectangular() {
    let a = Matrix::new(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    let b = Matrix::new(3, 2, vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0]).unwrap();
    let expected = Matrix::new(2, 2, vec![58.0, 64.0, 139.0, 154.0]).unwrap();
    for backend in backends(3) {
        let input = MatmulInput::new(a.clone(), b.clone()).unwrap();
        assert_eq!(backend.run(&Matmul, &input).unwrap(), expected);
    }
}

#[test]
fn test_matmul_inner_dimension_checked() {
    let a = Matrix::zeros(2, 3);
    let b = Matrix::zeros(2, 2);
    assert!(matches!(
        MatmulInput::new(a, b),
        Err(Error::ShapeMismatch { .. })
    ));
}
