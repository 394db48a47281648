//! Input generation, timing and reporting for size sweeps.
//!
//! Inputs come from a [`StdRng`] seeded with [`RunConfig::seed`], so two runs with the same
//! configuration see identical data. Timing covers only the backend run; generating the input
//! is outside the measured interval.

use crate::backend::Backend;
use crate::config::RunConfig;
use crate::workload::{ArraySum, Derivative, Hello, Matmul, MatmulInput, Matrix};
use crate::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::info;

/// `x * (sin x + cos y)`.
pub fn compute_function(x: f64, y: f64) -> f64 {
    x * (x.sin() + y.cos())
}

/// An `n x n` grid with `grid[i][j] = compute_function(i * dx, j * dx)`.
pub fn function_grid(n: usize, dx: f64) -> Matrix {
    Matrix::from_fn(n, n, |i, j| compute_function(i as f64 * dx, j as f64 * dx))
}

/// `n` integers drawn uniformly from `0..10`.
pub fn random_array(n: usize, rng: &mut StdRng) -> Vec<i32> {
    (0..n).map(|_| rng.random_range(0..10)).collect()
}

/// Whole numbers in `0..10` stored as `f64`, so products stay exact.
pub fn random_matrix(rows: usize, cols: usize, rng: &mut StdRng) -> Matrix {
    Matrix::from_fn(rows, cols, |_, _| f64::from(rng.random_range(0..10u8)))
}

/// What a sweep iteration produced, beyond its timing.
#[derive(Debug, Clone, PartialEq)]
pub enum Summary {
    /// Number of items that reported their identifier.
    Greeted(usize),
    Sum(i64),
    Grid,
    Matrix,
}

/// One line of sweep output.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub workload: &'static str,
    pub backend: String,
    pub workers: usize,
    pub size: usize,
    pub summary: Summary,
    pub elapsed: Duration,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.elapsed.as_secs_f64();
        match &self.summary {
            Summary::Greeted(count) => write!(
                f,
                "Hello items: {count}, Workers: {}, Time: {secs:.6} s",
                self.workers
            ),
            Summary::Sum(total) => write!(
                f,
                "Array size: {}, Total sum: {total}, Time: {secs:.6} s",
                self.size
            ),
            Summary::Grid => write!(f, "Grid size: {0}x{0}, Time: {secs:.6} s", self.size),
            Summary::Matrix => write!(f, "Matrix size: {0}x{0}, Time: {secs:.6} s", self.size),
        }
    }
}

/// Runs each workload over its configured sizes on one backend.
pub struct Sweep<'a, B: Backend> {
    backend: &'a B,
    config: &'a RunConfig,
}

impl<'a, B: Backend> Sweep<'a, B> {
    pub fn new(backend: &'a B, config: &'a RunConfig) -> Self {
        Self { backend, config }
    }

    fn report(
        &self,
        workload: &'static str,
        size: usize,
        summary: Summary,
        started: Instant,
    ) -> Report {
        let report = Report {
            workload,
            backend: self.backend.name(),
            workers: self.backend.workers(),
            size,
            summary,
            elapsed: started.elapsed(),
        };
        info!(
            workload,
            backend = %report.backend,
            workers = report.workers,
            size,
            elapsed_ms = report.elapsed.as_secs_f64() * 1e3,
            "iteration done"
        );
        report
    }

    pub fn hello(&self) -> Result<Vec<Report>> {
        let mut reports = Vec::with_capacity(self.config.sweeps.hello.len());
        for &n in &self.config.sweeps.hello {
            let started = Instant::now();
            let ids = self.backend.run(&Hello, &n)?;
            reports.push(self.report("hello", n, Summary::Greeted(ids.len()), started));
        }
        Ok(reports)
    }

    pub fn array_sum(&self) -> Result<Vec<Report>> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut reports = Vec::with_capacity(self.config.sweeps.sum.len());
        for &n in &self.config.sweeps.sum {
            let input = random_array(n, &mut rng);
            let started = Instant::now();
            let total = self.backend.run(&ArraySum, &input)?;
            reports.push(self.report("sum", n, Summary::Sum(total), started));
        }
        Ok(reports)
    }

    pub fn derivative(&self) -> Result<Vec<Report>> {
        let workload = Derivative::new(self.config.dx)?;
        let mut reports = Vec::with_capacity(self.config.sweeps.derivative.len());
        for &n in &self.config.sweeps.derivative {
            let grid = function_grid(n, self.config.dx);
            let started = Instant::now();
            self.backend.run(&workload, &grid)?;
            reports.push(self.report("derivative", n, Summary::Grid, started));
        }
        Ok(reports)
    }

    pub fn matmul(&self) -> Result<Vec<Report>> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut reports = Vec::with_capacity(self.config.sweeps.matmul.len());
        for &n in &self.config.sweeps.matmul {
            let a = random_matrix(n, n, &mut rng);
            let b = random_matrix(n, n, &mut rng);
            let input = MatmulInput::new(a, b)?;
            let started = Instant::now();
            self.backend.run(&Matmul, &input)?;
            reports.push(self.report("matmul", n, Summary::Matrix, started));
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Sweeps;
    use crate::transport::SharedMemory;

    #[test]
    fn test_function_grid_values() {
        let grid = function_grid(3, 0.5);
        assert_eq!(grid.get(0, 2), Some(0.0));
        let expected = 1.0f64.sin() + 0.5f64.cos();
        assert_eq!(grid.get(2, 1), Some(expected));
    }

    #[test]
    fn test_random_inputs_are_seeded() {
        let a = random_array(100, &mut StdRng::seed_from_u64(7));
        let b = random_array(100, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert!(a.iter().all(|v| (0..10).contains(v)));

        let m = random_matrix(4, 5, &mut StdRng::seed_from_u64(7));
        assert_eq!(m.shape(), [4, 5]);
        assert!(m.data().iter().all(|v| v.fract() == 0.0 && (0.0..10.0).contains(v)));
    }

    #[test]
    fn test_report_lines() {
        let report = Report {
            workload: "sum",
            backend: "threads".to_string(),
            workers: 2,
            size: 10,
            summary: Summary::Sum(45),
            elapsed: Duration::from_millis(1500),
        };
        assert_eq!(report.to_string(), "Array size: 10, Total sum: 45, Time: 1.500000 s");

        let grid = Report {
            summary: Summary::Grid,
            ..report.clone()
        };
        assert_eq!(grid.to_string(), "Grid size: 10x10, Time: 1.500000 s");

        let matrix = Report {
            summary: Summary::Matrix,
            ..report
        };
        assert!(matrix.to_string().starts_with("Matrix size: 10x10, Time: "));
    }

    #[test]
    fn test_sweep_runs_every_size() {
        let config = RunConfig::default()
            .with_workers(3)
            .with_sweeps(Sweeps::uniform(vec![0, 2, 7]));
        let backend = SharedMemory::new(config.workers).unwrap();
        let sweep = Sweep::new(&backend, &config);

        let sums = sweep.array_sum().unwrap();
        assert_eq!(sums.iter().map(|r| r.size).collect::<Vec<_>>(), vec![0, 2, 7]);
        assert_eq!(sums[0].summary, Summary::Sum(0));

        assert_eq!(sweep.hello().unwrap()[2].summary, Summary::Greeted(7));
        assert_eq!(sweep.derivative().unwrap().len(), 3);
        assert_eq!(sweep.matmul().unwrap().len(), 3);
    }
}
