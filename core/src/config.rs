//! Run configuration.
//!
//! Everything a demo binary needs to know comes from `PARWORK_*` environment variables. A
//! variable that is set but does not parse is an error, never a silent default.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `PARWORK_WORKERS` | threads / ranks | available parallelism |
//! | `PARWORK_BACKEND` | `threads`, `processes`, `device`, `gpu` | `threads` |
//! | `PARWORK_CHANNEL` | `rendezvous` or `buffered` | `buffered` |
//! | `PARWORK_GROUP_SIZE` | lanes per device work-group | 256 |
//! | `PARWORK_SEED` | input generator seed | 42 |
//! | `PARWORK_DX` | derivative step | 0.01 |
//! | `PARWORK_SIZES` | comma-separated sizes, replaces every sweep | per workload |
//! | `PARWORK_DEVICE_MEMORY_LIMIT` | byte cap for the host device | none |

use crate::transport::ChannelMode;
use crate::{Error, Result};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::thread;

/// Which backend [`AnyBackend`](crate::AnyBackend) builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Shared-memory rayon pool.
    #[default]
    Threads,
    /// Message passing between scoped ranks.
    Processes,
    /// The software accelerator.
    Device,
    /// A GPU through `wgpu` (requires the `gpu` feature).
    Gpu,
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "threads" | "openmp" | "shared" => Ok(BackendKind::Threads),
            "processes" | "mpi" | "message" => Ok(BackendKind::Processes),
            "device" | "host" | "opencl" => Ok(BackendKind::Device),
            "gpu" | "wgpu" => Ok(BackendKind::Gpu),
            other => Err(Error::InvalidConfiguration(format!(
                "unknown backend `{other}` (expected threads, processes, device or gpu)"
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Threads => "threads",
            BackendKind::Processes => "processes",
            BackendKind::Device => "device",
            BackendKind::Gpu => "gpu",
        };
        f.write_str(name)
    }
}

/// Problem sizes each demo iterates over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sweeps {
    pub hello: Vec<usize>,
    pub sum: Vec<usize>,
    pub derivative: Vec<usize>,
    pub matmul: Vec<usize>,
}

impl Default for Sweeps {
    fn default() -> Self {
        Self {
            hello: vec![4],
            sum: vec![10, 1_000, 10_000_000],
            derivative: vec![10, 100, 1_000, 10_000],
            matmul: vec![10, 100, 1_000, 2_000],
        }
    }
}

impl Sweeps {
    /// The same sizes for every workload.
    pub fn uniform(sizes: Vec<usize>) -> Self {
        Self {
            hello: sizes.clone(),
            sum: sizes.clone(),
            derivative: sizes.clone(),
            matmul: sizes,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub workers: usize,
    pub backend: BackendKind,
    pub channel_mode: ChannelMode,
    pub group_size: usize,
    pub seed: u64,
    pub dx: f64,
    pub device_memory_limit: Option<usize>,
    pub sweeps: Sweeps,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().map_or(1, |n| n.get()),
            backend: BackendKind::default(),
            channel_mode: ChannelMode::default(),
            group_size: 256,
            seed: 42,
            dx: 0.01,
            device_memory_limit: None,
            sweeps: Sweeps::default(),
        }
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e| {
        Error::InvalidConfiguration(format!("{key}={value:?} is not valid: {e}"))
    })
}

fn parse_sizes(key: &str, value: &str) -> Result<Vec<usize>> {
    let sizes = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse::<usize>(key, s))
        .collect::<Result<Vec<_>>>()?;
    if sizes.is_empty() {
        return Err(Error::InvalidConfiguration(format!(
            "{key} must list at least one size"
        )));
    }
    Ok(sizes)
}

impl RunConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_channel_mode(mut self, mode: ChannelMode) -> Self {
        self.channel_mode = mode;
        self
    }

    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_dx(mut self, dx: f64) -> Self {
        self.dx = dx;
        self
    }

    pub fn with_device_memory_limit(mut self, limit: Option<usize>) -> Self {
        self.device_memory_limit = limit;
        self
    }

    pub fn with_sweeps(mut self, sweeps: Sweeps) -> Self {
        self.sweeps = sweeps;
        self
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for zero workers, a group size that is not a
    /// power of two, or a `dx` that is not finite and positive.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidConfiguration(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.group_size == 0 || !self.group_size.is_power_of_two() {
            return Err(Error::InvalidConfiguration(format!(
                "group size must be a non-zero power of two, got {}",
                self.group_size
            )));
        }
        if !(self.dx.is_finite() && self.dx > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "dx must be finite and positive, got {}",
                self.dx
            )));
        }
        Ok(())
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from `lookup`, starting from the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup("PARWORK_WORKERS") {
            config.workers = parse("PARWORK_WORKERS", &v)?;
        }
        if let Some(v) = lookup("PARWORK_BACKEND") {
            config.backend = v.parse()?;
        }
        if let Some(v) = lookup("PARWORK_CHANNEL") {
            config.channel_mode = v.parse()?;
        }
        if let Some(v) = lookup("PARWORK_GROUP_SIZE") {
            config.group_size = parse("PARWORK_GROUP_SIZE", &v)?;
        }
        if let Some(v) = lookup("PARWORK_SEED") {
            config.seed = parse("PARWORK_SEED", &v)?;
        }
        if let Some(v) = lookup("PARWORK_DX") {
            config.dx = parse("PARWORK_DX", &v)?;
        }
        if let Some(v) = lookup("PARWORK_SIZES") {
            config.sweeps = Sweeps::uniform(parse_sizes("PARWORK_SIZES", &v)?);
        }
        if let Some(v) = lookup("PARWORK_DEVICE_MEMORY_LIMIT") {
            config.device_memory_limit = Some(parse("PARWORK_DEVICE_MEMORY_LIMIT", &v)?);
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = RunConfig::default();
        assert!(config.workers >= 1);
        assert_eq!(config.group_size, 256);
        assert_eq!(config.seed, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_names() {
        assert_eq!("MPI".parse::<BackendKind>().unwrap(), BackendKind::Processes);
        assert_eq!("device".parse::<BackendKind>().unwrap(), BackendKind::Device);
        assert_eq!(BackendKind::Gpu.to_string(), "gpu");
        assert!("fpga".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(RunConfig::default().with_workers(0).validate().is_err());
        assert!(RunConfig::default().with_group_size(48).validate().is_err());
        assert!(RunConfig::default().with_dx(0.0).validate().is_err());
    }
}
