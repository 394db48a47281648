//! Shared entry point for the sweep binaries.
//!
//! Every binary reads [`RunConfig`] from `PARWORK_*` variables, builds the selected backend,
//! runs one workload over its size list and prints one report line per size on stdout.
//! Diagnostics go to stderr.

use parwork::logging::{self, LogConfig};
use parwork::{AnyBackend, Backend, Report, Result, RunConfig, Sweep};
use std::process::ExitCode;
use tracing::{error, info};

/// One of the [`Sweep`] methods.
pub type SweepFn = fn(&Sweep<'_, AnyBackend>) -> Result<Vec<Report>>;

/// Runs `sweep` with the environment's configuration and maps the outcome to an exit code.
pub fn main_with(demo: &str, sweep: SweepFn) -> ExitCode {
    if let Err(e) = logging::init(&LogConfig::from_env()) {
        eprintln!("{demo}: {e}");
        return ExitCode::FAILURE;
    }

    match run(demo, sweep) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(demo, error = %e, "sweep failed");
            eprintln!("{demo}: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(demo: &str, sweep: SweepFn) -> Result<()> {
    let config = RunConfig::from_env()?;
    let backend = AnyBackend::from_config(&config)?;
    info!(
        demo,
        backend = %backend.name(),
        workers = backend.workers(),
        "starting sweep"
    );

    for report in sweep(&Sweep::new(&backend, &config))? {
        println!("{report}");
    }
    Ok(())
}
