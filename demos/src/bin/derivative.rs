//! Column-wise finite differences of `x * (sin x + cos y)` sampled on square grids.

use std::process::ExitCode;

fn main() -> ExitCode {
    parwork_demos::main_with("derivative", |sweep| sweep.derivative())
}
