//! Sums seeded random arrays of increasing size.

use std::process::ExitCode;

fn main() -> ExitCode {
    parwork_demos::main_with("array_sum", |sweep| sweep.array_sum())
}
