//! Square matrix products with `B` broadcast to every worker.

use std::process::ExitCode;

fn main() -> ExitCode {
    parwork_demos::main_with("matmul", |sweep| sweep.matmul())
}
