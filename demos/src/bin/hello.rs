//! Every worker greets with its index and the worker count.

use std::process::ExitCode;

fn main() -> ExitCode {
    parwork_demos::main_with("hello", |sweep| sweep.hello())
}
