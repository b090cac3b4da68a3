//! Loquat relay server binary.
//! Run with: cargo run --bin loquat-server

use std::process::ExitCode;

use loquat::start_loquat;

fn main() -> ExitCode {
    start_loquat::run_server()
}
