//! Bakery CLI - declarative Docker image building

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = bakery_cli::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
