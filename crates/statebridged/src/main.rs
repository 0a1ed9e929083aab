//! Entry point for the statebridge daemon.

use std::io::{self, Write};
use std::process::ExitCode;

use statebridged::{SystemConfigLoader, run};

fn main() -> ExitCode {
    match run(&SystemConfigLoader) {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            let mut stderr = io::stderr().lock();
            if writeln!(stderr, "statebridged: {error}").is_err() {
                return ExitCode::from(2);
            }
            ExitCode::FAILURE
        }
    }
}
