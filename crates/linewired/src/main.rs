//! `linewired` entry point: runs the daemon and maps failures to an exit status.

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match linewired::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if let Some(config_error) = error.config_error() {
                config_error.exit();
            }
            let _ = writeln!(io::stderr().lock(), "linewired: {error}");
            ExitCode::FAILURE
        }
    }
}
