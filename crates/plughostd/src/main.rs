//! Entry point for the plugin host daemon.

use std::process::ExitCode;

#[expect(
    clippy::print_stderr,
    reason = "startup errors can occur before telemetry is installed"
)]
fn main() -> ExitCode {
    match plughostd::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("plughostd: {error}");
            ExitCode::FAILURE
        }
    }
}
