//! Launching and stopping plugin executables.
//!
//! Plugins are long-running HTTP servers started as
//! `<binary> --name <plugin> --port <port>`. [`ProcessLauncher`] abstracts
//! spawning and signalling so lifecycle logic can be tested without real
//! child processes; [`SystemLauncher`] is the production implementation.

use std::io;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;

use tracing::debug;

use crate::error::PluginError;

const PROCESS_TARGET: &str = "plughost_plugins::process";

/// A spawned plugin process.
pub trait PluginProcess: Send {
    /// Operating-system process identifier.
    fn id(&self) -> u32;

    /// Blocks until the process exits and returns its exit code, or `None`
    /// when it was ended by a signal.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while waiting.
    fn wait(&mut self) -> io::Result<Option<i32>>;
}

/// Starts plugin processes and asks them to stop.
pub trait ProcessLauncher: Send + Sync {
    /// Spawns `binary` for the plugin `name` listening on `port`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::StartFailed`] if the process cannot be spawned.
    fn launch(
        &self,
        binary: &Path,
        name: &str,
        port: u16,
    ) -> Result<Box<dyn PluginProcess>, PluginError>;

    /// Sends a termination request to `pid`. A process that has already
    /// gone is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Io`] if the signal cannot be delivered.
    fn terminate(&self, pid: u32) -> Result<(), PluginError>;
}

/// Spawns real child processes and stops them with `SIGTERM`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

struct ChildProcess(Child);

impl PluginProcess for ChildProcess {
    fn id(&self) -> u32 {
        self.0.id()
    }

    fn wait(&mut self) -> io::Result<Option<i32>> {
        self.0.wait().map(|status| status.code())
    }
}

impl ProcessLauncher for SystemLauncher {
    fn launch(
        &self,
        binary: &Path,
        name: &str,
        port: u16,
    ) -> Result<Box<dyn PluginProcess>, PluginError> {
        debug!(
            target: PROCESS_TARGET,
            plugin = name,
            binary = %binary.display(),
            port,
            "spawning plugin process"
        );
        let child = Command::new(binary)
            .arg("--name")
            .arg(name)
            .arg("--port")
            .arg(port.to_string())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| PluginError::StartFailed {
                name: name.to_owned(),
                message: format!("failed to spawn {}", binary.display()),
                source: Some(Arc::new(source)),
            })?;
        Ok(Box::new(ChildProcess(child)))
    }

    fn terminate(&self, pid: u32) -> Result<(), PluginError> {
        debug!(target: PROCESS_TARGET, pid, "terminating plugin process");
        send_sigterm(pid)
    }
}

#[cfg(unix)]
fn send_sigterm(pid: u32) -> Result<(), PluginError> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .ok_or_else(|| invalid_pid(pid))?;
    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(PluginError::io(
            format!("/proc/{pid}"),
            io::Error::from(errno),
        )),
    }
}

#[cfg(not(unix))]
fn send_sigterm(pid: u32) -> Result<(), PluginError> {
    Err(PluginError::io(
        format!("pid {pid}"),
        io::Error::new(
            io::ErrorKind::Unsupported,
            "terminating plugin processes requires a unix host",
        ),
    ))
}

#[cfg(unix)]
fn invalid_pid(pid: u32) -> PluginError {
    PluginError::io(
        format!("/proc/{pid}"),
        io::Error::new(io::ErrorKind::InvalidInput, "refusing to signal pid"),
    )
}
