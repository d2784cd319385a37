//! Daemon run loop: bootstrap, wait for a signal, stop every plugin.

use thiserror::Error;
use tracing::info;

use crate::bootstrap::{BootstrapError, ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::host::HostError;
use crate::shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};

const LAUNCH_TARGET: &str = "plughostd::launch";

/// Failures of a daemon run.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Startup failed.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// The shutdown listener failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
    /// Plugins could not all be stopped.
    #[error("failed to stop plugins: {0}")]
    Stop(#[from] HostError),
}

/// Runs the daemon with the system configuration and signal handlers.
///
/// # Errors
///
/// Returns [`LaunchError`] if startup, signal handling, or shutdown fails.
pub fn run() -> Result<(), LaunchError> {
    run_with(&SystemConfigLoader, &SystemShutdownSignal)
}

/// Runs the daemon with injected collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] if startup, signal handling, or shutdown fails.
pub fn run_with(
    loader: &dyn ConfigLoader,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    let mut host = bootstrap_with(loader)?;
    info!(
        target: LAUNCH_TARGET,
        plugins = host.manager().list_plugins().count(),
        enabled = host.manager().list_instances().count(),
        configs = host.binding().list_config(None).len(),
        "daemon running"
    );
    let waited = shutdown.wait();
    host.shutdown()?;
    waited?;
    info!(target: LAUNCH_TARGET, "shutdown sequence completed");
    Ok(())
}
