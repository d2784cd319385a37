//! Supervisor daemon for the plugin host.
//!
//! `plughostd` wires the plugin manager and the config binding store into a
//! single [`Host`], restores whatever was enabled before the last exit, and
//! keeps the plugins running until a termination signal arrives. It exposes
//! no command surface of its own; embedders drive the [`Host`] directly.
//!
//! Startup runs in a fixed order: configuration is loaded, telemetry is
//! installed, the plugin runtime is built, and stored plugins and configs
//! are restored. Any failure aborts startup with a [`BootstrapError`].

mod bootstrap;
mod host;
mod launch;
mod shutdown;
mod telemetry;

pub use bootstrap::{
    BootstrapError, ConfigLoader, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use host::{Host, HostError};
pub use launch::{LaunchError, run, run_with};
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};

#[cfg(test)]
mod tests;
