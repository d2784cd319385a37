//! Startup sequence: configuration, telemetry, and the loaded [`Host`].

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use plughost_config::Config;
use plughost_plugins::{PluginError, PluginRuntime};
use thiserror::Error;
use tracing::info;

use crate::host::{Host, HostError};
use crate::telemetry::{self, TelemetryError};

const BOOTSTRAP_TARGET: &str = "plughostd::bootstrap";

/// Source of the daemon configuration.
pub trait ConfigLoader: Send + Sync {
    /// Loads the configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader's error if any configuration layer is invalid.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loads defaults, `plughost.toml`, `PLUGHOST_*` variables, and flags.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Hands out a configuration resolved elsewhere.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Failures before the host is ready.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry could not be installed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The plugin runtime could not be built.
    #[error("failed to build plugin runtime: {source}")]
    Runtime {
        /// Runtime construction error.
        #[source]
        source: PluginError,
    },
    /// Stored plugins or configs could not be restored.
    #[error("failed to restore host state: {source}")]
    Restore {
        /// Host error raised while loading.
        #[source]
        source: HostError,
    },
}

/// Loads configuration, installs telemetry, and returns a loaded host backed
/// by the system runtime.
///
/// # Errors
///
/// Returns [`BootstrapError`] naming the step that failed.
pub fn bootstrap_with(loader: &dyn ConfigLoader) -> Result<Host, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    info!(
        target: BOOTSTRAP_TARGET,
        base_path = %config.base_path(),
        "configuration loaded"
    );
    let runtime =
        PluginRuntime::system(&config).map_err(|source| BootstrapError::Runtime { source })?;
    let mut host = Host::new(config.storage_layout(), runtime);
    host.load()
        .map_err(|source| BootstrapError::Restore { source })?;
    info!(target: BOOTSTRAP_TARGET, "host ready");
    Ok(host)
}
