//! Shared configuration for the plugin host.
//!
//! [`Config`] is layered by `ortho_config`: built-in defaults, a
//! `plughost.toml` file, `PLUGHOST_*` environment variables, and command-line
//! flags, in increasing order of precedence. Every field is optional; the
//! accessor methods resolve missing values against the constants in
//! [`defaults`].
//!
//! [`StorageLayout`] turns the configured base path into the concrete file
//! locations used for manifests, installed binaries, and persisted state.

mod defaults;
mod layout;
mod logging;

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_HEALTH_ATTEMPTS, DEFAULT_HEALTH_INTERVAL_MS,
    DEFAULT_LOG_FILTER, DEFAULT_RPC_TIMEOUT_SECS, default_base_path, default_log_format,
};
pub use layout::StorageLayout;
pub use logging::{LogFormat, LogFormatParseError};

/// Layered runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "PLUGHOST")]
pub struct Config {
    /// Root directory holding plugin manifests, binaries, and state files.
    pub base_path: Option<Utf8PathBuf>,
    /// `tracing` filter expression, e.g. `info,plughost_plugins=debug`.
    pub log_filter: Option<String>,
    /// Output format for structured logs.
    pub log_format: Option<LogFormat>,
    /// Number of health probes attempted after launching a plugin.
    pub health_attempts: Option<u32>,
    /// Pause between health probes, in milliseconds.
    pub health_interval_ms: Option<u64>,
    /// Timeout applied to each plugin RPC call, in seconds.
    pub rpc_timeout_secs: Option<u64>,
    /// Timeout applied to manifest and binary downloads, in seconds.
    pub fetch_timeout_secs: Option<u64>,
}

impl Config {
    /// Returns a configuration rooted at `base_path` with every other field
    /// left at its default.
    #[must_use]
    pub fn with_base_path(base_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            base_path: Some(base_path.into()),
            ..Self::default()
        }
    }

    /// Resolved storage root.
    #[must_use]
    pub fn base_path(&self) -> Utf8PathBuf {
        self.base_path.clone().unwrap_or_else(default_base_path)
    }

    /// Resolved log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Resolved log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_else(default_log_format)
    }

    /// Resolved number of health probes. Never zero.
    #[must_use]
    pub fn health_attempts(&self) -> u32 {
        self.health_attempts
            .unwrap_or(DEFAULT_HEALTH_ATTEMPTS)
            .max(1)
    }

    /// Resolved pause between health probes.
    #[must_use]
    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(
            self.health_interval_ms
                .unwrap_or(DEFAULT_HEALTH_INTERVAL_MS),
        )
    }

    /// Resolved RPC timeout.
    #[must_use]
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs.unwrap_or(DEFAULT_RPC_TIMEOUT_SECS))
    }

    /// Resolved download timeout.
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(
            self.fetch_timeout_secs
                .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
        )
    }

    /// Storage layout derived from the resolved base path.
    #[must_use]
    pub fn storage_layout(&self) -> StorageLayout {
        StorageLayout::new(self.base_path().into_std_path_buf())
    }
}
