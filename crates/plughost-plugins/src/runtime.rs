//! Collaborators shared by every plugin instance.

use std::sync::Arc;
use std::time::Duration;

use plughost_config::{Config, DEFAULT_HEALTH_ATTEMPTS, DEFAULT_HEALTH_INTERVAL_MS};

use crate::cancel::CancelToken;
use crate::error::PluginError;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::process::{ProcessLauncher, SystemLauncher};
use crate::transport::{HttpTransport, RpcTransport};

/// How long a freshly launched plugin gets to answer its health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    attempts: u32,
    interval: Duration,
}

impl HealthPolicy {
    /// Probes up to `attempts` times (at least once), pausing `interval`
    /// between probes.
    #[must_use]
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            interval,
        }
    }

    /// Maximum number of probes.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Pause between probes.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_HEALTH_ATTEMPTS,
            Duration::from_millis(DEFAULT_HEALTH_INTERVAL_MS),
        )
    }
}

/// Fetching, launching, and RPC services used by plugin instances.
///
/// Cloning is cheap; clones share the same services and cancel token.
#[derive(Clone)]
pub struct PluginRuntime {
    fetcher: Arc<dyn Fetcher>,
    transport: Arc<dyn RpcTransport>,
    launcher: Arc<dyn ProcessLauncher>,
    health: HealthPolicy,
    cancel: CancelToken,
}

impl PluginRuntime {
    /// Assembles a runtime from explicit collaborators.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        transport: Arc<dyn RpcTransport>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        Self {
            fetcher,
            transport,
            launcher,
            health: HealthPolicy::default(),
            cancel: CancelToken::new(),
        }
    }

    /// Builds the production runtime: HTTP fetch and RPC, real child
    /// processes, and the configured health policy.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] if an HTTP client cannot be initialised.
    pub fn system(config: &Config) -> Result<Self, PluginError> {
        let fetcher = HttpFetcher::new(config.fetch_timeout())?;
        let transport = HttpTransport::new(config.rpc_timeout())?;
        Ok(
            Self::new(Arc::new(fetcher), Arc::new(transport), Arc::new(SystemLauncher))
                .with_health_policy(HealthPolicy::new(
                    config.health_attempts(),
                    config.health_interval(),
                )),
        )
    }

    /// Replaces the health policy.
    #[must_use]
    pub const fn with_health_policy(mut self, health: HealthPolicy) -> Self {
        self.health = health;
        self
    }

    /// Manifest and binary fetcher.
    #[must_use]
    pub fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    /// RPC transport.
    #[must_use]
    pub fn transport(&self) -> &dyn RpcTransport {
        self.transport.as_ref()
    }

    /// Process launcher.
    #[must_use]
    pub fn launcher(&self) -> &dyn ProcessLauncher {
        self.launcher.as_ref()
    }

    /// Active health policy.
    #[must_use]
    pub const fn health(&self) -> HealthPolicy {
        self.health
    }

    /// Token that interrupts health polling.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}

impl std::fmt::Debug for PluginRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRuntime")
            .field("health", &self.health)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
