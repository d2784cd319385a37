//! Domain errors raised by plugin operations.
//!
//! All errors use `thiserror`-derived enums with structured context so callers
//! can inspect the failure programmatically. I/O errors are wrapped in `Arc`
//! to satisfy the `result_large_err` Clippy lint.

use std::path::PathBuf;
use std::sync::Arc;

use plughost_store::StoreError;
use thiserror::Error;

/// Errors arising from plugin lifecycle and RPC operations.
#[derive(Debug, Error)]
pub enum PluginError {
    /// No definition with this name is registered.
    #[error("plugin '{name}' not found")]
    NotFound {
        /// Name that was looked up.
        name: String,
    },

    /// A definition with this name is already registered.
    #[error("plugin '{name}' is already registered")]
    AlreadyRegistered {
        /// Conflicting plugin name.
        name: String,
    },

    /// The plugin cannot be unregistered while configs reference it.
    #[error("plugin '{name}' is used by {}, remove those configs first", .configs.join(", "))]
    InUse {
        /// Plugin name.
        name: String,
        /// Configs that still reference the plugin.
        configs: Vec<String>,
    },

    /// The operation needs a running plugin instance.
    #[error("plugin '{name}' is not enabled")]
    NotEnabled {
        /// Plugin name.
        name: String,
    },

    /// Installing, launching, or health-checking the plugin failed.
    #[error("plugin '{name}' failed to start: {message}")]
    StartFailed {
        /// Plugin name.
        name: String,
        /// Human-readable failure description.
        message: String,
        /// Optional underlying I/O error.
        #[source]
        source: Option<Arc<std::io::Error>>,
    },

    /// An RPC call failed at the transport level or was rejected by the
    /// plugin.
    #[error("failed to call plugin '{name}' api '{api}': {message}")]
    Call {
        /// Plugin name.
        name: String,
        /// API that was invoked.
        api: String,
        /// Plugin-supplied or transport failure message.
        message: String,
    },

    /// A manifest or binary could not be downloaded.
    #[error("failed to fetch '{location}': {message}")]
    Fetch {
        /// Location that was requested.
        location: String,
        /// Description of the failure.
        message: String,
    },

    /// A plugin manifest is malformed.
    #[error("manifest error: {message}")]
    Manifest {
        /// Description of the problem.
        message: String,
    },

    /// A filesystem operation on plugin artefacts failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// Persisted state could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PluginError {
    pub(crate) fn start_failed(name: &str, message: impl Into<String>) -> Self {
        Self::StartFailed {
            name: name.to_owned(),
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}
