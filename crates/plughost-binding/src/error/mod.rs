//! Errors raised by the configuration binding store.

use plughost_plugins::ValidationError;
use plughost_store::StoreError;
use thiserror::Error;

/// Failures of binding operations.
#[derive(Debug, Error)]
pub enum BindingError {
    /// No config with this name is bound.
    #[error("config '{name}' not found")]
    NotFound {
        /// Name that was looked up.
        name: String,
    },

    /// A config with this name is already bound.
    #[error("config '{name}' already exists")]
    Duplicate {
        /// Conflicting config name.
        name: String,
    },

    /// The config data lacks a required field or carries a malformed one.
    #[error("invalid config: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// The config names a plugin that is not registered.
    #[error("plugin '{plugin}' not found")]
    PluginNotFound {
        /// Plugin the config referenced.
        plugin: String,
    },

    /// The owning plugin rejected the config parameters.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The binding table could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BindingError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests;
