//! The context object owning every plugin-facing component.
//!
//! A [`Host`] holds the [`PluginManager`] and the [`PluginBinding`] store and
//! hands each one to the other as a capability per call: the manager
//! resolves definitions for binding validation, and the binding store
//! reports which plugins are still in use when unregistering.

use plughost_binding::{BindingError, Config, PluginBinding};
use plughost_config::StorageLayout;
use plughost_plugins::{CancelToken, Params, PluginError, PluginManager, PluginRuntime};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

const HOST_TARGET: &str = "plughostd::host";

/// Failures of host operations.
#[derive(Debug, Error)]
pub enum HostError {
    /// A plugin lifecycle operation failed.
    #[error(transparent)]
    Plugin(#[from] PluginError),
    /// A config binding operation failed.
    #[error(transparent)]
    Binding(#[from] BindingError),
}

/// Plugin manager plus config store, driven through `load`, operations, and
/// `shutdown`.
#[derive(Debug)]
pub struct Host {
    manager: PluginManager,
    binding: PluginBinding,
}

impl Host {
    /// Creates a host over `layout`. Nothing is read until [`Host::load`].
    #[must_use]
    pub fn new(layout: StorageLayout, runtime: PluginRuntime) -> Self {
        let binding = PluginBinding::new(&layout);
        Self {
            manager: PluginManager::new(layout, runtime),
            binding,
        }
    }

    /// Loads registered plugins, restarts the ones left enabled, then loads
    /// bound configs.
    ///
    /// # Errors
    ///
    /// Returns the first plugin or binding failure.
    pub fn load(&mut self) -> Result<(), HostError> {
        self.manager.load_local()?;
        self.binding.load_store()?;
        let dangling = self
            .binding
            .list_config(None)
            .into_iter()
            .filter(|config| self.manager.definition(config.plugin_name()).is_none())
            .count();
        if dangling > 0 {
            warn!(
                target: HOST_TARGET,
                configs = dangling,
                "configs bound to unregistered plugins"
            );
        }
        info!(target: HOST_TARGET, "host loaded");
        Ok(())
    }

    /// Registers the plugin whose manifest is at `source`.
    ///
    /// # Errors
    ///
    /// See [`PluginManager::register`].
    pub fn register(&mut self, source: &str) -> Result<String, HostError> {
        Ok(self.manager.register(source)?)
    }

    /// Unregisters a plugin that no config is bound to.
    ///
    /// # Errors
    ///
    /// See [`PluginManager::unregister`].
    pub fn unregister(&mut self, name: &str) -> Result<(), HostError> {
        self.manager.unregister(name, &self.binding)?;
        Ok(())
    }

    /// Starts a registered plugin.
    ///
    /// # Errors
    ///
    /// See [`PluginManager::enable`].
    pub fn enable(&mut self, name: &str) -> Result<(), HostError> {
        self.manager.enable(name)?;
        Ok(())
    }

    /// Stops a running plugin.
    ///
    /// # Errors
    ///
    /// See [`PluginManager::disable`].
    pub fn disable(&mut self, name: &str) -> Result<(), HostError> {
        self.manager.disable(name)?;
        Ok(())
    }

    /// Invokes `api` on an enabled plugin.
    ///
    /// # Errors
    ///
    /// See [`PluginManager::call`].
    pub fn call(&self, name: &str, api: &str, kwargs: &Params) -> Result<Value, HostError> {
        Ok(self.manager.call(name, api, kwargs)?)
    }

    /// Binds a new config after its plugin has accepted it.
    ///
    /// # Errors
    ///
    /// See [`PluginBinding::add`].
    pub fn add_config(&mut self, data: Params) -> Result<(), HostError> {
        self.binding.add(data, &self.manager)?;
        Ok(())
    }

    /// Patches a bound config after its plugin has accepted the result.
    ///
    /// # Errors
    ///
    /// See [`PluginBinding::update`].
    pub fn update_config(&mut self, name: &str, patch: Params) -> Result<(), HostError> {
        self.binding.update(name, patch, &self.manager)?;
        Ok(())
    }

    /// Removes a bound config.
    ///
    /// # Errors
    ///
    /// See [`PluginBinding::remove`].
    pub fn remove_config(&mut self, name: &str) -> Result<(), HostError> {
        self.binding.remove(name)?;
        Ok(())
    }

    /// Bound configs, optionally restricted to one category.
    #[must_use]
    pub fn list_config(&self, kind: Option<&str>) -> Vec<&Config> {
        self.binding.list_config(kind)
    }

    /// The plugin manager.
    #[must_use]
    pub const fn manager(&self) -> &PluginManager {
        &self.manager
    }

    /// The config store.
    #[must_use]
    pub const fn binding(&self) -> &PluginBinding {
        &self.binding
    }

    /// Token that aborts a pending plugin start from another thread.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancelToken {
        self.manager.cancel_token()
    }

    /// Stops every running plugin. Their state sections are kept with no
    /// port, so the next [`Host::load`] leaves them stopped.
    ///
    /// # Errors
    ///
    /// Returns the first failure after attempting every plugin.
    pub fn shutdown(&mut self) -> Result<(), HostError> {
        self.manager.shutdown()?;
        info!(target: HOST_TARGET, "host shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
