//! Orchestration of plugin definitions and their running instances.
//!
//! The [`PluginManager`] owns the [`DefinitionRegistry`] and one
//! [`PluginInstance`] per enabled plugin. It is the only entry point for
//! invoking a plugin and the only writer of manifests and the plugin state
//! file.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use plughost_config::StorageLayout;
use plughost_store::{YamlDocument, write_atomic};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::definition::{Definition, Params};
use crate::error::PluginError;
use crate::instance::{InstanceState, PluginInstance};
use crate::registry::DefinitionRegistry;
use crate::resolver::{BindingInspector, PluginResolver};
use crate::runtime::PluginRuntime;

const MANAGER_TARGET: &str = "plughost_plugins::manager";

/// Permission bits for stored manifests.
const MANIFEST_MODE: u32 = 0o644;

/// Registry plus live instances.
///
/// # Example
///
/// ```no_run
/// use plughost_config::Config;
/// use plughost_plugins::{NoBindings, Params, PluginManager, PluginRuntime};
///
/// # fn main() -> Result<(), plughost_plugins::PluginError> {
/// let config = Config::default();
/// let mut manager =
///     PluginManager::new(config.storage_layout(), PluginRuntime::system(&config)?);
/// manager.load_local()?;
/// let name = manager.register("https://example.com/plugins/echo.yaml")?;
/// manager.enable(&name)?;
/// let data = manager.call(&name, "search", &Params::new())?;
/// manager.disable(&name)?;
/// manager.unregister(&name, &NoBindings)?;
/// # let _ = data;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PluginManager {
    layout: StorageLayout,
    registry: DefinitionRegistry,
    instances: BTreeMap<String, PluginInstance>,
    runtime: PluginRuntime,
    state: YamlDocument,
}

impl PluginManager {
    /// Creates a manager over `layout`. Nothing is read until
    /// [`PluginManager::load_local`].
    #[must_use]
    pub fn new(layout: StorageLayout, runtime: PluginRuntime) -> Self {
        let state = YamlDocument::new(layout.plugin_state());
        Self {
            layout,
            registry: DefinitionRegistry::new(),
            instances: BTreeMap::new(),
            runtime,
            state,
        }
    }

    /// Loads stored manifests and re-enables every plugin whose persisted
    /// state carries a port.
    ///
    /// # Errors
    ///
    /// Returns the first manifest, state, or restore failure.
    pub fn load_local(&mut self) -> Result<(), PluginError> {
        self.registry = DefinitionRegistry::load_dir(self.layout.definitions_dir())?;
        let persisted: BTreeMap<String, Option<InstanceState>> = self.state.read()?;
        info!(
            target: MANAGER_TARGET,
            definitions = self.registry.len(),
            "loaded plugin definitions"
        );

        for (name, entry) in &persisted {
            if entry.and_then(|state| state.port).is_none() {
                continue;
            }
            let Some(definition) = self.registry.get(name).cloned() else {
                warn!(
                    target: MANAGER_TARGET,
                    plugin = %name,
                    "ignoring state of unregistered plugin"
                );
                continue;
            };
            info!(target: MANAGER_TARGET, plugin = %name, "restoring plugin");
            self.start(definition)?;
        }
        Ok(())
    }

    /// Fetches a manifest, stores it, and registers its definition.
    /// Returns the plugin name.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Fetch`] or [`PluginError::Manifest`] if the
    /// manifest cannot be obtained, [`PluginError::AlreadyRegistered`] if the
    /// name is taken, and [`PluginError::Io`] if it cannot be stored.
    pub fn register(&mut self, source: &str) -> Result<String, PluginError> {
        let bytes = self.runtime.fetcher().fetch(source)?;
        let definition = Definition::from_yaml_slice(&bytes)?;
        let name = definition.name().to_owned();
        if self.registry.contains(&name) {
            return Err(PluginError::AlreadyRegistered { name });
        }
        let path = self.layout.definition_path(&name);
        write_atomic(&path, &bytes, MANIFEST_MODE)
            .map_err(|source| PluginError::io(&path, source))?;
        self.registry.insert(definition)?;
        info!(
            target: MANAGER_TARGET,
            plugin = %name,
            source,
            "plugin registered"
        );
        Ok(name)
    }

    /// Removes a plugin: stops it, then deletes its manifest and binary.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::InUse`] if `bindings` reports configs bound to
    /// the plugin, [`PluginError::NotFound`] if it is not registered, and
    /// [`PluginError::Io`] or [`PluginError::Store`] if its files cannot be
    /// removed.
    pub fn unregister(
        &mut self,
        name: &str,
        bindings: &dyn BindingInspector,
    ) -> Result<(), PluginError> {
        let configs = bindings.bindings_for(name);
        if !configs.is_empty() {
            return Err(PluginError::InUse {
                name: name.to_owned(),
                configs,
            });
        }
        if !self.registry.contains(name) {
            return Err(PluginError::NotFound {
                name: name.to_owned(),
            });
        }
        if self.instances.contains_key(name) {
            self.disable(name)?;
        } else {
            self.state.section(name).remove()?;
        }
        remove_if_present(&self.layout.definition_path(name))?;
        remove_if_present(&self.layout.binary_path(name))?;
        self.registry.remove(name);
        info!(target: MANAGER_TARGET, plugin = name, "plugin unregistered");
        Ok(())
    }

    /// Starts the named plugin unless it is already enabled.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] if the plugin is not registered and
    /// [`PluginError::StartFailed`] if it cannot be started.
    pub fn enable(&mut self, name: &str) -> Result<(), PluginError> {
        let definition = self
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| PluginError::NotFound {
                name: name.to_owned(),
            })?;
        if self.instances.contains_key(name) {
            debug!(target: MANAGER_TARGET, plugin = name, "plugin already enabled");
            return Ok(());
        }
        self.start(definition)
    }

    /// Stops the named plugin and forgets its persisted state.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotEnabled`] if the plugin has no live
    /// instance, leaving persisted state untouched.
    pub fn disable(&mut self, name: &str) -> Result<(), PluginError> {
        let instance = self
            .instances
            .get_mut(name)
            .ok_or_else(|| PluginError::NotEnabled {
                name: name.to_owned(),
            })?;
        instance.disable()?;
        self.instances.remove(name);
        self.state.section(name).remove()?;
        Ok(())
    }

    /// Invokes `api` on the named plugin.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotEnabled`] if the plugin has no live instance
    /// and [`PluginError::Call`] if the call fails.
    pub fn call(&self, name: &str, api: &str, kwargs: &Params) -> Result<Value, PluginError> {
        let instance = self
            .instances
            .get(name)
            .ok_or_else(|| PluginError::NotEnabled {
                name: name.to_owned(),
            })?;
        debug!(target: MANAGER_TARGET, plugin = name, api, "calling plugin");
        instance.call_api(api, kwargs)
    }

    /// Registered definitions in name order.
    pub fn list_plugins(&self) -> impl Iterator<Item = &Definition> {
        self.registry.iter()
    }

    /// Live instances in name order.
    pub fn list_instances(&self) -> impl Iterator<Item = &PluginInstance> {
        self.instances.values()
    }

    /// Looks up a registered definition.
    #[must_use]
    pub fn definition(&self, name: &str) -> Option<&Definition> {
        self.registry.get(name)
    }

    /// Returns `true` if the plugin has a live instance.
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.instances.contains_key(name)
    }

    /// Token that aborts health polling of a pending enable.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancelToken {
        self.runtime.cancel_token()
    }

    /// Stops every live instance. Persisted state sections are kept so the
    /// plugins show as stopped.
    ///
    /// # Errors
    ///
    /// Returns the first failure after attempting every instance.
    pub fn shutdown(&mut self) -> Result<(), PluginError> {
        let mut first_error = None;
        for (name, mut instance) in std::mem::take(&mut self.instances) {
            if let Err(error) = instance.disable() {
                warn!(
                    target: MANAGER_TARGET,
                    plugin = %name,
                    error = %error,
                    "failed to stop plugin"
                );
                first_error.get_or_insert(error);
            }
        }
        info!(target: MANAGER_TARGET, "plugin manager shut down");
        first_error.map_or(Ok(()), Err)
    }

    fn start(&mut self, definition: Definition) -> Result<(), PluginError> {
        let name = definition.name().to_owned();
        let mut instance =
            PluginInstance::new(definition, &self.layout, &self.state, self.runtime.clone());
        instance.enable()?;
        self.instances.insert(name, instance);
        Ok(())
    }
}

impl PluginResolver for PluginManager {
    fn definition(&self, name: &str) -> Option<&Definition> {
        self.registry.get(name)
    }
}

fn remove_if_present(path: &Path) -> Result<(), PluginError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(PluginError::io(path, source)),
    }
}
