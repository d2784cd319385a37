//! The binding table: every config, keyed by name.
//!
//! Configs are validated by their owning plugin before anything is written,
//! so an invalid add or update leaves both memory and disk untouched.

use std::collections::BTreeMap;

use plughost_config::StorageLayout;
use plughost_plugins::{BindingInspector, Params, PluginResolver};
use plughost_store::YamlDocument;
use tracing::{debug, info};

use crate::config::{Config, ConfigInstance};
use crate::error::BindingError;

const BINDING_TARGET: &str = "plughost_binding";

/// Name-keyed store of configs bound to plugins.
///
/// # Example
///
/// ```no_run
/// use plughost_binding::PluginBinding;
/// use plughost_config::Config;
/// use plughost_plugins::{Params, PluginManager, PluginRuntime};
/// use serde_json::json;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::default();
/// let mut manager =
///     PluginManager::new(config.storage_layout(), PluginRuntime::system(&config)?);
/// manager.load_local()?;
/// let mut binding = PluginBinding::new(&config.storage_layout());
/// binding.load_store()?;
///
/// let mut data = Params::new();
/// data.insert("name".into(), json!("job1"));
/// data.insert("type".into(), json!("source"));
/// data.insert("plugin_name".into(), json!("echo"));
/// data.insert("url".into(), json!("https://example.com/feed"));
/// binding.add(data, &manager)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PluginBinding {
    document: YamlDocument,
    configs: BTreeMap<String, ConfigInstance>,
}

impl PluginBinding {
    /// Creates an empty store over the binding table of `layout`. Nothing is
    /// read until [`PluginBinding::load_store`].
    #[must_use]
    pub fn new(layout: &StorageLayout) -> Self {
        Self {
            document: YamlDocument::new(layout.binding_state()),
            configs: BTreeMap::new(),
        }
    }

    /// Replaces the in-memory configs with the persisted table.
    ///
    /// Stored entries are trusted and not re-validated.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::Store`] if the table cannot be read and
    /// [`BindingError::InvalidConfig`] if an entry lacks a reserved field or
    /// is stored under a key other than its name.
    pub fn load_store(&mut self) -> Result<(), BindingError> {
        let table: BTreeMap<String, Option<Params>> = self.document.read()?;
        let mut configs = BTreeMap::new();
        for (key, entry) in table {
            let record =
                entry.ok_or_else(|| BindingError::invalid(format!("entry '{key}' is empty")))?;
            let config = Config::from_record(record)?;
            if config.name() != key {
                return Err(BindingError::invalid(format!(
                    "entry '{key}' is named '{}'",
                    config.name()
                )));
            }
            configs.insert(key, ConfigInstance::new(&self.document, config));
        }
        self.configs = configs;
        info!(
            target: BINDING_TARGET,
            configs = self.configs.len(),
            "loaded bound configs"
        );
        Ok(())
    }

    /// Validates and stores a new config given as a flat record.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::InvalidConfig`] if a reserved field is
    /// missing, [`BindingError::Duplicate`] if the name is taken,
    /// [`BindingError::PluginNotFound`] if the owning plugin is not
    /// registered, [`BindingError::Validation`] if the plugin rejects the
    /// parameters, and [`BindingError::Store`] if the write fails.
    pub fn add(&mut self, data: Params, plugins: &dyn PluginResolver) -> Result<(), BindingError> {
        let config = Config::from_record(data)?;
        if self.configs.contains_key(config.name()) {
            return Err(BindingError::Duplicate {
                name: config.name().to_owned(),
            });
        }
        validate(&config, plugins)?;

        let instance = ConfigInstance::new(&self.document, config);
        instance.save()?;
        let name = instance.config().name().to_owned();
        info!(
            target: BINDING_TARGET,
            config = %name,
            plugin = instance.config().plugin_name(),
            "config added"
        );
        self.configs.insert(name, instance);
        Ok(())
    }

    /// Merges `patch` into a config's parameters after the owning plugin has
    /// accepted the merged result. Reserved keys in `patch` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::NotFound`] if no config has this name,
    /// [`BindingError::PluginNotFound`] or [`BindingError::Validation`] if
    /// the merged config is rejected, and [`BindingError::Store`] if the
    /// write fails. The stored config is unchanged on any error.
    pub fn update(
        &mut self,
        name: &str,
        patch: Params,
        plugins: &dyn PluginResolver,
    ) -> Result<(), BindingError> {
        let instance = self
            .configs
            .get_mut(name)
            .ok_or_else(|| BindingError::NotFound {
                name: name.to_owned(),
            })?;
        let candidate = instance.config().patched(patch);
        validate(&candidate, plugins)?;
        instance.replace(candidate)?;
        info!(target: BINDING_TARGET, config = name, "config updated");
        Ok(())
    }

    /// Deletes a config from memory and disk.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::NotFound`] if no config has this name and
    /// [`BindingError::Store`] if the table cannot be rewritten.
    pub fn remove(&mut self, name: &str) -> Result<(), BindingError> {
        let instance = self.configs.get(name).ok_or_else(|| BindingError::NotFound {
            name: name.to_owned(),
        })?;
        instance.delete()?;
        self.configs.remove(name);
        info!(target: BINDING_TARGET, config = name, "config removed");
        Ok(())
    }

    /// Configs in name order, optionally restricted to one category.
    #[must_use]
    pub fn list_config(&self, kind: Option<&str>) -> Vec<&Config> {
        self.configs
            .values()
            .map(ConfigInstance::config)
            .filter(|config| kind.is_none_or(|wanted| config.kind() == wanted))
            .collect()
    }

    /// Looks up a config by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Config> {
        self.configs.get(name).map(ConfigInstance::config)
    }
}

impl BindingInspector for PluginBinding {
    fn bindings_for(&self, plugin: &str) -> Vec<String> {
        self.configs
            .values()
            .map(ConfigInstance::config)
            .filter(|config| config.plugin_name() == plugin)
            .map(|config| config.name().to_owned())
            .collect()
    }
}

fn validate(config: &Config, plugins: &dyn PluginResolver) -> Result<(), BindingError> {
    let definition =
        plugins
            .definition(config.plugin_name())
            .ok_or_else(|| BindingError::PluginNotFound {
                plugin: config.plugin_name().to_owned(),
            })?;
    definition.validate(config.params())?;
    debug!(
        target: BINDING_TARGET,
        config = config.name(),
        plugin = config.plugin_name(),
        "config accepted by plugin"
    );
    Ok(())
}

#[cfg(test)]
mod tests;
