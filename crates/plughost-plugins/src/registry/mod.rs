//! Definition registry for manifest storage and lookup.
//!
//! The [`DefinitionRegistry`] holds every registered [`Definition`] keyed by
//! name. It can be populated from the local definitions directory and
//! rejects duplicate registrations.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use plughost_config::StorageLayout;
use tracing::{info, warn};

use crate::definition::Definition;
use crate::error::PluginError;

const REGISTRY_TARGET: &str = "plughost_plugins::registry";

/// Registry of known plugin definitions.
///
/// # Example
///
/// ```
/// use plughost_plugins::{Definition, DefinitionRegistry};
///
/// let mut registry = DefinitionRegistry::new();
/// registry.insert(Definition::new("echo")).expect("registration succeeds");
/// assert!(registry.get("echo").is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DefinitionRegistry {
    definitions: BTreeMap<String, Definition>,
}

impl DefinitionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `*.yaml` manifest in `dir`.
    ///
    /// A missing directory is created and yields an empty registry.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Io`] if the directory cannot be created or
    /// listed, [`PluginError::Manifest`] if a manifest is malformed, and
    /// [`PluginError::AlreadyRegistered`] if two manifests share a name.
    pub fn load_dir(dir: &Path) -> Result<Self, PluginError> {
        let mut registry = Self::new();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(dir).map_err(|source| PluginError::io(dir, source))?;
                return Ok(registry);
            }
            Err(source) => return Err(PluginError::io(dir, source)),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|source| PluginError::io(dir, source))?.path();
            if path.is_file() && StorageLayout::is_manifest(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            info!(
                target: REGISTRY_TARGET,
                file = %path.display(),
                "loading plugin definition"
            );
            let bytes = fs::read(&path).map_err(|source| PluginError::io(&path, source))?;
            let definition = Definition::from_yaml_slice(&bytes)?;
            if path.file_stem().and_then(|stem| stem.to_str()) != Some(definition.name()) {
                warn!(
                    target: REGISTRY_TARGET,
                    file = %path.display(),
                    plugin = definition.name(),
                    "manifest file name does not match plugin name"
                );
            }
            registry.insert(definition)?;
        }
        Ok(registry)
    }

    /// Adds a definition.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Manifest`] if the definition fails its checks
    /// and [`PluginError::AlreadyRegistered`] if the name is taken.
    pub fn insert(&mut self, definition: Definition) -> Result<(), PluginError> {
        definition.check()?;
        let name = definition.name().to_owned();
        if self.definitions.contains_key(&name) {
            return Err(PluginError::AlreadyRegistered { name });
        }
        self.definitions.insert(name, definition);
        Ok(())
    }

    /// Removes and returns the named definition.
    pub fn remove(&mut self, name: &str) -> Option<Definition> {
        self.definitions.remove(name)
    }

    /// Looks up a definition by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.definitions.get(name)
    }

    /// Returns `true` if the name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Iterates definitions in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Definition> {
        self.definitions.values()
    }

    /// Returns the number of registered definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests;
