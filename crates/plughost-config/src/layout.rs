//! Derives the on-disk layout from the configured base path.
//!
//! ```text
//! <base>/plugins/definitions/<name>.yaml
//! <base>/plugins/binaries/<name>
//! <base>/plugins/state.yaml
//! <base>/binding_state.yaml
//! ```

use std::path::{Path, PathBuf};

const PLUGINS_DIR: &str = "plugins";
const DEFINITIONS_DIR: &str = "definitions";
const BINARIES_DIR: &str = "binaries";
const PLUGIN_STATE_FILE: &str = "state.yaml";
const BINDING_STATE_FILE: &str = "binding_state.yaml";
const MANIFEST_EXTENSION: &str = "yaml";

/// Canonical locations of every persisted artefact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    base: PathBuf,
    definitions_dir: PathBuf,
    binaries_dir: PathBuf,
    plugin_state: PathBuf,
    binding_state: PathBuf,
}

impl StorageLayout {
    /// Builds the layout rooted at `base`. Nothing is created on disk.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        let plugins = base.join(PLUGINS_DIR);
        Self {
            definitions_dir: plugins.join(DEFINITIONS_DIR),
            binaries_dir: plugins.join(BINARIES_DIR),
            plugin_state: plugins.join(PLUGIN_STATE_FILE),
            binding_state: base.join(BINDING_STATE_FILE),
            base,
        }
    }

    /// Storage root.
    #[must_use]
    pub fn base(&self) -> &Path {
        self.base.as_path()
    }

    /// Directory holding one manifest per registered plugin.
    #[must_use]
    pub fn definitions_dir(&self) -> &Path {
        self.definitions_dir.as_path()
    }

    /// Directory holding installed plugin executables.
    #[must_use]
    pub fn binaries_dir(&self) -> &Path {
        self.binaries_dir.as_path()
    }

    /// Per-plugin instance state, keyed by plugin name.
    #[must_use]
    pub fn plugin_state(&self) -> &Path {
        self.plugin_state.as_path()
    }

    /// Configuration bindings, keyed by config name.
    #[must_use]
    pub fn binding_state(&self) -> &Path {
        self.binding_state.as_path()
    }

    /// Manifest file for the named plugin.
    #[must_use]
    pub fn definition_path(&self, plugin: &str) -> PathBuf {
        self.definitions_dir
            .join(format!("{plugin}.{MANIFEST_EXTENSION}"))
    }

    /// Installed executable for the named plugin.
    #[must_use]
    pub fn binary_path(&self, plugin: &str) -> PathBuf {
        self.binaries_dir.join(plugin)
    }

    /// Returns `true` when `path` names a manifest file.
    #[must_use]
    pub fn is_manifest(path: &Path) -> bool {
        path.extension()
            .is_some_and(|extension| extension == MANIFEST_EXTENSION)
    }
}
