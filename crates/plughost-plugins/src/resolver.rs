//! Seams between the plugin manager and configuration bindings.
//!
//! Bindings need to look up definitions and validate parameters; the manager
//! needs to know which configs reference a plugin before unregistering it.
//! Each side implements one trait and receives the other by reference, so
//! neither owns the other.

use crate::definition::Definition;

/// Read access to registered definitions.
pub trait PluginResolver {
    /// Returns the definition registered under `name`.
    fn definition(&self, name: &str) -> Option<&Definition>;
}

/// Reverse lookup from plugins to the configs bound to them.
pub trait BindingInspector {
    /// Names of the configs whose `plugin_name` is `plugin`.
    fn bindings_for(&self, plugin: &str) -> Vec<String>;
}

/// Inspector for hosts that keep no bindings.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBindings;

impl BindingInspector for NoBindings {
    fn bindings_for(&self, _plugin: &str) -> Vec<String> {
        Vec::new()
    }
}
