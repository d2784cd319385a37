//! Configs bound to plugins.
//!
//! A [`Config`] is a named parameter set owned by one plugin. The
//! [`PluginBinding`] store asks the owning plugin's definition to validate a
//! config before it is written to the binding table, and reports bound
//! configs to the plugin manager so that plugins in use cannot be
//! unregistered.

pub mod binding;
pub mod config;
pub mod error;

pub use binding::PluginBinding;
pub use config::{Config, ConfigInstance, NAME_KEY, PLUGIN_KEY, RESERVED_KEYS, TYPE_KEY};
pub use error::BindingError;

#[cfg(test)]
mod tests;
