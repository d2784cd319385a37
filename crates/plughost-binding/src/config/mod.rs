//! Bound configs and their persisted form.
//!
//! On disk each config is a flat mapping: the three reserved keys sit next
//! to the plugin-defined parameters.
//!
//! ```yaml
//! job1:
//!   name: job1
//!   type: source
//!   plugin_name: echo
//!   url: https://example.com/feed
//! ```

use plughost_plugins::Params;
use plughost_store::{StoreError, YamlDocument, YamlSection};
use serde_json::Value;

use crate::error::BindingError;

/// Key holding the config name.
pub const NAME_KEY: &str = "name";
/// Key holding the config category.
pub const TYPE_KEY: &str = "type";
/// Key holding the owning plugin.
pub const PLUGIN_KEY: &str = "plugin_name";

/// Keys interpreted by the binding store rather than the plugin.
pub const RESERVED_KEYS: [&str; 3] = [NAME_KEY, TYPE_KEY, PLUGIN_KEY];

/// A named parameter set bound to one plugin.
///
/// # Example
///
/// ```
/// use plughost_binding::Config;
/// use plughost_plugins::Params;
/// use serde_json::json;
///
/// let mut params = Params::new();
/// params.insert("url".into(), json!("https://example.com/feed"));
/// let config = Config::new("job1", "source", "echo", params);
///
/// let record = config.to_record();
/// assert_eq!(record.get("plugin_name"), Some(&json!("echo")));
/// assert_eq!(record.get("url"), Some(&json!("https://example.com/feed")));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    name: String,
    kind: String,
    plugin_name: String,
    params: Params,
}

impl Config {
    /// Builds a config. Reserved keys inside `params` are dropped.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        plugin_name: impl Into<String>,
        mut params: Params,
    ) -> Self {
        strip_reserved(&mut params);
        Self {
            name: name.into(),
            kind: kind.into(),
            plugin_name: plugin_name.into(),
            params,
        }
    }

    /// Splits a flat record into the reserved fields and the remaining
    /// plugin parameters.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::InvalidConfig`] if a reserved field is
    /// missing, empty, or not a string.
    pub fn from_record(mut record: Params) -> Result<Self, BindingError> {
        let name = take_required(&mut record, NAME_KEY)?;
        let kind = take_required(&mut record, TYPE_KEY)?;
        let plugin_name = take_required(&mut record, PLUGIN_KEY)?;
        Ok(Self {
            name,
            kind,
            plugin_name,
            params: record,
        })
    }

    /// Flat record with the reserved fields merged over the parameters.
    #[must_use]
    pub fn to_record(&self) -> Params {
        let mut record = self.params.clone();
        record.insert(NAME_KEY.to_owned(), Value::from(self.name.as_str()));
        record.insert(TYPE_KEY.to_owned(), Value::from(self.kind.as_str()));
        record.insert(
            PLUGIN_KEY.to_owned(),
            Value::from(self.plugin_name.as_str()),
        );
        record
    }

    /// Same config with `patch` merged over its parameters. Reserved keys in
    /// the patch are ignored.
    #[must_use]
    pub fn patched(&self, patch: Params) -> Self {
        let mut params = self.params.clone();
        params.extend(patch);
        Self::new(
            self.name.as_str(),
            self.kind.as_str(),
            self.plugin_name.as_str(),
            params,
        )
    }

    /// Unique config name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Config category, used to filter listings.
    #[must_use]
    pub fn kind(&self) -> &str {
        self.kind.as_str()
    }

    /// Plugin that owns and validates this config.
    #[must_use]
    pub fn plugin_name(&self) -> &str {
        self.plugin_name.as_str()
    }

    /// Plugin-defined parameters without the reserved keys.
    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }
}

/// A [`Config`] paired with its section of the binding table.
#[derive(Debug, Clone)]
pub struct ConfigInstance {
    section: YamlSection,
    config: Config,
}

impl ConfigInstance {
    /// Associates `config` with its entry in `document`.
    #[must_use]
    pub fn new(document: &YamlDocument, config: Config) -> Self {
        Self {
            section: document.section(config.name()),
            config,
        }
    }

    /// The bound config.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Writes the config's record into its section.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the table cannot be read or written.
    pub fn save(&self) -> Result<(), StoreError> {
        self.section.write(&self.config.to_record())
    }

    /// Persists `config` and, once written, makes it the current value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails; the held config is then
    /// unchanged.
    pub fn replace(&mut self, config: Config) -> Result<(), StoreError> {
        self.section.write(&config.to_record())?;
        self.config = config;
        Ok(())
    }

    /// Deletes the config's section from the table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the table cannot be read or written.
    pub fn delete(&self) -> Result<(), StoreError> {
        self.section.remove()?;
        Ok(())
    }
}

fn take_required(record: &mut Params, key: &str) -> Result<String, BindingError> {
    match record.remove(key) {
        Some(Value::String(value)) if !value.is_empty() => Ok(value),
        Some(Value::String(_)) => Err(BindingError::invalid(format!("'{key}' must not be empty"))),
        Some(_) => Err(BindingError::invalid(format!("'{key}' must be a string"))),
        None => Err(BindingError::invalid(format!(
            "missing required field '{key}'"
        ))),
    }
}

fn strip_reserved(params: &mut Params) {
    for key in RESERVED_KEYS {
        params.remove(key);
    }
}
