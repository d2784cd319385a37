//! Plugin definitions parsed from YAML manifests.
//!
//! A [`Definition`] declares a plugin's name, where its executable can be
//! downloaded from, and the arguments a config bound to it must carry. The
//! argument schema is the plugin's validation capability: it is evaluated
//! locally, so validating a config never needs the plugin to be running.
//!
//! ```yaml
//! name: echo
//! version: "1.0.0"
//! binary: https://example.com/echo-bin
//! arguments:
//!   url:
//!     type: text
//!     required: true
//! ```

mod arguments;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PluginError;

pub use self::arguments::{ArgumentSpec, ArgumentType, ValidationError, Violation};

/// Open, plugin-defined parameters passed to validation and RPC calls.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Immutable description of a registered plugin.
///
/// # Example
///
/// ```
/// use plughost_plugins::{ArgumentSpec, ArgumentType, Definition, Params};
///
/// let definition = Definition::new("echo")
///     .with_binary("https://example.com/echo-bin")
///     .with_argument("url", ArgumentSpec::required(ArgumentType::Text));
///
/// assert!(definition.validate(&Params::new()).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    binary: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    arguments: BTreeMap<String, ArgumentSpec>,
}

impl Definition {
    /// Creates a definition with no binary and no declared arguments.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            author: None,
            description: None,
            category: None,
            binary: None,
            arguments: BTreeMap::new(),
        }
    }

    /// Sets the download location of the plugin executable.
    #[must_use]
    pub fn with_binary(mut self, location: impl Into<String>) -> Self {
        self.binary = Some(location.into());
        self
    }

    /// Declares an accepted argument.
    #[must_use]
    pub fn with_argument(mut self, name: impl Into<String>, spec: ArgumentSpec) -> Self {
        self.arguments.insert(name.into(), spec);
        self
    }

    /// Parses and checks a YAML manifest.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Manifest`] if the document is not valid YAML,
    /// does not describe a definition, or fails [`Definition::check`].
    pub fn from_yaml_slice(bytes: &[u8]) -> Result<Self, PluginError> {
        let definition: Self =
            serde_yaml::from_slice(bytes).map_err(|error| PluginError::Manifest {
                message: format!("invalid manifest: {error}"),
            })?;
        definition.check()?;
        Ok(definition)
    }

    /// Rejects manifests whose name cannot safely be used as a file name.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Manifest`] if the name is empty, starts with a
    /// dot, or contains a path separator.
    pub fn check(&self) -> Result<(), PluginError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(PluginError::Manifest {
                message: String::from("plugin name must not be empty"),
            });
        }
        if name != self.name || name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(PluginError::Manifest {
                message: format!("plugin name '{}' is not a valid file name", self.name),
            });
        }
        Ok(())
    }

    /// Checks `params` against the declared arguments.
    ///
    /// Required arguments must be present and non-null; present arguments
    /// must match their declared type. Undeclared parameters are passed
    /// through untouched.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing every violation.
    pub fn validate(&self, params: &Params) -> Result<(), ValidationError> {
        let violations: Vec<Violation> = self
            .arguments
            .iter()
            .filter_map(|(argument, spec)| match params.get(argument) {
                None | Some(serde_json::Value::Null) if spec.is_required() => {
                    Some(Violation::Missing {
                        argument: argument.clone(),
                    })
                }
                None | Some(serde_json::Value::Null) => None,
                Some(value) if spec.kind().accepts(value) => None,
                Some(_) => Some(Violation::WrongType {
                    argument: argument.clone(),
                    expected: spec.kind(),
                }),
            })
            .collect();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(self.name.clone(), violations))
        }
    }

    /// Plugin name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Download location of the executable, if the plugin ships one.
    #[must_use]
    pub fn binary(&self) -> Option<&str> {
        self.binary.as_deref()
    }

    /// Plugin version.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Plugin author.
    #[must_use]
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Free-form description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Free-form category tag (`type` in the manifest).
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Declared arguments, ordered by name.
    #[must_use]
    pub const fn arguments(&self) -> &BTreeMap<String, ArgumentSpec> {
        &self.arguments
    }
}
