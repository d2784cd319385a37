//! Declared plugin arguments and the checks applied to them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// JSON shape a declared argument must take.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentType {
    /// A string.
    Text,
    /// A whole number.
    Integer,
    /// Any number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// A sequence.
    List,
    /// A nested mapping.
    Map,
    /// No constraint.
    #[default]
    Any,
}

impl ArgumentType {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::List => "list",
            Self::Map => "map",
            Self::Any => "any",
        }
    }

    /// Returns `true` when `value` has this shape.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Text => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::List => value.is_array(),
            Self::Map => value.is_object(),
            Self::Any => true,
        }
    }
}

impl fmt::Display for ArgumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declaration of one parameter a plugin accepts in a bound config.
///
/// # Example
///
/// ```
/// use plughost_plugins::{ArgumentSpec, ArgumentType};
///
/// let spec = ArgumentSpec::required(ArgumentType::Text);
/// assert!(spec.is_required());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentSpec {
    #[serde(rename = "type", default)]
    kind: ArgumentType,
    #[serde(default)]
    required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl ArgumentSpec {
    /// A mandatory argument of the given type.
    #[must_use]
    pub const fn required(kind: ArgumentType) -> Self {
        Self {
            kind,
            required: true,
            description: None,
        }
    }

    /// An optional argument of the given type.
    #[must_use]
    pub const fn optional(kind: ArgumentType) -> Self {
        Self {
            kind,
            required: false,
            description: None,
        }
    }

    /// Declared value type.
    #[must_use]
    pub const fn kind(&self) -> ArgumentType {
        self.kind
    }

    /// Whether the argument must be present and non-null.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// A single reason a plugin rejected a parameter set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A required argument was absent or null.
    Missing {
        /// Argument name.
        argument: String,
    },
    /// An argument had the wrong JSON shape.
    WrongType {
        /// Argument name.
        argument: String,
        /// Declared type.
        expected: ArgumentType,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { argument } => write!(f, "'{argument}' is required"),
            Self::WrongType { argument, expected } => {
                write!(f, "'{argument}' must be of type {expected}")
            }
        }
    }
}

/// Raised when a plugin's validation rejects a parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("plugin '{plugin}' rejected parameters: {}", summarise(.violations))]
pub struct ValidationError {
    plugin: String,
    violations: Vec<Violation>,
}

impl ValidationError {
    /// Builds an error from a non-empty list of violations.
    #[must_use]
    pub fn new(plugin: impl Into<String>, violations: Vec<Violation>) -> Self {
        Self {
            plugin: plugin.into(),
            violations,
        }
    }

    /// Plugin that performed the validation.
    #[must_use]
    pub fn plugin(&self) -> &str {
        self.plugin.as_str()
    }

    /// Every rejected argument.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

fn summarise(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
