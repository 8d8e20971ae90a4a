// crates/capi-harness-config/src/document.rs
// ============================================================================
// Module: Config Document
// Description: Structured YAML document addressed by dotted paths.
// Purpose: Read and replace values at structural paths without losing keys.
// Dependencies: serde_yaml
// ============================================================================

//! ## Overview
//! [`ConfigDocument`] wraps the top-level mapping of the target's YAML
//! configuration. Values are addressed by [`ConfigPath`]; setting a value
//! touches exactly one leaf and leaves every other key as parsed.
//! Invariants:
//! - The root is always a mapping.
//! - `set` never replaces a non-mapping intermediate value.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde_yaml::Mapping;
use serde_yaml::Value;

use crate::error::ConfigError;

// ============================================================================
// SECTION: Paths
// ============================================================================

/// Structural path into a config document (for example `uaa.internal_url`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigPath {
    /// Non-empty key segments, outermost first.
    segments: Vec<String>,
}

impl ConfigPath {
    /// Parses a dotted path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the path is empty or contains an
    /// empty segment.
    pub fn parse(dotted: &str) -> Result<Self, ConfigError> {
        Self::from_segments(dotted.split('.'))
    }

    /// Builds a path from explicit segments, allowing keys that contain dots.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when there are no segments or any
    /// segment is empty.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() || segments.iter().any(String::is_empty) {
            return Err(ConfigError::Invalid(format!(
                "config path must have non-empty segments: {:?}",
                segments.join(".")
            )));
        }
        Ok(Self {
            segments,
        })
    }

    /// Returns the key segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Splits the path into its parent segments and leaf key.
    fn split_leaf(&self) -> (&[String], &str) {
        match self.segments.split_last() {
            Some((leaf, parents)) => (parents, leaf.as_str()),
            None => (&[], ""),
        }
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl FromStr for ConfigPath {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

// ============================================================================
// SECTION: Document
// ============================================================================

/// Parsed target configuration document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigDocument {
    /// Top-level mapping.
    root: Mapping,
}

impl ConfigDocument {
    /// Parses YAML text into a document. An empty template yields an empty
    /// document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the text is not YAML or its top
    /// level is not a mapping.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_yaml::from_str(yaml).map_err(|err| ConfigError::Parse(err.to_string()))?;
        match value {
            Value::Mapping(root) => Ok(Self {
                root,
            }),
            Value::Null => Ok(Self::default()),
            other => Err(ConfigError::Parse(format!(
                "config template must be a mapping, found {}",
                value_kind(&other)
            ))),
        }
    }

    /// Returns the value at `path`, if present.
    #[must_use]
    pub fn get(&self, path: &ConfigPath) -> Option<&Value> {
        let (parents, leaf) = path.split_leaf();
        let mut current = &self.root;
        for segment in parents {
            current = current.get(segment.as_str())?.as_mapping()?;
        }
        current.get(leaf)
    }

    /// Sets the value at `path`, creating missing intermediate mappings, and
    /// returns the previous value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when an intermediate segment exists
    /// but does not hold a mapping.
    pub fn set(&mut self, path: &ConfigPath, value: Value) -> Result<Option<Value>, ConfigError> {
        let (parents, leaf) = path.split_leaf();
        let mut current = &mut self.root;
        for (depth, segment) in parents.iter().enumerate() {
            if !current.contains_key(segment.as_str()) {
                current.insert(Value::String(segment.clone()), Value::Mapping(Mapping::new()));
            }
            current = match current.get_mut(segment.as_str()) {
                Some(Value::Mapping(next)) => next,
                Some(other) => {
                    return Err(ConfigError::Invalid(format!(
                        "cannot set {path}: {} is a {}, not a mapping",
                        parents[..=depth].join("."),
                        value_kind(other)
                    )));
                }
                None => {
                    return Err(ConfigError::Invalid(format!(
                        "cannot set {path}: {segment} vanished during insert"
                    )));
                }
            };
        }
        Ok(current.insert(Value::String(leaf.to_string()), value))
    }

    /// Returns the top-level mapping.
    #[must_use]
    pub const fn root(&self) -> &Mapping {
        &self.root
    }

    /// Renders the document as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] when rendering fails.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(&self.root).map_err(|err| ConfigError::Serialize(err.to_string()))
    }
}

/// Short label for a YAML value's kind, used in error messages.
const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
