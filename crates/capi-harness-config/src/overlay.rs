// crates/capi-harness-config/src/overlay.rs
// ============================================================================
// Module: Config Overlay
// Description: Ordered overrides applied to a base config document.
// Purpose: Let independent components contribute values to one config.
// Dependencies: serde_yaml
// ============================================================================

//! ## Overview
//! A [`ConfigOverlay`] is an ordered list of override operations. Each
//! operation either sets a value at a path or runs a closure over the shared
//! document, so a component that only learns a port at runtime can still
//! inject it. Operations run strictly in insertion order; when two touch the
//! same path the later one wins.
//!
//! [`TargetSetting`] names the keys the harness itself manages together with
//! their value types.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde_yaml::Value;

use crate::document::ConfigDocument;
use crate::document::ConfigPath;
use crate::error::ConfigError;

// ============================================================================
// SECTION: Typed Settings
// ============================================================================

/// Target configuration keys managed by the harness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSetting {
    /// `external_port`: port the target listens on.
    ExternalPort(u16),
    /// `uaa.url`: identity provider URL (also the token issuer).
    UaaUrl(String),
    /// `uaa.internal_url`: identity provider URL used for internal calls.
    UaaInternalUrl(String),
    /// `uaa.symmetric_secret`: pre-shared token signing key.
    UaaSymmetricSecret(String),
    /// `uaa.resource_id`: expected token audience.
    UaaResourceId(String),
    /// `perm.enabled`: whether the policy service is consulted.
    PermEnabled(bool),
    /// `perm.hostname`: policy service host.
    PermHostname(String),
    /// `perm.port`: policy service port.
    PermPort(u16),
    /// `perm.ca_cert_path`: CA bundle used to dial the policy service.
    PermCaCertPath(String),
    /// `perm.timeout_in_milliseconds`: policy service call timeout.
    PermTimeoutMs(u64),
    /// `diego.bbs.url`: scheduler endpoint.
    SchedulerUrl(String),
    /// `logging.level`: target log level.
    LoggingLevel(String),
}

impl TargetSetting {
    /// Returns the dotted path for this setting.
    #[must_use]
    pub const fn dotted_path(&self) -> &'static str {
        match self {
            Self::ExternalPort(_) => "external_port",
            Self::UaaUrl(_) => "uaa.url",
            Self::UaaInternalUrl(_) => "uaa.internal_url",
            Self::UaaSymmetricSecret(_) => "uaa.symmetric_secret",
            Self::UaaResourceId(_) => "uaa.resource_id",
            Self::PermEnabled(_) => "perm.enabled",
            Self::PermHostname(_) => "perm.hostname",
            Self::PermPort(_) => "perm.port",
            Self::PermCaCertPath(_) => "perm.ca_cert_path",
            Self::PermTimeoutMs(_) => "perm.timeout_in_milliseconds",
            Self::SchedulerUrl(_) => "diego.bbs.url",
            Self::LoggingLevel(_) => "logging.level",
        }
    }

    /// Returns the structural path for this setting.
    ///
    /// # Errors
    ///
    /// Never fails for the built-in paths; kept fallible to share
    /// [`ConfigPath::parse`].
    pub fn path(&self) -> Result<ConfigPath, ConfigError> {
        ConfigPath::parse(self.dotted_path())
    }

    /// Converts the setting into its YAML value.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::ExternalPort(port) | Self::PermPort(port) => Value::from(port),
            Self::PermTimeoutMs(millis) => Value::from(millis),
            Self::PermEnabled(enabled) => Value::Bool(enabled),
            Self::UaaUrl(text)
            | Self::UaaInternalUrl(text)
            | Self::UaaSymmetricSecret(text)
            | Self::UaaResourceId(text)
            | Self::PermHostname(text)
            | Self::PermCaCertPath(text)
            | Self::SchedulerUrl(text)
            | Self::LoggingLevel(text) => Value::String(text),
        }
    }
}

// ============================================================================
// SECTION: Overlay
// ============================================================================

/// Closure override over the shared document.
pub type OverrideFn = Box<dyn FnOnce(&mut ConfigDocument) -> Result<(), ConfigError> + Send>;

/// One override operation.
enum ConfigOverride {
    /// Replace the value at a path.
    Set {
        /// Target path.
        path: ConfigPath,
        /// Replacement value.
        value: Value,
    },
    /// Run a closure against the document.
    Apply(OverrideFn),
}

/// Ordered override operations for one synthesis.
#[derive(Default)]
pub struct ConfigOverlay {
    /// Operations in application order.
    operations: Vec<ConfigOverride>,
}

impl ConfigOverlay {
    /// Creates an empty overlay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value override.
    #[must_use]
    pub fn set(mut self, path: ConfigPath, value: impl Into<Value>) -> Self {
        self.push_set(path, value);
        self
    }

    /// Appends a typed harness setting.
    ///
    /// # Errors
    ///
    /// Propagates path construction errors.
    pub fn setting(mut self, setting: TargetSetting) -> Result<Self, ConfigError> {
        self.push_setting(setting)?;
        Ok(self)
    }

    /// Appends a closure override.
    #[must_use]
    pub fn with<F>(mut self, apply: F) -> Self
    where
        F: FnOnce(&mut ConfigDocument) -> Result<(), ConfigError> + Send + 'static,
    {
        self.push_with(apply);
        self
    }

    /// Appends a value override in place.
    pub fn push_set(&mut self, path: ConfigPath, value: impl Into<Value>) {
        self.operations.push(ConfigOverride::Set {
            path,
            value: value.into(),
        });
    }

    /// Appends a typed harness setting in place.
    ///
    /// # Errors
    ///
    /// Propagates path construction errors.
    pub fn push_setting(&mut self, setting: TargetSetting) -> Result<(), ConfigError> {
        let path = setting.path()?;
        self.push_set(path, setting.into_value());
        Ok(())
    }

    /// Appends a closure override in place.
    pub fn push_with<F>(&mut self, apply: F)
    where
        F: FnOnce(&mut ConfigDocument) -> Result<(), ConfigError> + Send + 'static,
    {
        self.operations.push(ConfigOverride::Apply(Box::new(apply)));
    }

    /// Appends every operation of `other` after the current ones.
    #[must_use]
    pub fn extend(mut self, other: Self) -> Self {
        self.operations.extend(other.operations);
        self
    }

    /// Returns the number of queued operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true when no operations are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Applies every operation to `document` in insertion order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing operation and returns its error.
    pub fn apply_to(self, document: &mut ConfigDocument) -> Result<(), ConfigError> {
        for operation in self.operations {
            match operation {
                ConfigOverride::Set {
                    path,
                    value,
                } => {
                    document.set(&path, value)?;
                }
                ConfigOverride::Apply(apply) => apply(document)?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ConfigOverlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for operation in &self.operations {
            match operation {
                ConfigOverride::Set {
                    path,
                    ..
                } => list.entry(&format_args!("set {path}")),
                ConfigOverride::Apply(_) => list.entry(&format_args!("closure")),
            };
        }
        list.finish()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
