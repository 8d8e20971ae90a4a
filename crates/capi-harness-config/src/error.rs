// crates/capi-harness-config/src/error.rs
// ============================================================================
// Module: Config Errors
// Description: Failure kinds for configuration synthesis.
// Purpose: Surface template, override, and persistence failures synchronously.
// Dependencies: thiserror
// ============================================================================

//! Failure kinds for configuration synthesis.

use thiserror::Error;

/// Configuration synthesis errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Template text is not a YAML mapping.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Override path or value is invalid for the document.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// Document could not be rendered back to YAML.
    #[error("config serialize error: {0}")]
    Serialize(String),
    /// I/O failure while reading a template or persisting a config file.
    #[error("config io error: {0}")]
    Io(String),
}
