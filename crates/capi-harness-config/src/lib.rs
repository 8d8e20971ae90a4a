// crates/capi-harness-config/src/lib.rs
// ============================================================================
// Module: CAPI Harness Config Library
// Description: Ephemeral target configuration synthesis.
// Purpose: Merge overrides into a base template and persist a scoped file.
// Dependencies: serde_yaml, tempfile, thiserror
// ============================================================================

//! ## Overview
//! `capi-harness-config` builds the YAML configuration a target process is
//! launched with. A base template is parsed into a [`ConfigDocument`], a
//! [`ConfigOverlay`] is applied in order (later overrides win), and the result
//! is written to a uniquely named file owned by one harness instance.
//!
//! Every key that no override touches round-trips from the template
//! unchanged.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod document;
pub mod error;
pub mod overlay;
pub mod synthesize;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use document::ConfigDocument;
pub use document::ConfigPath;
pub use error::ConfigError;
pub use overlay::ConfigOverlay;
pub use overlay::OverrideFn;
pub use overlay::TargetSetting;
pub use serde_yaml::Value as ConfigValue;
pub use synthesize::ConfigSynthesizer;
pub use synthesize::SynthesizedConfig;
pub use synthesize::remove_config;
pub use synthesize::render;
pub use synthesize::synthesize;

// ============================================================================
// SECTION: Base Template
// ============================================================================

/// Built-in base template used when no template path is configured.
pub const BASE_TEMPLATE: &str = include_str!("../fixtures/base_config.yml");
