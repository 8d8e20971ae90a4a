// crates/capi-harness/src/config/mod.rs
// ============================================================================
// Module: Harness Configuration
// Description: Environment-sourced settings for harness bootstrap.
// Purpose: Provide typed access to harness environment overrides.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Harness settings that vary per developer machine or CI job are read from
//! environment variables and mapped into a small typed structure that
//! [`crate::HarnessOptions::from_env`] layers over its defaults.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod env;

// ============================================================================
// SECTION: Tests
// ============================================================================


// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use env::HarnessEnv;
pub use env::HarnessEnvConfig;
pub use env::read_env_strict;
