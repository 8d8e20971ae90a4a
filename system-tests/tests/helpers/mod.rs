// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared helpers for the harness end-to-end suites.
// Purpose: Dial the fake target with consistent options.
// Dependencies: capi-harness, system-tests
// ============================================================================

//! ## Overview
//! Shared helpers for harness system-tests.
//! Invariants:
//! - Every dial gets its own port, config file, and run directory.
//! - Harnesses are killed explicitly or on drop; nothing outlives a test.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test suites.")]

pub mod target;
