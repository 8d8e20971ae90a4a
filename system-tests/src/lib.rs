// system-tests/src/lib.rs
// ============================================================================
// Module: CAPI Harness System Tests Library
// Description: Fake target shared by the end-to-end suites.
// Purpose: Provide a controllable process for the harness to supervise.
// Dependencies: axum, capi-harness
// ============================================================================

//! ## Overview
//! This crate hosts the fake target launched by the system-tests binaries in
//! `system-tests/tests`. The suites only run with `--features system-tests`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod fake_target;
