// crates/capi-harness/src/lib.rs
// ============================================================================
// Module: CAPI Harness Library
// Description: Disposable control-plane targets for integration tests.
// Purpose: Launch, authenticate against, and tear down one target per test.
// Dependencies: capi-harness-config, capi-harness-core, reqwest, jsonwebtoken
// ============================================================================

//! ## Overview
//! `capi-harness` turns a target binary and a base config template into a
//! running, healthy instance that a test can talk to:
//!
//! - [`Harness::dial`] synthesizes a config, launches the binary, and waits
//!   for `GET /v2/info` to return 200.
//! - [`TargetClient`] sends JSON requests with an optional bearer token.
//! - [`IdentityIssuer`] mints HS256 tokens the target trusts, with or
//!   without the admin scope.
//! - [`Harness::kill`] stops the process and removes its config.
//!
//! Each harness owns its process, port, and config file; nothing is shared
//! between instances.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod config;
pub mod error;
pub mod harness;
pub mod identity;
pub mod options;
pub mod readiness;
pub mod supervisor;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use capi_harness_core::ApplicationError;
pub use capi_harness_core::convert_status_code;
pub use client::TargetClient;
pub use client::TargetResponse;
pub use error::ClientError;
pub use error::HarnessError;
pub use error::IdentityError;
pub use error::SupervisorError;
pub use harness::Harness;
pub use identity::AuthToken;
pub use identity::IdentityIssuer;
pub use identity::TestActor;
pub use identity::TokenClaims;
pub use identity::TrustConfig;
pub use identity::random_id;
pub use options::HarnessOptions;
pub use options::PolicyServiceOptions;
pub use readiness::ReadinessError;
pub use readiness::ReadinessPolicy;
pub use readiness::wait_ready;
pub use supervisor::LaunchSpec;
pub use supervisor::OrchestratedProcess;
pub use supervisor::ProcessSupervisor;
pub use supervisor::allocate_port;
