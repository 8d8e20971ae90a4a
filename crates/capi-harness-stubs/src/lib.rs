// crates/capi-harness-stubs/src/lib.rs
// ============================================================================
// Module: CAPI Harness Stubs Library
// Description: Peer stand-ins the target talks to during tests.
// Purpose: Replace the task scheduler and identity provider with fakes.
// Dependencies: axum, reqwest, tokio, capi-harness-core
// ============================================================================

//! ## Overview
//! - [`scheduler`]: the callback simulator that completes task desires.
//! - [`identity`]: discovery endpoints advertising the token issuer.
//! - [`server`]: the background-thread server handle both stubs share.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod identity;
pub mod scheduler;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identity::IdentityStubOptions;
pub use identity::spawn_identity_stub;
pub use scheduler::CallbackSimulator;
pub use scheduler::CallbackStage;
pub use scheduler::CallbackTemplate;
pub use scheduler::SchedulerStubOptions;
pub use scheduler::downgrade_callback_url;
pub use scheduler::spawn_scheduler_stub;
pub use server::StubError;
pub use server::StubHandle;
