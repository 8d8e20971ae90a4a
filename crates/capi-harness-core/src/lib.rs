// crates/capi-harness-core/src/lib.rs
// ============================================================================
// Module: CAPI Harness Core Library
// Description: Shared contracts for the control-plane test harness.
// Purpose: Expose event sinks, the status taxonomy, and scheduler wire types.
// Dependencies: crate::{events, status, wire}
// ============================================================================

//! ## Overview
//! Harness core holds the types every other harness crate agrees on: the
//! structured event sinks used for logging, the closed mapping from HTTP
//! status codes to application error kinds, and the task-desire wire model
//! exchanged between the target and the scheduler simulator.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod events;
pub mod status;
pub mod wire;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use events::EventOutcome;
pub use events::FileEventSink;
pub use events::HarnessEvent;
pub use events::HarnessEventParams;
pub use events::HarnessEventSink;
pub use events::MemoryEventSink;
pub use events::NoopEventSink;
pub use events::StderrEventSink;
pub use status::ApplicationError;
pub use status::convert_status_code;
pub use wire::DesireTaskRequest;
pub use wire::LifecycleMetadata;
pub use wire::TaskCallbackRequest;
pub use wire::TaskCallbackResult;
pub use wire::TaskDefinition;
pub use wire::TaskDesireDecodeError;
