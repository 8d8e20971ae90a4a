// system-tests/tests/helpers/target.rs
// ============================================================================
// Module: Fake Target Helpers
// Description: Harness options and dial helpers for the fake target.
// Purpose: Keep suite setup to one call.
// Dependencies: capi-harness
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use capi_harness::Harness;
use capi_harness::HarnessError;
use capi_harness::HarnessOptions;
use capi_harness::ReadinessPolicy;
use capi_harness_core::HarnessEventSink;

/// Path of the fake target binary built alongside the suites.
pub fn fake_target_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_fake-target"))
}

/// Default options for dialing the fake target.
pub fn fake_target_options() -> HarnessOptions {
    HarnessOptions::new(fake_target_binary())
        .with_readiness(ReadinessPolicy::new(100, Duration::from_millis(50)))
}

/// Dials the fake target with default options.
pub async fn dial() -> Result<Harness, HarnessError> {
    Harness::dial(fake_target_options()).await
}

/// Dials the fake target reporting to `sink`.
pub async fn dial_with_sink(sink: Arc<dyn HarnessEventSink>) -> Result<Harness, HarnessError> {
    Harness::dial(fake_target_options().with_event_sink(sink)).await
}
