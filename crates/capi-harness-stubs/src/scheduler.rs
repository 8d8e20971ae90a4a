// crates/capi-harness-stubs/src/scheduler.rs
// ============================================================================
// Module: Scheduler Callback Simulator
// Description: Stand-in for the task scheduler's desire endpoint.
// Purpose: Complete target task workflows by calling back immediately.
// Dependencies: axum, reqwest, url, capi-harness-core
// ============================================================================

//! ## Overview
//! The simulator accepts `POST /v1/tasks/desire.r2`, decodes the protobuf
//! task desire, and immediately POSTs a fixed-shape completion callback to
//! the URL named in the task definition. Each request moves through
//! [`CallbackStage`]s and ends in exactly one HTTP status:
//!
//! | Outcome | Status |
//! |---|---|
//! | payload does not decode or lacks required fields | `400` |
//! | callback transport error or status outside `[200, 400)` | `500` |
//! | callback accepted | `200` |
//!
//! Callback URLs are downgraded from `https` to `http` before dialing; the
//! simulator cannot present the recipient's TLS identity.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use capi_harness_core::DesireTaskRequest;
use capi_harness_core::HarnessEvent;
use capi_harness_core::HarnessEventSink;
use capi_harness_core::LifecycleMetadata;
use capi_harness_core::NoopEventSink;
use capi_harness_core::TaskCallbackRequest;
use capi_harness_core::TaskCallbackResult;
use capi_harness_core::events::detail;
use capi_harness_core::wire::DESIRE_TASK_PATH;
use reqwest::Client;
use serde_json::json;
use url::Url;

use crate::server::StubError;
use crate::server::StubHandle;
use crate::server::spawn_router;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Component label used in simulator events.
const COMPONENT: &str = "scheduler_stub";

/// Default lifecycle type reported in callbacks.
pub const DEFAULT_LIFECYCLE_TYPE: &str = "docker";

/// Default container image reported in callbacks.
pub const DEFAULT_DOCKER_IMAGE: &str = "docker.harness.test/placeholder:latest";

// ============================================================================
// SECTION: Callback Template
// ============================================================================

/// Fixed fields of every synthesized completion callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackTemplate {
    /// Lifecycle type label.
    pub lifecycle_type: String,
    /// Container image reference.
    pub docker_image: String,
    /// Process type map.
    pub process_types: BTreeMap<String, String>,
    /// Execution metadata.
    pub execution_metadata: String,
}

impl Default for CallbackTemplate {
    fn default() -> Self {
        Self {
            lifecycle_type: DEFAULT_LIFECYCLE_TYPE.to_string(),
            docker_image: DEFAULT_DOCKER_IMAGE.to_string(),
            process_types: BTreeMap::new(),
            execution_metadata: String::new(),
        }
    }
}

impl CallbackTemplate {
    /// Builds the callback payload for `task_guid`.
    #[must_use]
    pub fn callback_for(&self, task_guid: &str) -> TaskCallbackRequest {
        TaskCallbackRequest {
            task_guid: task_guid.to_string(),
            result: TaskCallbackResult {
                task_guid: task_guid.to_string(),
                execution_metadata: self.execution_metadata.clone(),
                process_types: self.process_types.clone(),
                lifecycle_type: self.lifecycle_type.clone(),
                lifecycle_metadata: LifecycleMetadata {
                    docker_image: self.docker_image.clone(),
                },
            },
        }
    }
}

/// Rewrites an `https` callback URL to `http`; other schemes pass through.
///
/// Only the scheme changes. The authority (including an explicit `:443`)
/// and the rest of the URL are kept byte for byte. Unparseable URLs are
/// returned unchanged and fail at dial time.
#[must_use]
pub fn downgrade_callback_url(raw: &str) -> String {
    const HTTPS_PREFIX: &str = "https:";
    let is_https = Url::parse(raw).is_ok_and(|url| url.scheme() == "https");
    match raw.get(.. HTTPS_PREFIX.len()) {
        Some(prefix) if is_https && prefix.eq_ignore_ascii_case(HTTPS_PREFIX) => {
            format!("http:{}", &raw[HTTPS_PREFIX.len() ..])
        }
        _ => raw.to_string(),
    }
}

// ============================================================================
// SECTION: Request Lifecycle
// ============================================================================

/// Stage a desire request reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStage {
    /// Body read.
    Received,
    /// Desire decoded and validated.
    Decoded,
    /// Callback POST sent.
    Forwarded,
    /// Callback accepted; replied `200`.
    Acknowledged,
    /// Terminal failure; replied `400` or `500`.
    Failed,
}

impl CallbackStage {
    /// Stable label used in events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Decoded => "decoded",
            Self::Forwarded => "forwarded",
            Self::Acknowledged => "acknowledged",
            Self::Failed => "failed",
        }
    }
}

/// Terminal result of one desire request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    /// Status returned to the target.
    pub status: StatusCode,
    /// Last stage reached before the terminal one.
    pub reached: CallbackStage,
    /// Terminal stage.
    pub terminal: CallbackStage,
    /// Task identifier when decoded.
    pub task_guid: Option<String>,
    /// Callback URL dialed, after downgrade.
    pub callback_url: Option<String>,
    /// Status returned by the callback recipient.
    pub callback_status: Option<u16>,
    /// Failure description.
    pub error: Option<String>,
}

impl CallbackOutcome {
    fn failed(status: StatusCode, reached: CallbackStage, error: String) -> Self {
        Self {
            status,
            reached,
            terminal: CallbackStage::Failed,
            task_guid: None,
            callback_url: None,
            callback_status: None,
            error: Some(error),
        }
    }

    fn with_callback_status(mut self, code: u16) -> Self {
        self.callback_status = Some(code);
        self
    }
}

// ============================================================================
// SECTION: Simulator
// ============================================================================

/// Shared, read-only simulator state.
#[derive(Clone)]
pub struct CallbackSimulator {
    template: Arc<CallbackTemplate>,
    client: Client,
    sink: Arc<dyn HarnessEventSink>,
}

impl std::fmt::Debug for CallbackSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSimulator").field("template", &self.template).finish_non_exhaustive()
    }
}

impl CallbackSimulator {
    /// Creates a simulator.
    ///
    /// # Errors
    ///
    /// Returns [`StubError::Runtime`] when the outbound client cannot be built.
    pub fn new(
        template: CallbackTemplate,
        sink: Arc<dyn HarnessEventSink>,
    ) -> Result<Self, StubError> {
        let client =
            Client::builder().no_proxy().build().map_err(|err| StubError::Runtime(err.to_string()))?;
        Ok(Self {
            template: Arc::new(template),
            client,
            sink,
        })
    }

    /// Template used for every callback.
    #[must_use]
    pub fn template(&self) -> &CallbackTemplate {
        &self.template
    }

    /// Router serving the desire endpoint.
    #[must_use]
    pub fn router(self) -> Router {
        Router::new().route(DESIRE_TASK_PATH, post(handle_desire)).with_state(self)
    }

    /// Runs one desire request to its terminal stage and records one event.
    pub async fn process(&self, body: &[u8]) -> CallbackOutcome {
        let outcome = self.run(body).await;
        let detail = detail([
            ("stage", json!(outcome.terminal.as_str())),
            ("reached", json!(outcome.reached.as_str())),
            ("status", json!(outcome.status.as_u16())),
            ("task_guid", json!(outcome.task_guid)),
            ("callback_url", json!(outcome.callback_url)),
            ("callback_status", json!(outcome.callback_status)),
            ("error", json!(outcome.error)),
        ]);
        let event = if outcome.terminal == CallbackStage::Acknowledged {
            HarnessEvent::ok(COMPONENT, "task_callback", detail)
        } else {
            HarnessEvent::failed(COMPONENT, "task_callback", detail)
        };
        self.sink.record(&event);
        outcome
    }

    async fn run(&self, body: &[u8]) -> CallbackOutcome {
        let desire = match DesireTaskRequest::decode_validated(body) {
            Ok(desire) => desire,
            Err(err) => {
                return CallbackOutcome::failed(
                    StatusCode::BAD_REQUEST,
                    CallbackStage::Received,
                    err.to_string(),
                );
            }
        };
        let task_guid = desire.task_guid.clone();
        let callback_url = downgrade_callback_url(desire.completion_callback_url());
        let payload = self.template.callback_for(&task_guid);

        let sent = self.client.post(&callback_url).json(&payload).send().await;
        let mut outcome = match sent {
            Err(err) => CallbackOutcome::failed(
                StatusCode::INTERNAL_SERVER_ERROR,
                CallbackStage::Decoded,
                format!("callback transport error: {err}"),
            ),
            Ok(response) => {
                let code = response.status().as_u16();
                let outcome = if (200 .. 400).contains(&code) {
                    CallbackOutcome {
                        status: StatusCode::OK,
                        reached: CallbackStage::Forwarded,
                        terminal: CallbackStage::Acknowledged,
                        task_guid: None,
                        callback_url: None,
                        callback_status: None,
                        error: None,
                    }
                } else {
                    CallbackOutcome::failed(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        CallbackStage::Forwarded,
                        format!("callback rejected with status {code}"),
                    )
                };
                outcome.with_callback_status(code)
            }
        };
        outcome.task_guid = Some(task_guid);
        outcome.callback_url = Some(callback_url);
        outcome
    }
}

async fn handle_desire(State(simulator): State<CallbackSimulator>, body: Bytes) -> StatusCode {
    simulator.process(&body).await.status
}

// ============================================================================
// SECTION: Spawn
// ============================================================================

/// Options for a background scheduler stub.
#[derive(Clone)]
pub struct SchedulerStubOptions {
    /// Address to bind; port `0` picks a free port.
    pub bind: SocketAddr,
    /// Callback template.
    pub template: CallbackTemplate,
    /// Event sink.
    pub sink: Arc<dyn HarnessEventSink>,
}

impl Default for SchedulerStubOptions {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            template: CallbackTemplate::default(),
            sink: Arc::new(NoopEventSink),
        }
    }
}

/// Spawns the simulator on a background thread.
///
/// # Errors
///
/// Returns [`StubError`] when the listener or server thread cannot start.
pub fn spawn_scheduler_stub(options: SchedulerStubOptions) -> Result<StubHandle, StubError> {
    let simulator = CallbackSimulator::new(options.template, options.sink)?;
    spawn_router(options.bind, simulator.router())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
