// system-tests/src/fake_target.rs
// ============================================================================
// Module: Fake Target
// Description: Minimal control-plane stand-in driven by the harness.
// Purpose: Give end-to-end suites a real process to launch, probe, and call.
// Dependencies: axum, serde_yaml, reqwest, prost, capi-harness
// ============================================================================

//! ## Overview
//! The fake target reads the same config keys the harness synthesizes and
//! behaves like a small slice of the real control plane:
//!
//! - `GET /v2/info` is unauthenticated and answers once the listener is up.
//! - `/v3/organizations` requires a bearer token; writes require the admin
//!   scope.
//! - `POST /v3/tasks` sends a protobuf task desire to `diego.bbs.url` with an
//!   `https` completion callback pointing back at itself, then reports the
//!   task state after the scheduler answers.
//! - `POST /internal/v4/tasks/{guid}/completed` accepts completion callbacks.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use axum::Json;
use axum::Router;
use axum::extract::Path as UrlPath;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use capi_harness::IdentityIssuer;
use capi_harness::TokenClaims;
use capi_harness::TrustConfig;
use capi_harness_core::DesireTaskRequest;
use capi_harness_core::TaskCallbackRequest;
use capi_harness_core::wire::DESIRE_TASK_PATH;
use capi_harness_core::wire::PROTOBUF_CONTENT_TYPE;
use prost::Message;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Config keys the fake target reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FakeTargetConfig {
    /// Listen port.
    pub external_port: u16,
    /// Trust settings.
    pub uaa: UaaSection,
    /// Scheduler settings.
    pub diego: DiegoSection,
}

/// `uaa` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UaaSection {
    /// Token issuer.
    pub url: String,
    /// Token audience.
    pub resource_id: String,
    /// Symmetric signing key.
    pub symmetric_secret: String,
}

/// `diego` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiegoSection {
    /// Scheduler endpoint.
    pub bbs: BbsSection,
}

/// `diego.bbs` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BbsSection {
    /// Scheduler base URL.
    pub url: String,
}

/// Fake target startup failures.
#[derive(Debug, Error)]
pub enum FakeTargetError {
    /// Config file could not be read.
    #[error("failed to read config {path}: {message}")]
    Read {
        /// Config path.
        path: String,
        /// Underlying error.
        message: String,
    },
    /// Config file did not match the expected shape.
    #[error("invalid config: {0}")]
    Parse(String),
    /// Outbound client setup failed.
    #[error("failed to build scheduler client: {0}")]
    Client(String),
}

impl FakeTargetConfig {
    /// Loads and parses a YAML config file.
    ///
    /// # Errors
    ///
    /// Returns [`FakeTargetError`] when the file is unreadable or malformed.
    pub fn load(path: &Path) -> Result<Self, FakeTargetError> {
        let text = std::fs::read_to_string(path).map_err(|err| FakeTargetError::Read {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        serde_yaml::from_str(&text).map_err(|err| FakeTargetError::Parse(err.to_string()))
    }
}

// ============================================================================
// SECTION: State
// ============================================================================

/// Organization record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Organization id.
    pub guid: String,
    /// Unique name.
    pub name: String,
}

/// Task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Task id.
    pub guid: String,
    /// Display name.
    pub name: String,
    /// `PENDING`, `RUNNING`, `SUCCEEDED`, or `FAILED`.
    pub state: String,
    /// Lifecycle type reported by the scheduler callback.
    pub lifecycle_type: Option<String>,
}

#[derive(Debug, Default)]
struct Store {
    organizations: BTreeMap<String, Organization>,
    tasks: BTreeMap<String, Task>,
}

#[derive(Clone)]
struct AppState {
    issuer: Arc<IdentityIssuer>,
    scheduler_url: String,
    callback_base: String,
    client: reqwest::Client,
    store: Arc<Mutex<Store>>,
}

impl AppState {
    fn with_store<T>(&self, f: impl FnOnce(&mut Store) -> T) -> Result<T, Response> {
        let mut store = self
            .store
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "store poisoned").into_response())?;
        Ok(f(&mut store))
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<TokenClaims, Response> {
        let value = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "missing token"))?;
        self.issuer
            .verify(value)
            .map_err(|err| error_response(StatusCode::UNAUTHORIZED, &err.to_string()))
    }

    fn authorize_admin(&self, headers: &HeaderMap) -> Result<TokenClaims, Response> {
        let claims = self.authenticate(headers)?;
        if claims.is_admin() {
            Ok(claims)
        } else {
            Err(error_response(StatusCode::FORBIDDEN, "admin scope required"))
        }
    }
}

fn error_response(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "errors": [{ "detail": detail }] }))).into_response()
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the fake target router for `config`.
///
/// # Errors
///
/// Returns [`FakeTargetError::Client`] when the scheduler client cannot be
/// built.
pub fn router(config: &FakeTargetConfig) -> Result<Router, FakeTargetError> {
    let trust = TrustConfig::new(&config.uaa.symmetric_secret, &config.uaa.url)
        .with_audience(&config.uaa.resource_id);
    let client = reqwest::Client::builder()
        .no_proxy()
        .build()
        .map_err(|err| FakeTargetError::Client(err.to_string()))?;
    let state = AppState {
        issuer: Arc::new(IdentityIssuer::new(trust)),
        scheduler_url: config.diego.bbs.url.trim_end_matches('/').to_string(),
        callback_base: format!("https://127.0.0.1:{}", config.external_port),
        client,
        store: Arc::default(),
    };
    Ok(Router::new()
        .route("/v2/info", get(info))
        .route("/v3/organizations", get(list_organizations).post(create_organization))
        .route("/v3/organizations/{guid}", get(get_organization).delete(delete_organization))
        .route("/v3/tasks", post(create_task))
        .route("/v3/tasks/{guid}", get(get_task))
        .route("/internal/v4/tasks/{guid}/completed", post(complete_task))
        .with_state(state))
}

async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "name": "fake-target",
        "api_version": "2.0.0",
        "token_endpoint": state.issuer.trust().issuer,
    }))
}

async fn list_organizations(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = state.authenticate(&headers) {
        return response;
    }
    match state.with_store(|store| store.organizations.values().cloned().collect::<Vec<_>>()) {
        Ok(resources) => Json(json!({ "resources": resources })).into_response(),
        Err(response) => response,
    }
}

#[derive(Debug, Deserialize)]
struct CreateOrganization {
    name: String,
}

async fn create_organization(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateOrganization>,
) -> Response {
    if let Err(response) = state.authorize_admin(&headers) {
        return response;
    }
    if body.name.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "name must not be empty");
    }
    let created = state.with_store(|store| {
        if store.organizations.values().any(|org| org.name == body.name) {
            return None;
        }
        let org = Organization {
            guid: Uuid::new_v4().to_string(),
            name: body.name.clone(),
        };
        store.organizations.insert(org.guid.clone(), org.clone());
        Some(org)
    });
    match created {
        Ok(Some(org)) => (StatusCode::CREATED, Json(org)).into_response(),
        Ok(None) => error_response(StatusCode::UNPROCESSABLE_ENTITY, "name already taken"),
        Err(response) => response,
    }
}

async fn get_organization(
    State(state): State<AppState>,
    headers: HeaderMap,
    UrlPath(guid): UrlPath<String>,
) -> Response {
    if let Err(response) = state.authenticate(&headers) {
        return response;
    }
    match state.with_store(|store| store.organizations.get(&guid).cloned()) {
        Ok(Some(org)) => Json(org).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "organization not found"),
        Err(response) => response,
    }
}

async fn delete_organization(
    State(state): State<AppState>,
    headers: HeaderMap,
    UrlPath(guid): UrlPath<String>,
) -> Response {
    if let Err(response) = state.authorize_admin(&headers) {
        return response;
    }
    match state.with_store(|store| store.organizations.remove(&guid)) {
        Ok(Some(_)) => StatusCode::NO_CONTENT.into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "organization not found"),
        Err(response) => response,
    }
}

#[derive(Debug, Deserialize)]
struct CreateTask {
    name: String,
}

async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateTask>,
) -> Response {
    if let Err(response) = state.authenticate(&headers) {
        return response;
    }
    let guid = Uuid::new_v4().to_string();
    let task = Task {
        guid: guid.clone(),
        name: body.name,
        state: "RUNNING".to_string(),
        lifecycle_type: None,
    };
    if let Err(response) = state.with_store(|store| store.tasks.insert(guid.clone(), task)) {
        return response;
    }

    let callback = format!("{}/internal/v4/tasks/{guid}/completed", state.callback_base);
    let desire = DesireTaskRequest::new(guid.clone(), callback).encode_to_vec();
    let sent = state
        .client
        .post(format!("{}{DESIRE_TASK_PATH}", state.scheduler_url))
        .header("content-type", PROTOBUF_CONTENT_TYPE)
        .body(desire)
        .send()
        .await;
    let accepted = matches!(&sent, Ok(response) if response.status().is_success());
    let task = state.with_store(|store| {
        let task = store.tasks.get_mut(&guid)?;
        if !accepted {
            task.state = "FAILED".to_string();
        }
        Some(task.clone())
    });
    match task {
        Ok(Some(task)) if accepted => (StatusCode::ACCEPTED, Json(task)).into_response(),
        Ok(Some(_)) => error_response(StatusCode::BAD_GATEWAY, "scheduler rejected task"),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "task vanished"),
        Err(response) => response,
    }
}

async fn get_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    UrlPath(guid): UrlPath<String>,
) -> Response {
    if let Err(response) = state.authenticate(&headers) {
        return response;
    }
    match state.with_store(|store| store.tasks.get(&guid).cloned()) {
        Ok(Some(task)) => Json(task).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "task not found"),
        Err(response) => response,
    }
}

async fn complete_task(
    State(state): State<AppState>,
    UrlPath(guid): UrlPath<String>,
    Json(body): Json<TaskCallbackRequest>,
) -> Response {
    if body.task_guid != guid {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, "task guid mismatch");
    }
    let updated = state.with_store(|store| {
        let task = store.tasks.get_mut(&guid)?;
        task.state = "SUCCEEDED".to_string();
        task.lifecycle_type = Some(body.result.lifecycle_type.clone());
        Some(())
    });
    match updated {
        Ok(Some(())) => StatusCode::OK.into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "task not found"),
        Err(response) => response,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
