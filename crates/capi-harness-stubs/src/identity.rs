// crates/capi-harness-stubs/src/identity.rs
// ============================================================================
// Module: Identity Discovery Stub
// Description: Minimal identity-provider discovery endpoints.
// Purpose: Let the target resolve its token issuer without a real provider.
// Dependencies: axum, serde, capi-harness-core
// ============================================================================

//! ## Overview
//! Serves `GET /.well-known/openid-configuration` with the configured issuer
//! and `GET /token_keys` with an empty key set. Tokens are signed with a
//! pre-shared symmetric key, which is never published.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::get;
use capi_harness_core::HarnessEvent;
use capi_harness_core::HarnessEventSink;
use capi_harness_core::NoopEventSink;
use capi_harness_core::events::detail;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;

use crate::server::StubError;
use crate::server::StubHandle;
use crate::server::spawn_router;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Discovery document path.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Key set path.
pub const TOKEN_KEYS_PATH: &str = "/token_keys";

const COMPONENT: &str = "identity_stub";

// ============================================================================
// SECTION: Documents
// ============================================================================

/// Discovery document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    /// Issuer URL.
    pub issuer: String,
    /// Key set URL.
    pub jwks_uri: String,
}

impl DiscoveryDocument {
    /// Builds the document for `issuer`.
    #[must_use]
    pub fn for_issuer(issuer: &str) -> Self {
        Self {
            issuer: issuer.to_string(),
            jwks_uri: format!("{}{TOKEN_KEYS_PATH}", issuer.trim_end_matches('/')),
        }
    }
}

#[derive(Clone)]
struct IdentityState {
    document: Arc<DiscoveryDocument>,
    sink: Arc<dyn HarnessEventSink>,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Router serving the discovery and key-set endpoints for `issuer`.
pub fn identity_router(issuer: &str, sink: Arc<dyn HarnessEventSink>) -> Router {
    let state = IdentityState {
        document: Arc::new(DiscoveryDocument::for_issuer(issuer)),
        sink,
    };
    Router::new()
        .route(DISCOVERY_PATH, get(discovery))
        .route(TOKEN_KEYS_PATH, get(token_keys))
        .with_state(state)
}

async fn discovery(State(state): State<IdentityState>) -> Json<DiscoveryDocument> {
    state.sink.record(&HarnessEvent::ok(
        COMPONENT,
        "discovery_served",
        detail([("issuer", json!(state.document.issuer))]),
    ));
    Json(state.document.as_ref().clone())
}

async fn token_keys() -> Json<serde_json::Value> {
    Json(json!({ "keys": [] }))
}

// ============================================================================
// SECTION: Spawn
// ============================================================================

/// Options for a background identity stub.
#[derive(Clone)]
pub struct IdentityStubOptions {
    /// Address to bind; port `0` picks a free port.
    pub bind: SocketAddr,
    /// Issuer advertised in the discovery document.
    pub issuer: String,
    /// Event sink.
    pub sink: Arc<dyn HarnessEventSink>,
}

impl IdentityStubOptions {
    /// Options advertising `issuer` on a free loopback port.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            issuer: issuer.into(),
            sink: Arc::new(NoopEventSink),
        }
    }
}

/// Spawns the identity stub on a background thread.
///
/// # Errors
///
/// Returns [`StubError`] when the listener or server thread cannot start.
pub fn spawn_identity_stub(options: IdentityStubOptions) -> Result<StubHandle, StubError> {
    spawn_router(options.bind, identity_router(&options.issuer, options.sink))
}
