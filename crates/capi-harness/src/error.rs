// crates/capi-harness/src/error.rs
// ============================================================================
// Module: Harness Errors
// Description: Error types for process supervision, requests, and identity.
// Purpose: Give each harness stage a distinguishable failure surface.
// Dependencies: thiserror, reqwest, capi-harness-config, capi-harness-core
// ============================================================================

//! ## Overview
//! Each harness stage owns an error enum; [`HarnessError`] aggregates them so
//! `Harness::dial` can report which stage failed. Startup failures carry the
//! captured output of the target process for diagnosis.

// ============================================================================
// SECTION: Imports
// ============================================================================

use capi_harness_config::ConfigError;
use capi_harness_core::ApplicationError;
use thiserror::Error;

// ============================================================================
// SECTION: Supervisor Errors
// ============================================================================

/// Failures while launching, probing, or terminating the target process.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The target binary could not be resolved.
    #[error("target binary not found: {binary}")]
    BinaryNotFound {
        /// Binary name or path as requested.
        binary: String,
    },
    /// The OS refused to spawn the process.
    #[error("failed to spawn target {binary}: {message}")]
    Spawn {
        /// Resolved binary path.
        binary: String,
        /// Underlying spawn error.
        message: String,
    },
    /// Filesystem or client setup failed around the launch.
    #[error("supervisor io error: {0}")]
    Io(String),
    /// The process exited before reporting healthy.
    #[error("target exited early ({status}) after {attempts} health checks; output:\n{output}")]
    ExitedEarly {
        /// Exit status description.
        status: String,
        /// Health-check attempts made.
        attempts: u32,
        /// Captured process output.
        output: String,
    },
    /// The health endpoint never returned 200 within the retry budget.
    #[error(
        "target not ready at {url} after {attempts} attempts (last: {last}); output:\n{output}"
    )]
    HealthCheckExhausted {
        /// Health URL polled.
        url: String,
        /// Attempts made.
        attempts: u32,
        /// Last observed outcome.
        last: String,
        /// Captured process output.
        output: String,
    },
    /// Killing or reaping the process failed.
    #[error("failed to terminate target pid {pid}: {message}")]
    Terminate {
        /// Process id.
        pid: u32,
        /// Underlying error.
        message: String,
    },
}

// ============================================================================
// SECTION: Client Errors
// ============================================================================

/// Failures while issuing a request against the target.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The base URL or request path did not form a valid URL.
    #[error("invalid target url {url}: {message}")]
    InvalidUrl {
        /// Offending URL text.
        url: String,
        /// Parse error.
        message: String,
    },
    /// The request body could not be serialized.
    #[error("failed to encode request body: {0}")]
    Encode(String),
    /// The request never produced a response.
    #[error("{method} {path} failed: {source}")]
    Transport {
        /// HTTP method.
        method: String,
        /// Request path.
        path: String,
        /// Transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The response body could not be read.
    #[error("failed to read response body (status {status}): {source}")]
    BodyRead {
        /// Response status.
        status: u16,
        /// Transport error.
        #[source]
        source: reqwest::Error,
    },
    /// A 2xx body did not decode into the expected type.
    #[error("failed to decode response body (status {status}): {message}")]
    Decode {
        /// Response status.
        status: u16,
        /// Decode error.
        message: String,
    },
}

// ============================================================================
// SECTION: Identity Errors
// ============================================================================

/// Failures while minting or verifying bearer tokens.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Token signing failed.
    #[error("failed to sign token: {0}")]
    Sign(String),
    /// Token verification failed.
    #[error("token rejected: {0}")]
    Verify(String),
    /// The header value was not a bearer token.
    #[error("authorization value is not a bearer token")]
    Malformed,
}

// ============================================================================
// SECTION: Harness Errors
// ============================================================================

/// Aggregate error returned by harness entry points.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Config synthesis failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Process launch or readiness failed.
    #[error(transparent)]
    Startup(#[from] SupervisorError),
    /// A request could not be issued.
    #[error(transparent)]
    Client(#[from] ClientError),
    /// A response carried an unexpected status.
    #[error(transparent)]
    Application(#[from] ApplicationError),
    /// Token minting failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),
    /// Environment configuration was invalid.
    #[error("harness environment error: {0}")]
    Env(String),
    /// Run directory management failed.
    #[error("harness io error: {0}")]
    Io(String),
}
