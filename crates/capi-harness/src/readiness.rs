// crates/capi-harness/src/readiness.rs
// ============================================================================
// Module: Readiness Probing
// Description: Bounded health polling for a freshly launched target.
// Purpose: Gate test execution on a 200 from the health endpoint.
// Dependencies: reqwest, tokio, thiserror
// ============================================================================

//! ## Overview
//! The readiness loop issues a GET against the health URL up to
//! `max_retries` times, sleeping `interval` between attempts. Only HTTP 200
//! counts as ready; any other status or transport error counts as not yet
//! ready. No sleep follows the final attempt.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use reqwest::Client;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::time::sleep;

use crate::client::loopback_client;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Default number of health-check attempts.
pub const DEFAULT_HEALTH_RETRIES: u32 = 100;

/// Default delay between health-check attempts.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_millis(200);

/// Retry budget for readiness polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Maximum number of GET attempts.
    pub max_retries: u32,
    /// Delay between attempts.
    pub interval: Duration,
}

impl ReadinessPolicy {
    /// Builds a policy from explicit values.
    #[must_use]
    pub const fn new(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
        }
    }

    /// Upper bound on time spent sleeping between attempts.
    #[must_use]
    pub fn sleep_budget(&self) -> Duration {
        self.interval.saturating_mul(self.max_retries.saturating_sub(1))
    }
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_HEALTH_RETRIES, DEFAULT_HEALTH_INTERVAL)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Readiness polling failures.
#[derive(Debug, Error)]
pub enum ReadinessError {
    /// The probe client could not be built.
    #[error("failed to build health client: {0}")]
    Client(String),
    /// All attempts were spent without a 200.
    #[error("health check {url} failed after {attempts} attempts (last: {last})")]
    Exhausted {
        /// Health URL polled.
        url: String,
        /// Attempts made.
        attempts: u32,
        /// Last observed outcome.
        last: String,
    },
    /// The abort probe reported the process gone.
    #[error("process exited ({status}) after {attempts} health check attempts")]
    Aborted {
        /// Reason reported by the abort probe.
        status: String,
        /// Attempts made.
        attempts: u32,
    },
}

// ============================================================================
// SECTION: Polling
// ============================================================================

/// Polls `url` until it returns 200 or the policy is exhausted.
///
/// Returns the number of attempts made, including the successful one.
///
/// # Errors
///
/// Returns [`ReadinessError::Exhausted`] after `max_retries` failed attempts.
pub async fn wait_ready(url: &str, policy: ReadinessPolicy) -> Result<u32, ReadinessError> {
    let client = loopback_client().map_err(|err| ReadinessError::Client(err.to_string()))?;
    poll_health(&client, url, policy, || None).await
}

/// Polls `url` with a caller-supplied abort probe checked after each miss.
///
/// The probe returns `Some(reason)` once polling should stop early, for
/// example when the process under test has exited.
///
/// # Errors
///
/// Returns [`ReadinessError::Aborted`] when the probe fires, otherwise
/// [`ReadinessError::Exhausted`] once the budget is spent.
pub async fn poll_health<F>(
    client: &Client,
    url: &str,
    policy: ReadinessPolicy,
    mut abort: F,
) -> Result<u32, ReadinessError>
where
    F: FnMut() -> Option<String>,
{
    let mut last = String::from("no attempts made");
    for attempt in 1 ..= policy.max_retries {
        match client.get(url).send().await {
            Ok(response) if response.status() == StatusCode::OK => return Ok(attempt),
            Ok(response) => last = format!("status {}", response.status().as_u16()),
            Err(err) => last = format!("transport error: {err}"),
        }
        if let Some(status) = abort() {
            return Err(ReadinessError::Aborted {
                status,
                attempts: attempt,
            });
        }
        if attempt < policy.max_retries {
            sleep(policy.interval).await;
        }
    }
    Err(ReadinessError::Exhausted {
        url: url.to_string(),
        attempts: policy.max_retries,
        last,
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        reason = "Test-only assertions favor direct unwrap/expect for clarity."
    )]

    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use axum::Router;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::get;

    use super::ReadinessError;
    use super::ReadinessPolicy;
    use super::poll_health;
    use super::wait_ready;
    use crate::client::loopback_client;

    /// Serves `/v2/info`, failing with 503 until `ready_after` requests arrive.
    async fn counting_server(ready_after: u32) -> (String, Arc<AtomicU32>) {
        let hits = Arc::new(AtomicU32::new(0));
        let app = Router::new()
            .route(
                "/v2/info",
                get(|State((hits, ready_after)): State<(Arc<AtomicU32>, u32)>| async move {
                    let seen = hits.fetch_add(1, Ordering::SeqCst) + 1;
                    if seen >= ready_after {
                        StatusCode::OK
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                }),
            )
            .with_state((Arc::clone(&hits), ready_after));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{addr}/v2/info"), hits)
    }

    #[tokio::test]
    async fn succeeds_once_endpoint_turns_healthy() {
        let (url, hits) = counting_server(3).await;
        let attempts =
            wait_ready(&url, ReadinessPolicy::new(3, Duration::from_millis(10))).await.unwrap();
        assert_eq!(attempts, 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_exact_attempt_budget() {
        let (url, hits) = counting_server(u32::MAX).await;
        let err =
            wait_ready(&url, ReadinessPolicy::new(4, Duration::from_millis(5))).await.unwrap_err();
        match err {
            ReadinessError::Exhausted {
                attempts,
                last,
                ..
            } => {
                assert_eq!(attempts, 4);
                assert_eq!(last, "status 503");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn non_ok_success_codes_are_not_ready() {
        let app = Router::new().route("/v2/info", get(|| async { StatusCode::NO_CONTENT }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        let url = format!("http://{addr}/v2/info");
        let result = wait_ready(&url, ReadinessPolicy::new(2, Duration::from_millis(1))).await;
        assert!(matches!(result, Err(ReadinessError::Exhausted { attempts: 2, .. })));
    }

    #[tokio::test]
    async fn abort_probe_stops_polling() {
        let (url, hits) = counting_server(u32::MAX).await;
        let client = loopback_client().unwrap();
        let mut calls = 0;
        let result = poll_health(&client, &url, ReadinessPolicy::default(), || {
            calls += 1;
            (calls == 2).then(|| "exit status: 1".to_string())
        })
        .await;
        assert!(matches!(result, Err(ReadinessError::Aborted { attempts: 2, .. })));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn connection_refused_counts_as_not_ready() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = format!("http://{addr}/v2/info");
        let err =
            wait_ready(&url, ReadinessPolicy::new(2, Duration::from_millis(1))).await.unwrap_err();
        assert!(err.to_string().contains("transport error"));
    }

    #[test]
    fn default_policy_matches_documented_budget() {
        let policy = ReadinessPolicy::default();
        assert_eq!(policy.max_retries, 100);
        assert_eq!(policy.interval, Duration::from_millis(200));
        assert_eq!(policy.sleep_budget(), Duration::from_millis(200 * 99));
    }
}
