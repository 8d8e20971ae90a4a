// crates/capi-harness/src/client.rs
// ============================================================================
// Module: Target Client
// Description: Authenticated JSON request helper for the target under test.
// Purpose: Issue requests with optional bearer tokens and typed decoding.
// Dependencies: reqwest, serde, serde_json, capi-harness-core
// ============================================================================

//! ## Overview
//! [`TargetClient`] sends one request per call against `base_url + path`.
//! A JSON body sets `Content-Type: application/json`; a non-empty token is
//! sent verbatim as the `Authorization` header. Response bodies are decoded
//! only for 2xx statuses; other statuses surface through
//! [`TargetResponse::error`] without touching the body.

// ============================================================================
// SECTION: Imports
// ============================================================================

use capi_harness_core::ApplicationError;
use capi_harness_core::convert_status_code;
use reqwest::Client;
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde::de::IgnoredAny;
use url::Url;

use crate::error::ClientError;

// ============================================================================
// SECTION: HTTP Client
// ============================================================================

/// Builds an HTTP client that never routes through environment proxies.
///
/// # Errors
///
/// Returns the underlying builder error when TLS or resolver setup fails.
pub fn loopback_client() -> Result<Client, reqwest::Error> {
    Client::builder().no_proxy().build()
}

// ============================================================================
// SECTION: Responses
// ============================================================================

/// Response from a target request.
#[derive(Debug, Clone)]
pub struct TargetResponse<T> {
    status: StatusCode,
    body: Option<T>,
    raw: Vec<u8>,
}

impl<T> TargetResponse<T> {
    /// HTTP status returned by the target.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns true for any 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decoded body, present only for a 2xx response with a non-empty body.
    #[must_use]
    pub const fn body(&self) -> Option<&T> {
        self.body.as_ref()
    }

    /// Consumes the response and returns the decoded body.
    #[must_use]
    pub fn into_body(self) -> Option<T> {
        self.body
    }

    /// Raw response bytes, useful when asserting on error payloads.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Maps a non-2xx status to its application error.
    #[must_use]
    pub fn error(&self) -> Option<ApplicationError> {
        (!self.is_success()).then(|| convert_status_code(self.status.as_u16()))
    }

    /// Returns the body when the status equals `expected`.
    ///
    /// # Errors
    ///
    /// Returns the mapped [`ApplicationError`] for any other status.
    pub fn expect_status(self, expected: u16) -> Result<Option<T>, ApplicationError> {
        if self.status.as_u16() == expected {
            Ok(self.body)
        } else {
            Err(convert_status_code(self.status.as_u16()))
        }
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Request helper bound to one target base URL.
#[derive(Debug, Clone)]
pub struct TargetClient {
    base_url: String,
    client: Client,
}

impl TargetClient {
    /// Creates a client for `base_url` (scheme, host, and port).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] when `base_url` does not parse or
    /// the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let client = loopback_client().map_err(|err| ClientError::InvalidUrl {
            url: base_url.to_string(),
            message: err.to_string(),
        })?;
        Self::with_client(base_url, client)
    }

    /// Creates a client that reuses an existing [`reqwest::Client`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] when `base_url` does not parse.
    pub fn with_client(base_url: &str, client: Client) -> Result<Self, ClientError> {
        Url::parse(base_url).map_err(|err| ClientError::InvalidUrl {
            url: base_url.to_string(),
            message: err.to_string(),
        })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Base URL requests are issued against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins `path` onto the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] when the joined URL does not parse.
    pub fn url_for(&self, path: &str) -> Result<Url, ClientError> {
        let joined = format!("{}{path}", self.base_url);
        Url::parse(&joined).map_err(|err| ClientError::InvalidUrl {
            url: joined,
            message: err.to_string(),
        })
    }

    /// Sends a request and decodes a 2xx body into `T`.
    ///
    /// An empty `token` omits the `Authorization` header; a `None` body
    /// omits both the body and the `Content-Type` header.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the URL is invalid, the body cannot be
    /// encoded, the transport fails, or a 2xx body does not decode.
    pub async fn send<B, T>(
        &self,
        method: Method,
        path: &str,
        token: &str,
        body: Option<&B>,
    ) -> Result<TargetResponse<T>, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url_for(path)?;
        let mut request = self.client.request(method.clone(), url);
        if !token.is_empty() {
            request = request.header(AUTHORIZATION, token);
        }
        if let Some(body) = body {
            let bytes =
                serde_json::to_vec(body).map_err(|err| ClientError::Encode(err.to_string()))?;
            request = request.header(CONTENT_TYPE, "application/json").body(bytes);
        }
        let response = request.send().await.map_err(|source| ClientError::Transport {
            method: method.to_string(),
            path: path.to_string(),
            source,
        })?;
        let status = response.status();
        let raw = response
            .bytes()
            .await
            .map_err(|source| ClientError::BodyRead {
                status: status.as_u16(),
                source,
            })?
            .to_vec();
        let body = if status.is_success() && !raw.is_empty() {
            let decoded = serde_json::from_slice(&raw).map_err(|err| ClientError::Decode {
                status: status.as_u16(),
                message: err.to_string(),
            })?;
            Some(decoded)
        } else {
            None
        };
        Ok(TargetResponse {
            status,
            body,
            raw,
        })
    }

    /// Issues a GET.
    ///
    /// # Errors
    ///
    /// See [`TargetClient::send`].
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
    ) -> Result<TargetResponse<T>, ClientError> {
        self.send::<(), T>(Method::GET, path, token, None).await
    }

    /// Issues a POST with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`TargetClient::send`].
    pub async fn post<B, T>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<TargetResponse<T>, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::POST, path, token, Some(body)).await
    }

    /// Issues a PUT with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`TargetClient::send`].
    pub async fn put<B, T>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<TargetResponse<T>, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::PUT, path, token, Some(body)).await
    }

    /// Issues a DELETE, discarding any response body.
    ///
    /// # Errors
    ///
    /// See [`TargetClient::send`].
    pub async fn delete(
        &self,
        path: &str,
        token: &str,
    ) -> Result<TargetResponse<IgnoredAny>, ClientError> {
        self.send::<(), IgnoredAny>(Method::DELETE, path, token, None).await
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
