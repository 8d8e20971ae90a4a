// crates/capi-harness/src/identity.rs
// ============================================================================
// Module: Identity Issuer
// Description: Signed bearer tokens trusted by the target under test.
// Purpose: Mint standard and admin tokens without a live identity provider.
// Dependencies: jsonwebtoken, serde, uuid, capi-harness-config
// ============================================================================

//! ## Overview
//! The target is configured to trust a symmetric signing key and an issuer
//! URL. [`IdentityIssuer`] signs HS256 tokens with that key so tests can act
//! as a standard user or an administrator. Every token carries the read,
//! write, and `openid` scopes; admin tokens add `cloud_controller.admin`.
//! Tokens expire 50 years after issue so they never lapse mid-run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use capi_harness_config::TargetSetting;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::error::IdentityError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default symmetric signing key shared with the target.
pub const DEFAULT_SIGNING_KEY: &str = "tokensecret";

/// Default issuer URL the target trusts.
pub const DEFAULT_ISSUER: &str = "http://localhost:6789";

/// Default audience (the target's resource id).
pub const DEFAULT_AUDIENCE: &str = "cloud_controller";

/// Scopes granted to every token.
pub const STANDARD_SCOPES: [&str; 3] = ["openid", "cloud_controller.read", "cloud_controller.write"];

/// Scope that elevates a token to administrator.
pub const ADMIN_SCOPE: &str = "cloud_controller.admin";

/// Client id stamped on minted tokens.
const CLIENT_ID: &str = "cf";

/// Token lifetime.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(50 * 365 * 24 * 60 * 60);

// ============================================================================
// SECTION: Trust Configuration
// ============================================================================

/// Trust material the target is configured with.
#[derive(Clone, PartialEq, Eq)]
pub struct TrustConfig {
    /// Symmetric HS256 key.
    pub signing_key: String,
    /// Issuer URL (`iss` claim and the target's identity-provider URL).
    pub issuer: String,
    /// Audience the target validates (`aud` claim).
    pub audience: String,
}

impl std::fmt::Debug for TrustConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustConfig")
            .field("signing_key", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNING_KEY, DEFAULT_ISSUER)
    }
}

impl TrustConfig {
    /// Builds trust material with the default audience.
    #[must_use]
    pub fn new(signing_key: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            signing_key: signing_key.into(),
            issuer: issuer.into(),
            audience: DEFAULT_AUDIENCE.to_string(),
        }
    }

    /// Overrides the audience.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    /// Config settings that make the target trust these tokens.
    ///
    /// `uaa.url` always carries the issuer so minted `iss` claims match.
    /// `provider_url` only moves `uaa.internal_url`, where the target looks
    /// up the identity provider; it defaults to the issuer.
    #[must_use]
    pub fn settings(&self, provider_url: Option<&str>) -> Vec<TargetSetting> {
        let provider = provider_url.unwrap_or(&self.issuer).to_string();
        vec![
            TargetSetting::UaaUrl(self.issuer.clone()),
            TargetSetting::UaaInternalUrl(provider),
            TargetSetting::UaaSymmetricSecret(self.signing_key.clone()),
            TargetSetting::UaaResourceId(self.audience.clone()),
        ]
    }
}

// ============================================================================
// SECTION: Claims
// ============================================================================

/// Claims carried by a minted token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Unique token id.
    pub jti: String,
    /// Subject (user id).
    pub sub: String,
    /// Granted scopes.
    pub scope: Vec<String>,
    /// OAuth client id.
    pub client_id: String,
    /// Client id (legacy claim).
    pub cid: String,
    /// Authorized party.
    pub azp: String,
    /// Grant type.
    pub grant_type: String,
    /// User id.
    pub user_id: String,
    /// Identity origin.
    pub origin: String,
    /// User name.
    pub user_name: String,
    /// Email address.
    pub email: String,
    /// Revocation signature.
    pub rev_sig: String,
    /// Identity zone.
    pub zid: String,
    /// Audiences.
    pub aud: Vec<String>,
    /// Issued-at (seconds since epoch).
    pub iat: u64,
    /// Expiry (seconds since epoch).
    pub exp: u64,
    /// Issuer.
    pub iss: String,
}

impl TokenClaims {
    /// Returns true when the claims include the admin scope.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.scope.iter().any(|scope| scope == ADMIN_SCOPE)
    }
}

/// Scopes for a standard or admin token.
#[must_use]
pub fn scopes_for(is_admin: bool) -> Vec<String> {
    let mut scopes: Vec<String> = STANDARD_SCOPES.iter().map(ToString::to_string).collect();
    if is_admin {
        scopes.push(ADMIN_SCOPE.to_string());
    }
    scopes
}

// ============================================================================
// SECTION: Tokens
// ============================================================================

/// A signed token plus the claims it was minted with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    /// Compact JWS (`header.payload.signature`).
    pub jwt: String,
    /// Claims encoded in `jwt`.
    pub claims: TokenClaims,
}

impl AuthToken {
    /// Authorization header value: `bearer <jwt>`.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("bearer {}", self.jwt)
    }
}

/// Test identity: a unique id and the bearer value that authenticates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestActor {
    /// Unique user id.
    pub id: String,
    /// `bearer <jwt>` header value.
    pub access_token: String,
}

/// Returns `<prefix>-<uuid>`, unique per call.
#[must_use]
pub fn random_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

// ============================================================================
// SECTION: Issuer
// ============================================================================

/// Mints and verifies tokens for one trust configuration.
#[derive(Clone)]
pub struct IdentityIssuer {
    trust: TrustConfig,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for IdentityIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityIssuer").field("trust", &self.trust).finish_non_exhaustive()
    }
}

impl IdentityIssuer {
    /// Creates an issuer for `trust`.
    #[must_use]
    pub fn new(trust: TrustConfig) -> Self {
        let encoding = EncodingKey::from_secret(trust.signing_key.as_bytes());
        let decoding = DecodingKey::from_secret(trust.signing_key.as_bytes());
        Self {
            trust,
            encoding,
            decoding,
        }
    }

    /// Trust material this issuer signs with.
    #[must_use]
    pub const fn trust(&self) -> &TrustConfig {
        &self.trust
    }

    /// Mints a token for `subject`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Sign`] when signing fails.
    pub fn mint(&self, subject: &str, is_admin: bool) -> Result<AuthToken, IdentityError> {
        let iat = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        let claims = TokenClaims {
            jti: Uuid::new_v4().simple().to_string(),
            sub: subject.to_string(),
            scope: scopes_for(is_admin),
            client_id: CLIENT_ID.to_string(),
            cid: CLIENT_ID.to_string(),
            azp: CLIENT_ID.to_string(),
            grant_type: "password".to_string(),
            user_id: subject.to_string(),
            origin: "uaa".to_string(),
            user_name: subject.to_string(),
            email: format!("{subject}@harness.test"),
            rev_sig: Uuid::new_v4().simple().to_string()[.. 8].to_string(),
            zid: "uaa".to_string(),
            aud: vec![
                self.trust.audience.clone(),
                "password".to_string(),
                CLIENT_ID.to_string(),
                "openid".to_string(),
            ],
            iat,
            exp: iat.saturating_add(TOKEN_LIFETIME.as_secs()),
            iss: self.trust.issuer.clone(),
        };
        let jwt = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| IdentityError::Sign(err.to_string()))?;
        Ok(AuthToken {
            jwt,
            claims,
        })
    }

    /// Mints a token and returns the `bearer <jwt>` header value.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Sign`] when signing fails.
    pub fn issue_token(&self, subject: &str, is_admin: bool) -> Result<String, IdentityError> {
        self.mint(subject, is_admin).map(|token| token.bearer())
    }

    /// Creates a fresh actor with id `<prefix>-<uuid>`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Sign`] when signing fails.
    pub fn actor(&self, prefix: &str, is_admin: bool) -> Result<TestActor, IdentityError> {
        let id = random_id(prefix);
        let access_token = self.issue_token(&id, is_admin)?;
        Ok(TestActor {
            id,
            access_token,
        })
    }

    /// Verifies a bearer value (or bare JWT) against this trust material.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Malformed`] for an empty value and
    /// [`IdentityError::Verify`] when the signature, issuer, audience, or
    /// expiry does not check out.
    pub fn verify(&self, authorization: &str) -> Result<TokenClaims, IdentityError> {
        let jwt = strip_bearer(authorization).ok_or(IdentityError::Malformed)?;
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.trust.issuer.as_str()]);
        validation.set_audience(&[self.trust.audience.as_str()]);
        jsonwebtoken::decode::<TokenClaims>(jwt, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| IdentityError::Verify(err.to_string()))
    }
}

/// Strips a case-insensitive `bearer ` prefix; returns `None` when empty.
#[must_use]
pub fn strip_bearer(value: &str) -> Option<&str> {
    let value = value.trim();
    let jwt = match value.get(.. 7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => value[7 ..].trim_start(),
        _ => value,
    };
    (!jwt.is_empty()).then_some(jwt)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
