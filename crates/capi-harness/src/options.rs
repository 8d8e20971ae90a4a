// crates/capi-harness/src/options.rs
// ============================================================================
// Module: Harness Options
// Description: Builder-style inputs for `Harness::dial`.
// Purpose: Collect binary, template, trust, and peer settings in one place.
// Dependencies: capi-harness-config, capi-harness-core
// ============================================================================

//! ## Overview
//! [`HarnessOptions`] starts from defaults that match the built-in base
//! template and a target binary named `cloud_controller` on `PATH`.
//! [`HarnessOptions::from_env`] layers the `CAPI_HARNESS_*` environment
//! variables on top. Extra overrides are applied after the harness's own,
//! so callers win on conflicting keys.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use capi_harness_config::ConfigOverlay;
use capi_harness_config::TargetSetting;
use capi_harness_core::HarnessEventSink;
use capi_harness_core::NoopEventSink;

use crate::config::HarnessEnvConfig;
use crate::error::HarnessError;
use crate::identity::TrustConfig;
use crate::readiness::ReadinessPolicy;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Binary name resolved on `PATH` when no binary is configured.
pub const DEFAULT_TARGET_BINARY: &str = "cloud_controller";

/// Health endpoint polled after launch.
pub const DEFAULT_HEALTH_PATH: &str = "/v2/info";

/// Loopback host the target is reached on.
pub const DEFAULT_HOST: &str = "127.0.0.1";

// ============================================================================
// SECTION: Policy Service
// ============================================================================

/// Connection settings for an external policy service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyServiceOptions {
    /// Hostname the target dials.
    pub hostname: String,
    /// Port the target dials.
    pub port: u16,
    /// CA certificate path used to verify the service.
    pub ca_cert_path: PathBuf,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl PolicyServiceOptions {
    /// Config settings enabling the policy service on the target.
    #[must_use]
    pub fn settings(&self) -> Vec<TargetSetting> {
        vec![
            TargetSetting::PermEnabled(true),
            TargetSetting::PermHostname(self.hostname.clone()),
            TargetSetting::PermPort(self.port),
            TargetSetting::PermCaCertPath(self.ca_cert_path.display().to_string()),
            TargetSetting::PermTimeoutMs(
                u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            ),
        ]
    }
}

// ============================================================================
// SECTION: Options
// ============================================================================

/// Inputs for one harness instance.
pub struct HarnessOptions {
    /// Binary path or bare name.
    pub target_binary: PathBuf,
    /// Base template file; `None` uses the built-in template.
    pub template_path: Option<PathBuf>,
    /// Working directory for the target.
    pub working_dir: Option<PathBuf>,
    /// Directory for configs and output; `None` uses a private temp dir.
    pub run_root: Option<PathBuf>,
    /// Host used for health checks and requests.
    pub host: String,
    /// Fixed port; `None` allocates a free one.
    pub port: Option<u16>,
    /// Health endpoint path.
    pub health_path: String,
    /// Readiness retry budget.
    pub readiness: ReadinessPolicy,
    /// Trust material for minted tokens.
    pub trust: TrustConfig,
    /// Identity-provider URL the target looks up; defaults to the issuer.
    pub identity_provider_url: Option<String>,
    /// Scheduler endpoint injected into the target config.
    pub scheduler_url: Option<String>,
    /// Optional policy service connection.
    pub policy_service: Option<PolicyServiceOptions>,
    /// Caller overrides applied after the harness's own.
    pub overlay: ConfigOverlay,
    /// Lifecycle event sink.
    pub event_sink: Arc<dyn HarnessEventSink>,
}

impl std::fmt::Debug for HarnessOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarnessOptions")
            .field("target_binary", &self.target_binary)
            .field("template_path", &self.template_path)
            .field("working_dir", &self.working_dir)
            .field("run_root", &self.run_root)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("health_path", &self.health_path)
            .field("readiness", &self.readiness)
            .field("trust", &self.trust)
            .field("identity_provider_url", &self.identity_provider_url)
            .field("scheduler_url", &self.scheduler_url)
            .field("policy_service", &self.policy_service)
            .field("overlay", &self.overlay)
            .finish_non_exhaustive()
    }
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            target_binary: PathBuf::from(DEFAULT_TARGET_BINARY),
            template_path: None,
            working_dir: None,
            run_root: None,
            host: DEFAULT_HOST.to_string(),
            port: None,
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            readiness: ReadinessPolicy::default(),
            trust: TrustConfig::default(),
            identity_provider_url: None,
            scheduler_url: None,
            policy_service: None,
            overlay: ConfigOverlay::new(),
            event_sink: Arc::new(NoopEventSink),
        }
    }
}

impl HarnessOptions {
    /// Options for `target_binary` with every other field defaulted.
    #[must_use]
    pub fn new(target_binary: impl Into<PathBuf>) -> Self {
        Self {
            target_binary: target_binary.into(),
            ..Self::default()
        }
    }

    /// Defaults overlaid with `CAPI_HARNESS_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Env`] when a variable is invalid.
    pub fn from_env() -> Result<Self, HarnessError> {
        let env = HarnessEnvConfig::load().map_err(HarnessError::Env)?;
        Ok(Self::default().with_env(env))
    }

    /// Applies every value present in `env`.
    #[must_use]
    pub fn with_env(mut self, env: HarnessEnvConfig) -> Self {
        if let Some(binary) = env.target_binary {
            self.target_binary = binary;
        }
        if let Some(template) = env.target_config {
            self.template_path = Some(template);
        }
        if let Some(dir) = env.working_dir {
            self.working_dir = Some(dir);
        }
        if let Some(root) = env.run_root {
            self.run_root = Some(root);
        }
        if let Some(retries) = env.health_retries {
            self.readiness.max_retries = retries;
        }
        if let Some(interval) = env.health_interval {
            self.readiness.interval = interval;
        }
        if let Some(url) = env.scheduler_url {
            self.scheduler_url = Some(url);
        }
        self
    }

    /// Sets the target binary.
    #[must_use]
    pub fn with_target_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.target_binary = binary.into();
        self
    }

    /// Sets the base template file.
    #[must_use]
    pub fn with_template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    /// Sets the target's working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets the run root.
    #[must_use]
    pub fn with_run_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.run_root = Some(dir.into());
        self
    }

    /// Pins the port instead of allocating one.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the readiness budget.
    #[must_use]
    pub const fn with_readiness(mut self, policy: ReadinessPolicy) -> Self {
        self.readiness = policy;
        self
    }

    /// Sets the trust material.
    #[must_use]
    pub fn with_trust(mut self, trust: TrustConfig) -> Self {
        self.trust = trust;
        self
    }

    /// Points the target at an identity-provider discovery endpoint.
    #[must_use]
    pub fn with_identity_provider_url(mut self, url: impl Into<String>) -> Self {
        self.identity_provider_url = Some(url.into());
        self
    }

    /// Points the target at a scheduler endpoint.
    #[must_use]
    pub fn with_scheduler_url(mut self, url: impl Into<String>) -> Self {
        self.scheduler_url = Some(url.into());
        self
    }

    /// Enables a policy service connection.
    #[must_use]
    pub fn with_policy_service(mut self, policy: PolicyServiceOptions) -> Self {
        self.policy_service = Some(policy);
        self
    }

    /// Appends caller overrides.
    #[must_use]
    pub fn with_overlay(mut self, overlay: ConfigOverlay) -> Self {
        self.overlay = self.overlay.extend(overlay);
        self
    }

    /// Sets the lifecycle event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn HarnessEventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Settings the harness injects before caller overrides.
    #[must_use]
    pub fn harness_settings(&self, port: u16) -> Vec<TargetSetting> {
        let mut settings = vec![TargetSetting::ExternalPort(port)];
        settings.extend(self.trust.settings(self.identity_provider_url.as_deref()));
        if let Some(policy) = &self.policy_service {
            settings.extend(policy.settings());
        }
        if let Some(url) = &self.scheduler_url {
            settings.push(TargetSetting::SchedulerUrl(url.clone()));
        }
        settings
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
