// crates/capi-harness/src/config/env.rs
// ============================================================================
// Module: Harness Environment
// Description: Environment-backed configuration for harness bootstrap.
// Purpose: Centralize env parsing with strict UTF-8 validation.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Test suites locate the target binary and its base template through
//! environment variables. Values are parsed with strict UTF-8 enforcement to
//! avoid silent misconfiguration; invalid or empty values fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// Environment keys for harness configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessEnv {
    /// Target binary path or bare name resolved on `PATH`.
    TargetBinary,
    /// Base config template path.
    TargetConfig,
    /// Working directory for the target process.
    WorkingDir,
    /// Directory receiving synthesized configs and process output.
    RunRoot,
    /// Health-check attempt budget (positive integer).
    HealthRetries,
    /// Health-check interval in milliseconds (positive integer).
    HealthIntervalMs,
    /// Scheduler endpoint injected into the target config.
    SchedulerUrl,
}

impl HarnessEnv {
    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TargetBinary => "CAPI_HARNESS_TARGET_BINARY",
            Self::TargetConfig => "CAPI_HARNESS_TARGET_CONFIG",
            Self::WorkingDir => "CAPI_HARNESS_WORKING_DIR",
            Self::RunRoot => "CAPI_HARNESS_RUN_ROOT",
            Self::HealthRetries => "CAPI_HARNESS_HEALTH_RETRIES",
            Self::HealthIntervalMs => "CAPI_HARNESS_HEALTH_INTERVAL_MS",
            Self::SchedulerUrl => "CAPI_HARNESS_SCHEDULER_URL",
        }
    }
}

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Typed harness configuration derived from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HarnessEnvConfig {
    /// Optional target binary override.
    pub target_binary: Option<PathBuf>,
    /// Optional base template path.
    pub target_config: Option<PathBuf>,
    /// Optional working directory.
    pub working_dir: Option<PathBuf>,
    /// Optional run root.
    pub run_root: Option<PathBuf>,
    /// Optional health-check attempt budget.
    pub health_retries: Option<u32>,
    /// Optional health-check interval.
    pub health_interval: Option<Duration>,
    /// Optional scheduler URL.
    pub scheduler_url: Option<String>,
}

impl HarnessEnvConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when an environment value is not valid UTF-8, is empty,
    /// or fails validation (for example, a zero or non-numeric retry count).
    pub fn load() -> Result<Self, String> {
        let path = |key: HarnessEnv| -> Result<Option<PathBuf>, String> {
            Ok(read_env_nonempty(key.as_str())?.map(PathBuf::from))
        };
        let health_retries = read_env_nonempty(HarnessEnv::HealthRetries.as_str())?
            .map(|value| {
                let name = HarnessEnv::HealthRetries.as_str();
                let retries = parse_positive(name, &value)?;
                u32::try_from(retries).map_err(|_| format!("{name} must be a positive integer"))
            })
            .transpose()?;
        let health_interval = read_env_nonempty(HarnessEnv::HealthIntervalMs.as_str())?
            .map(|value| parse_positive(HarnessEnv::HealthIntervalMs.as_str(), &value))
            .transpose()?
            .map(Duration::from_millis);
        Ok(Self {
            target_binary: path(HarnessEnv::TargetBinary)?,
            target_config: path(HarnessEnv::TargetConfig)?,
            working_dir: path(HarnessEnv::WorkingDir)?,
            run_root: path(HarnessEnv::RunRoot)?,
            health_retries,
            health_interval,
            scheduler_url: read_env_nonempty(HarnessEnv::SchedulerUrl.as_str())?,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads an environment variable and enforces UTF-8 validity.
///
/// # Errors
///
/// Returns an error when the environment variable contains invalid UTF-8.
pub fn read_env_strict(name: &str) -> Result<Option<String>, String> {
    std::env::var_os(name).map_or(Ok(None), |raw| {
        raw.into_string().map(Some).map_err(|_| format!("{name} must be valid UTF-8"))
    })
}

/// Reads an environment variable and rejects empty values.
fn read_env_nonempty(name: &str) -> Result<Option<String>, String> {
    match read_env_strict(name)? {
        Some(value) if value.trim().is_empty() => Err(format!("{name} must not be empty")),
        Some(value) => Ok(Some(value)),
        None => Ok(None),
    }
}

/// Parses a positive integer from an environment variable string.
fn parse_positive(name: &str, raw: &str) -> Result<u64, String> {
    let value: u64 =
        raw.trim().parse().map_err(|_| format!("{name} must be a positive integer"))?;
    if value == 0 {
        return Err(format!("{name} must be greater than zero"));
    }
    Ok(value)
}
