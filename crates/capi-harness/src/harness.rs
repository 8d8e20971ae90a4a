// crates/capi-harness/src/harness.rs
// ============================================================================
// Module: Harness
// Description: One disposable target instance per test.
// Purpose: Synthesize config, launch, gate on readiness, and tear down.
// Dependencies: capi-harness-config, capi-harness-core, tempfile
// ============================================================================

//! ## Overview
//! [`Harness::dial`] runs the full bring-up sequence:
//! 1. pick a port (fixed or freshly allocated),
//! 2. synthesize a config with the port, trust material, and peer URLs,
//! 3. spawn `<binary> -c <config>`,
//! 4. poll the health endpoint until it returns 200.
//!
//! Any failure after the config exists removes it and kills the process, so
//! a failed dial leaves nothing running. [`Harness::kill`] tears down a
//! healthy instance; dropping the harness does the same best-effort.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use capi_harness_config::BASE_TEMPLATE;
use capi_harness_config::ConfigOverlay;
use capi_harness_config::ConfigSynthesizer;
use capi_harness_config::SynthesizedConfig;
use capi_harness_core::HarnessEvent;
use capi_harness_core::HarnessEventSink;
use capi_harness_core::events::detail;
use serde_json::json;
use tempfile::TempDir;

use crate::client::TargetClient;
use crate::error::HarnessError;
use crate::identity::IdentityIssuer;
use crate::identity::TestActor;
use crate::options::HarnessOptions;
use crate::supervisor::LaunchSpec;
use crate::supervisor::OrchestratedProcess;
use crate::supervisor::ProcessSupervisor;
use crate::supervisor::allocate_port;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Component label used in harness events.
const COMPONENT: &str = "harness";

// ============================================================================
// SECTION: Run Directory
// ============================================================================

/// Directory holding one instance's config and output log.
#[derive(Debug)]
enum RunDir {
    /// Private temp dir deleted with the harness.
    Temp(TempDir),
    /// Caller-provided directory that outlives the harness.
    Fixed(PathBuf),
}

impl RunDir {
    fn prepare(root: Option<&Path>) -> Result<Self, HarnessError> {
        match root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|err| {
                    HarnessError::Io(format!("failed to create {}: {err}", root.display()))
                })?;
                Ok(Self::Fixed(root.to_path_buf()))
            }
            None => tempfile::Builder::new()
                .prefix("capi-harness-")
                .tempdir()
                .map(Self::Temp)
                .map_err(|err| HarnessError::Io(format!("failed to create run dir: {err}"))),
        }
    }

    fn path(&self) -> &Path {
        match self {
            Self::Temp(dir) => dir.path(),
            Self::Fixed(path) => path,
        }
    }
}

// ============================================================================
// SECTION: Harness
// ============================================================================

/// A healthy target process plus the config, client, and issuer bound to it.
pub struct Harness {
    process: Option<OrchestratedProcess>,
    config: SynthesizedConfig,
    client: TargetClient,
    issuer: IdentityIssuer,
    port: u16,
    sink: Arc<dyn HarnessEventSink>,
    run_dir: RunDir,
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("process", &self.process)
            .field("config", &self.config.path())
            .field("base_url", &self.client.base_url())
            .field("run_dir", &self.run_dir.path())
            .finish_non_exhaustive()
    }
}

impl Harness {
    /// Launches a target and waits for it to report healthy.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] when synthesis fails,
    /// [`HarnessError::Startup`] when the binary is missing, exits early, or
    /// never turns healthy, and [`HarnessError::Io`] when the run directory
    /// cannot be prepared.
    pub async fn dial(options: HarnessOptions) -> Result<Self, HarnessError> {
        let sink = Arc::clone(&options.event_sink);
        let port = match options.port {
            Some(port) => port,
            None => allocate_port()?,
        };
        let run_dir = RunDir::prepare(options.run_root.as_deref())?;
        let synthesizer = match &options.template_path {
            Some(path) => ConfigSynthesizer::from_template_file(path)?,
            None => ConfigSynthesizer::new(BASE_TEMPLATE),
        }
        .with_output_dir(run_dir.path());

        let mut overlay = ConfigOverlay::new();
        for setting in options.harness_settings(port) {
            overlay.push_setting(setting)?;
        }
        let HarnessOptions {
            target_binary,
            working_dir,
            host,
            health_path,
            readiness,
            trust,
            overlay: caller_overlay,
            ..
        } = options;
        let base_url = format!("http://{host}:{port}");
        let client = TargetClient::new(&base_url)?;

        let config = synthesizer.synthesize(overlay.extend(caller_overlay))?;
        sink.record(&HarnessEvent::ok(
            COMPONENT,
            "config_synthesized",
            detail([
                ("path", json!(config.path().display().to_string())),
                ("port", json!(port)),
            ]),
        ));

        let spec = LaunchSpec::new(
            target_binary,
            config.path(),
            port,
            run_dir.path().join(format!("target-{port}.log")),
        )
        .with_working_dir(working_dir);
        let mut process = match ProcessSupervisor::new(Arc::clone(&sink)).start(&spec) {
            Ok(process) => process,
            Err(err) => {
                discard_config(&config, sink.as_ref());
                return Err(err.into());
            }
        };

        let health_url = format!("{base_url}{health_path}");
        if let Err(err) = process.wait_ready(&health_url, readiness).await {
            // A failed kill is recorded by `kill`; the readiness error wins.
            let _ = process.kill();
            discard_config(&config, sink.as_ref());
            return Err(err.into());
        }

        Ok(Self {
            process: Some(process),
            config,
            client,
            issuer: IdentityIssuer::new(trust),
            port,
            sink,
            run_dir,
        })
    }

    /// Request helper bound to this instance.
    #[must_use]
    pub const fn client(&self) -> &TargetClient {
        &self.client
    }

    /// Token issuer trusted by this instance.
    #[must_use]
    pub const fn issuer(&self) -> &IdentityIssuer {
        &self.issuer
    }

    /// Mints a fresh actor trusted by this instance.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Identity`] when signing fails.
    pub fn actor(&self, prefix: &str, is_admin: bool) -> Result<TestActor, HarnessError> {
        Ok(self.issuer.actor(prefix, is_admin)?)
    }

    /// Port the target listens on.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// `http://host:port` of the target.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    /// Config file the target was launched with.
    #[must_use]
    pub fn config_path(&self) -> &Path {
        self.config.path()
    }

    /// Synthesized config (path and parsed document).
    #[must_use]
    pub const fn config(&self) -> &SynthesizedConfig {
        &self.config
    }

    /// Directory holding the config and output log.
    #[must_use]
    pub fn run_dir(&self) -> &Path {
        self.run_dir.path()
    }

    /// Captured target output so far.
    #[must_use]
    pub fn output(&self) -> String {
        self.process.as_ref().map(OrchestratedProcess::output).unwrap_or_default()
    }

    /// Returns true while the target process has not exited.
    pub fn is_running(&mut self) -> bool {
        self.process.as_mut().is_some_and(|process| process.try_exit_status().is_none())
    }

    /// Kills the target and removes its config.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Startup`] when the process cannot be killed or
    /// [`HarnessError::Config`] when the config cannot be removed. Removal is
    /// attempted even when the kill fails.
    pub fn kill(mut self) -> Result<(), HarnessError> {
        let killed = self.process.take().map_or(Ok(()), OrchestratedProcess::kill);
        let removed = self.config.remove();
        if removed.is_ok() {
            record_config_removed(&self.config, self.sink.as_ref());
        }
        killed?;
        removed?;
        Ok(())
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        if let Some(process) = self.process.take() {
            drop(process);
            discard_config(&self.config, self.sink.as_ref());
        }
    }
}

/// Best-effort config removal used on failure and drop paths.
fn discard_config(config: &SynthesizedConfig, sink: &dyn HarnessEventSink) {
    if config.remove().is_ok() {
        record_config_removed(config, sink);
    }
}

fn record_config_removed(config: &SynthesizedConfig, sink: &dyn HarnessEventSink) {
    sink.record(&HarnessEvent::ok(
        COMPONENT,
        "config_removed",
        detail([("path", json!(config.path().display().to_string()))]),
    ));
}

// ============================================================================
// SECTION: Tests
// ============================================================================
