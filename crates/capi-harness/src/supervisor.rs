// crates/capi-harness/src/supervisor.rs
// ============================================================================
// Module: Process Supervisor
// Description: Launch, readiness gating, and termination of the target.
// Purpose: Own one target OS process for the lifetime of a harness.
// Dependencies: std::process, reqwest, capi-harness-core
// ============================================================================

//! ## Overview
//! The supervisor resolves the target binary, spawns it as
//! `<binary> -c <config-path>` with stdout and stderr captured to a single
//! log file, and hands back an [`OrchestratedProcess`]. The process handle
//! gates readiness on the health endpoint, notices early exits between
//! probes, and kills plus reaps the child on [`OrchestratedProcess::kill`]
//! or drop.
//!
//! Port allocation binds `127.0.0.1:0` and releases the socket before the
//! target binds it, so a concurrent process may race for the same port.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::net::TcpListener;
use std::path::Path;
use std::path::PathBuf;
use std::process::Child;
use std::process::Command;
use std::process::ExitStatus;
use std::process::Stdio;
use std::sync::Arc;

use capi_harness_core::HarnessEvent;
use capi_harness_core::HarnessEventSink;
use capi_harness_core::NoopEventSink;
use capi_harness_core::events::detail;
use serde_json::json;

use crate::client::loopback_client;
use crate::error::SupervisorError;
use crate::readiness::ReadinessError;
use crate::readiness::ReadinessPolicy;
use crate::readiness::poll_health;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Component label used in supervisor events.
const COMPONENT: &str = "supervisor";

/// Flag that introduces the config path on the target command line.
pub const CONFIG_FLAG: &str = "-c";

/// Maximum bytes of captured output attached to startup errors.
pub const MAX_OUTPUT_TAIL_BYTES: u64 = 64 * 1024;

// ============================================================================
// SECTION: Port Allocation
// ============================================================================

/// Reserves a free loopback port and releases it for the target to bind.
///
/// # Errors
///
/// Returns [`SupervisorError::Io`] when no loopback socket can be bound.
pub fn allocate_port() -> Result<u16, SupervisorError> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|err| SupervisorError::Io(format!("failed to bind loopback: {err}")))?;
    let addr = listener
        .local_addr()
        .map_err(|err| SupervisorError::Io(format!("failed to read listener address: {err}")))?;
    drop(listener);
    Ok(addr.port())
}

// ============================================================================
// SECTION: Binary Resolution
// ============================================================================

/// Resolves the target binary.
///
/// A value containing a path separator must name an existing file; a bare
/// name is searched for on `PATH`.
///
/// # Errors
///
/// Returns [`SupervisorError::BinaryNotFound`] when nothing matches.
pub fn resolve_binary(binary: &Path) -> Result<PathBuf, SupervisorError> {
    let not_found = || SupervisorError::BinaryNotFound {
        binary: binary.display().to_string(),
    };
    if binary.as_os_str().is_empty() {
        return Err(not_found());
    }
    if binary.components().count() > 1 || binary.is_absolute() {
        return if binary.is_file() { Ok(binary.to_path_buf()) } else { Err(not_found()) };
    }
    find_in_path(binary).ok_or_else(not_found)
}

/// Searches `PATH` for an executable file named `name`.
fn find_in_path(name: &Path) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).map(|dir| dir.join(name)).find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// ============================================================================
// SECTION: Launch Spec
// ============================================================================

/// Everything needed to launch one target process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Binary path or bare name.
    pub binary: PathBuf,
    /// Synthesized config passed after [`CONFIG_FLAG`].
    pub config_path: PathBuf,
    /// Port the config tells the target to listen on.
    pub port: u16,
    /// File receiving both stdout and stderr.
    pub output_path: PathBuf,
    /// Working directory; defaults to the binary's grandparent directory.
    pub working_dir: Option<PathBuf>,
}

impl LaunchSpec {
    /// Creates a launch spec with the default working directory.
    #[must_use]
    pub fn new(
        binary: impl Into<PathBuf>,
        config_path: impl Into<PathBuf>,
        port: u16,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            binary: binary.into(),
            config_path: config_path.into(),
            port,
            output_path: output_path.into(),
            working_dir: None,
        }
    }

    /// Overrides the working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }
}

/// Picks the working directory: explicit, else `<binary>/../..` when it
/// exists, else the harness's own.
fn working_dir_for(binary: &Path, explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = explicit {
        return Some(dir.to_path_buf());
    }
    binary.parent().and_then(Path::parent).filter(|dir| dir.is_dir()).map(Path::to_path_buf)
}

// ============================================================================
// SECTION: Supervisor
// ============================================================================

/// Launches target processes and reports lifecycle events.
#[derive(Clone)]
pub struct ProcessSupervisor {
    sink: Arc<dyn HarnessEventSink>,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new(Arc::new(NoopEventSink))
    }
}

impl ProcessSupervisor {
    /// Creates a supervisor that reports to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn HarnessEventSink>) -> Self {
        Self {
            sink,
        }
    }

    /// Spawns the target described by `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::BinaryNotFound`] when the binary cannot be
    /// resolved, [`SupervisorError::Io`] when the output file cannot be
    /// created, or [`SupervisorError::Spawn`] when the OS refuses the launch.
    pub fn start(&self, spec: &LaunchSpec) -> Result<OrchestratedProcess, SupervisorError> {
        let binary = match resolve_binary(&spec.binary) {
            Ok(binary) => binary,
            Err(err) => {
                self.record_startup_failure(spec, &err);
                return Err(err);
            }
        };
        let output = File::create(&spec.output_path).map_err(|err| {
            SupervisorError::Io(format!(
                "failed to create output log {}: {err}",
                spec.output_path.display()
            ))
        })?;
        let output_err = output
            .try_clone()
            .map_err(|err| SupervisorError::Io(format!("failed to clone output log: {err}")))?;

        let mut command = Command::new(&binary);
        command
            .arg(CONFIG_FLAG)
            .arg(&spec.config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::from(output))
            .stderr(Stdio::from(output_err));
        if let Some(dir) = working_dir_for(&binary, spec.working_dir.as_deref()) {
            command.current_dir(dir);
        }
        let child = command.spawn().map_err(|err| {
            let err = SupervisorError::Spawn {
                binary: binary.display().to_string(),
                message: err.to_string(),
            };
            self.record_startup_failure(spec, &err);
            err
        })?;

        let pid = child.id();
        self.sink.record(&HarnessEvent::ok(
            COMPONENT,
            "process_started",
            detail([
                ("pid", json!(pid)),
                ("port", json!(spec.port)),
                ("binary", json!(binary.display().to_string())),
                ("config_path", json!(spec.config_path.display().to_string())),
            ]),
        ));
        Ok(OrchestratedProcess {
            child: Some(child),
            pid,
            port: spec.port,
            config_path: spec.config_path.clone(),
            output_path: spec.output_path.clone(),
            sink: Arc::clone(&self.sink),
        })
    }

    fn record_startup_failure(&self, spec: &LaunchSpec, err: &SupervisorError) {
        self.sink.record(&HarnessEvent::failed(
            COMPONENT,
            "process_startup_failed",
            detail([
                ("port", json!(spec.port)),
                ("binary", json!(spec.binary.display().to_string())),
                ("error", json!(err.to_string())),
            ]),
        ));
    }
}

// ============================================================================
// SECTION: Process Handle
// ============================================================================

/// A running target process owned by exactly one harness.
pub struct OrchestratedProcess {
    child: Option<Child>,
    pid: u32,
    port: u16,
    config_path: PathBuf,
    output_path: PathBuf,
    sink: Arc<dyn HarnessEventSink>,
}

impl std::fmt::Debug for OrchestratedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratedProcess")
            .field("pid", &self.pid)
            .field("port", &self.port)
            .field("config_path", &self.config_path)
            .field("running", &self.child.is_some())
            .finish_non_exhaustive()
    }
}

impl OrchestratedProcess {
    /// OS process id.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Port the target was configured to listen on.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Config file the target was launched with.
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// File capturing stdout and stderr.
    #[must_use]
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Returns the exit status if the process has already exited.
    pub fn try_exit_status(&mut self) -> Option<ExitStatus> {
        self.child.as_mut().and_then(|child| child.try_wait().ok().flatten())
    }

    /// Reads the tail of the captured output.
    #[must_use]
    pub fn output(&self) -> String {
        read_tail(&self.output_path, MAX_OUTPUT_TAIL_BYTES)
    }

    /// Polls `health_url` until it returns 200, the budget is spent, or the
    /// process exits.
    ///
    /// Returns the number of attempts made.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::ExitedEarly`] or
    /// [`SupervisorError::HealthCheckExhausted`], each carrying the captured
    /// process output.
    pub async fn wait_ready(
        &mut self,
        health_url: &str,
        policy: ReadinessPolicy,
    ) -> Result<u32, SupervisorError> {
        let client = loopback_client()
            .map_err(|err| SupervisorError::Io(format!("failed to build health client: {err}")))?;
        let child = &mut self.child;
        let result = poll_health(&client, health_url, policy, || exit_description(child)).await;
        let err = match result {
            Ok(attempts) => {
                self.sink.record(&HarnessEvent::ok(
                    COMPONENT,
                    "process_ready",
                    detail([
                        ("pid", json!(self.pid)),
                        ("port", json!(self.port)),
                        ("attempts", json!(attempts)),
                    ]),
                ));
                return Ok(attempts);
            }
            Err(ReadinessError::Exhausted {
                url,
                attempts,
                last,
            }) => SupervisorError::HealthCheckExhausted {
                url,
                attempts,
                last,
                output: self.output(),
            },
            Err(ReadinessError::Aborted {
                status,
                attempts,
            }) => SupervisorError::ExitedEarly {
                status,
                attempts,
                output: self.output(),
            },
            Err(ReadinessError::Client(message)) => SupervisorError::Io(message),
        };
        self.sink.record(&HarnessEvent::failed(
            COMPONENT,
            "process_startup_failed",
            detail([
                ("pid", json!(self.pid)),
                ("port", json!(self.port)),
                ("error", json!(err.to_string())),
            ]),
        ));
        Err(err)
    }

    /// Kills the process and waits for it to be reaped.
    ///
    /// Both outcomes are recorded as a `process_killed` event.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Terminate`] when the kill signal or the
    /// reap fails.
    pub fn kill(mut self) -> Result<(), SupervisorError> {
        let Some(child) = self.child.take() else {
            return Ok(());
        };
        match terminate_and_reap(child, self.pid) {
            Ok(status) => {
                self.sink.record(&HarnessEvent::ok(
                    COMPONENT,
                    "process_killed",
                    detail([("pid", json!(self.pid)), ("status", json!(status.to_string()))]),
                ));
                Ok(())
            }
            Err(err) => {
                self.sink.record(&HarnessEvent::failed(
                    COMPONENT,
                    "process_killed",
                    detail([("pid", json!(self.pid)), ("error", json!(err.to_string()))]),
                ));
                Err(err)
            }
        }
    }
}

/// Sends a kill signal unless the child already exited, then reaps it.
fn terminate_and_reap(mut child: Child, pid: u32) -> Result<ExitStatus, SupervisorError> {
    let terminate = |err: std::io::Error| SupervisorError::Terminate {
        pid,
        message: err.to_string(),
    };
    if child.try_wait().map_err(terminate)?.is_none() {
        child.kill().map_err(terminate)?;
    }
    child.wait().map_err(terminate)
}

impl Drop for OrchestratedProcess {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Describes the exit status when the child has exited.
fn exit_description(child: &mut Option<Child>) -> Option<String> {
    child.as_mut()?.try_wait().ok().flatten().map(|status| status.to_string())
}

/// Reads at most `limit` trailing bytes of `path` as lossy UTF-8.
fn read_tail(path: &Path, limit: u64) -> String {
    let Ok(mut file) = File::open(path) else {
        return String::new();
    };
    let len = file.metadata().map(|meta| meta.len()).unwrap_or(0);
    if len > limit && file.seek(SeekFrom::Start(len - limit)).is_err() {
        return String::new();
    }
    let mut bytes = Vec::new();
    if file.read_to_end(&mut bytes).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&bytes).into_owned()
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

    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use capi_harness_core::MemoryEventSink;

    use super::LaunchSpec;
    use super::ProcessSupervisor;
    use super::allocate_port;
    use super::read_tail;
    use super::resolve_binary;
    use super::working_dir_for;
    use crate::error::SupervisorError;
    use crate::readiness::ReadinessPolicy;

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn missing_binary_is_reported() {
        let sink = Arc::new(MemoryEventSink::new());
        let supervisor = ProcessSupervisor::new(sink.clone());
        let dir = tempfile::tempdir().unwrap();
        let spec = LaunchSpec::new(
            "definitely-not-a-target-binary",
            dir.path().join("c.yml"),
            1,
            dir.path().join("out.log"),
        );
        let err = supervisor.start(&spec).unwrap_err();
        assert!(matches!(err, SupervisorError::BinaryNotFound { .. }));
        assert_eq!(sink.events_named("process_startup_failed").len(), 1);
    }

    #[test]
    fn path_with_separator_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("bin").join("target");
        assert!(matches!(
            resolve_binary(&missing),
            Err(SupervisorError::BinaryNotFound { .. })
        ));
        assert!(matches!(resolve_binary(Path::new("")), Err(SupervisorError::BinaryNotFound { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn bare_names_resolve_on_path() {
        let resolved = resolve_binary(Path::new("sh")).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("sh"));
    }

    #[test]
    fn working_dir_defaults_to_binary_grandparent() {
        let dir = tempfile::tempdir().unwrap();
        let bin_dir = dir.path().join("bin");
        std::fs::create_dir(&bin_dir).unwrap();
        let binary = bin_dir.join("target");
        assert_eq!(working_dir_for(&binary, None), Some(dir.path().to_path_buf()));
        let explicit = dir.path().join("elsewhere");
        assert_eq!(working_dir_for(&binary, Some(&explicit)), Some(explicit));
        assert_eq!(working_dir_for(Path::new("target"), None), None);
    }

    #[test]
    fn allocated_ports_are_nonzero() {
        assert_ne!(allocate_port().unwrap(), 0);
    }

    #[test]
    fn output_tail_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        std::fs::write(&path, "head-middle-tail").unwrap();
        assert_eq!(read_tail(&path, 4), "tail");
        assert_eq!(read_tail(&path, 1024), "head-middle-tail");
        assert_eq!(read_tail(&dir.path().join("missing.log"), 4), "");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn early_exit_is_detected_with_output() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "crashing-target", "echo \"booting with $2\"\nexit 3");
        let sink = Arc::new(MemoryEventSink::new());
        let supervisor = ProcessSupervisor::new(sink.clone());
        let port = allocate_port().unwrap();
        let spec = LaunchSpec::new(&script, dir.path().join("c.yml"), port, dir.path().join("out.log"));
        let mut process = supervisor.start(&spec).unwrap();

        let url = format!("http://127.0.0.1:{port}/v2/info");
        let err = process
            .wait_ready(&url, ReadinessPolicy::new(200, Duration::from_millis(20)))
            .await
            .unwrap_err();
        match err {
            SupervisorError::ExitedEarly {
                output,
                attempts,
                ..
            } => {
                assert!(output.contains("booting with"), "output: {output}");
                assert!(output.contains("c.yml"), "output: {output}");
                assert!(attempts < 200);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(sink.events_named("process_started").len(), 1);
        assert_eq!(sink.events_named("process_startup_failed").len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn kill_terminates_and_reaps() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "sleeping-target", "exec sleep 30");
        let sink = Arc::new(MemoryEventSink::new());
        let supervisor = ProcessSupervisor::new(sink.clone());
        let spec = LaunchSpec::new(&script, dir.path().join("c.yml"), 1, dir.path().join("out.log"));
        let mut process = supervisor.start(&spec).unwrap();
        assert!(process.try_exit_status().is_none());
        process.kill().unwrap();
        assert_eq!(sink.events_named("process_killed").len(), 1);
    }
}
