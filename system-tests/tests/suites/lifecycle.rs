// system-tests/tests/suites/lifecycle.rs
// ============================================================================
// Module: Lifecycle Tests
// Description: Dial, isolate, and kill fake target instances.
// Purpose: Validate health-gated startup and teardown end to end.
// Dependencies: system-tests helpers, capi-harness
// ============================================================================

//! Harness lifecycle tests against the fake target.

use std::sync::Arc;

use capi_harness::ClientError;
use capi_harness::Harness;
use capi_harness::HarnessError;
use capi_harness::SupervisorError;
use capi_harness_config::ConfigOverlay;
use capi_harness_config::ConfigPath;
use capi_harness_config::ConfigValue;
use capi_harness_config::TargetSetting;
use capi_harness_core::MemoryEventSink;
use serde_json::Value;

use crate::helpers::target::dial;
use crate::helpers::target::dial_with_sink;
use crate::helpers::target::fake_target_options;

#[tokio::test(flavor = "multi_thread")]
async fn dial_gates_on_health_and_kill_cleans_up() -> Result<(), Box<dyn std::error::Error>> {
    let harness = dial().await?;
    let info = harness.client().get::<Value>("/v2/info", "").await?;
    if info.status().as_u16() != 200 {
        return Err(format!("unexpected info status {}", info.status()).into());
    }
    let name = info.body().and_then(|body| body["name"].as_str());
    if name != Some("fake-target") {
        return Err(format!("unexpected info name {name:?}").into());
    }

    let config_path = harness.config_path().to_path_buf();
    let written = std::fs::read_to_string(&config_path)?;
    if !written.contains(&format!("external_port: {}", harness.port())) {
        return Err("synthesized config is missing the allocated port".into());
    }
    let output = harness.output();
    if !output.contains("listening") {
        return Err(format!("target output lacks listen line: {output}").into());
    }

    let client = harness.client().clone();
    harness.kill()?;
    if config_path.exists() {
        return Err("config survived kill".into());
    }
    match client.get::<Value>("/v2/info", "").await {
        Err(ClientError::Transport { .. }) => Ok(()),
        Err(other) => Err(format!("expected transport error, got {other}").into()),
        Ok(response) => Err(format!("target still answering: {}", response.status()).into()),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_harnesses_are_isolated() -> Result<(), Box<dyn std::error::Error>> {
    let (first, second) = tokio::join!(dial(), dial());
    let (first, second) = (first?, second?);
    if first.port() == second.port()
        || first.config_path() == second.config_path()
        || first.run_dir() == second.run_dir()
    {
        return Err("concurrent harnesses share a port, config, or run dir".into());
    }

    let second_config = second.config_path().to_path_buf();
    first.kill()?;
    let still_up = second.client().get::<Value>("/v2/info", "").await?;
    if still_up.status().as_u16() != 200 || !second_config.exists() {
        return Err("killing one harness disturbed the other".into());
    }
    second.kill()?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn caller_overrides_win_and_template_keys_survive() -> Result<(), Box<dyn std::error::Error>>
{
    let overlay = ConfigOverlay::new()
        .setting(TargetSetting::LoggingLevel("info".to_string()))?
        .set(ConfigPath::parse("info.name")?, "overridden");
    let harness = Harness::dial(fake_target_options().with_overlay(overlay)).await?;
    let document = harness.config().document();
    let expected = [
        ("logging.level", ConfigValue::from("info")),
        ("info.name", ConfigValue::from("overridden")),
        ("diego.pid_limit", ConfigValue::from(2048)),
        ("external_port", ConfigValue::from(harness.port())),
    ];
    for (path, value) in expected {
        let actual = document.get(&ConfigPath::parse(path)?);
        if actual != Some(&value) {
            return Err(format!("{path}: expected {value:?}, got {actual:?}").into());
        }
    }
    harness.kill()?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn lifecycle_events_are_recorded_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let sink = Arc::new(MemoryEventSink::new());
    let harness = dial_with_sink(sink.clone()).await?;
    harness.kill()?;
    let names: Vec<&str> = sink.events().iter().map(|event| event.event).collect();
    let expected =
        ["config_synthesized", "process_started", "process_ready", "process_killed", "config_removed"];
    if names != expected {
        return Err(format!("unexpected event order: {names:?}").into());
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn occupied_port_fails_startup_with_output() -> Result<(), Box<dyn std::error::Error>> {
    let blocker = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = blocker.local_addr()?.port();
    let unavailable = axum::Router::new()
        .fallback(|| async { axum::http::StatusCode::SERVICE_UNAVAILABLE });
    let squatter = tokio::spawn(async move {
        let _ = axum::serve(blocker, unavailable).await;
    });
    let run_root = tempfile::tempdir()?;
    let options = fake_target_options().with_port(port).with_run_root(run_root.path());
    let result = Harness::dial(options).await;
    squatter.abort();
    match result {
        Err(HarnessError::Startup(
            SupervisorError::ExitedEarly {
                output,
                ..
            }
            | SupervisorError::HealthCheckExhausted {
                output,
                ..
            },
        )) => {
            if !output.contains("bind") {
                return Err(format!("startup output lacks bind failure: {output}").into());
            }
        }
        Err(other) => return Err(format!("unexpected error: {other}").into()),
        Ok(harness) => {
            harness.kill()?;
            return Err("dial succeeded on an occupied port".into());
        }
    }
    let leftover = std::fs::read_dir(run_root.path())?
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "yml"))
        .count();
    if leftover != 0 {
        return Err(format!("{leftover} config files left behind").into());
    }
    Ok(())
}
