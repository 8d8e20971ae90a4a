// system-tests/tests/suites/task_callbacks.rs
// ============================================================================
// Module: Task Callback Tests
// Description: Target to scheduler stub to target task completion.
// Purpose: Validate the callback simulator against a supervised target.
// Dependencies: system-tests helpers, capi-harness, capi-harness-stubs
// ============================================================================

//! Task callback round trips through the scheduler stub.

use std::sync::Arc;

use capi_harness::ApplicationError;
use capi_harness::Harness;
use capi_harness_core::MemoryEventSink;
use capi_harness_stubs::SchedulerStubOptions;
use capi_harness_stubs::spawn_scheduler_stub;
use serde_json::json;
use system_tests::fake_target::Task;

use crate::helpers::target::fake_target_options;

#[tokio::test(flavor = "multi_thread")]
async fn desired_task_is_completed_by_scheduler_stub() -> Result<(), Box<dyn std::error::Error>> {
    let sink = Arc::new(MemoryEventSink::new());
    let stub = spawn_scheduler_stub(SchedulerStubOptions {
        sink: sink.clone(),
        ..SchedulerStubOptions::default()
    })?;
    let harness =
        Harness::dial(fake_target_options().with_scheduler_url(stub.base_url())).await?;
    let user = harness.actor("developer", false)?;

    let created = harness
        .client()
        .post::<_, Task>("/v3/tasks", &user.access_token, &json!({ "name": "migrate" }))
        .await?;
    let task = created.expect_status(202)?.ok_or("task response has no body")?;
    if task.state != "SUCCEEDED" || task.lifecycle_type.as_deref() != Some("docker") {
        return Err(format!("task not completed by callback: {task:?}").into());
    }

    let fetched = harness
        .client()
        .get::<Task>(&format!("/v3/tasks/{}", task.guid), &user.access_token)
        .await?
        .into_body()
        .ok_or("task lookup has no body")?;
    if fetched != task {
        return Err(format!("stored task differs: {fetched:?}").into());
    }

    let events = sink.events_named("task_callback");
    let [event] = events.as_slice() else {
        return Err(format!("expected one task_callback event, got {}", events.len()).into());
    };
    let expected_url =
        format!("http://127.0.0.1:{}/internal/v4/tasks/{}/completed", harness.port(), task.guid);
    if event.detail_str("stage") != Some("acknowledged")
        || event.detail_str("task_guid") != Some(task.guid.as_str())
        || event.detail_str("callback_url") != Some(expected_url.as_str())
    {
        return Err(format!("unexpected callback event: {:?}", event.detail).into());
    }

    harness.kill()?;
    stub.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_scheduler_is_a_bad_gateway() -> Result<(), Box<dyn std::error::Error>> {
    let closed = std::net::TcpListener::bind("127.0.0.1:0")?;
    let scheduler_url = format!("http://{}", closed.local_addr()?);
    drop(closed);
    let harness = Harness::dial(fake_target_options().with_scheduler_url(scheduler_url)).await?;
    let user = harness.actor("developer", false)?;
    let created = harness
        .client()
        .post::<_, Task>("/v3/tasks", &user.access_token, &json!({ "name": "migrate" }))
        .await?;
    if created.error() != Some(ApplicationError::BadGateway) {
        return Err(format!("expected bad gateway, got {}", created.status()).into());
    }
    harness.kill()?;
    Ok(())
}
