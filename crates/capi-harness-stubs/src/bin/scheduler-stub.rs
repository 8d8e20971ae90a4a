// crates/capi-harness-stubs/src/bin/scheduler-stub.rs
// ============================================================================
// Module: Scheduler Stub Binary
// Description: Standalone callback simulator.
// Purpose: Run the scheduler stand-in beside a manually launched target.
// Dependencies: capi-harness-stubs, clap, tokio
// ============================================================================

//! Standalone scheduler callback simulator. Serves until interrupted and
//! writes one JSON event line per desire request to stderr.

use std::net::SocketAddr;
use std::sync::Arc;

use capi_harness_core::StderrEventSink;
use capi_harness_stubs::CallbackSimulator;
use capi_harness_stubs::CallbackTemplate;
use capi_harness_stubs::scheduler::DEFAULT_DOCKER_IMAGE;
use capi_harness_stubs::scheduler::DEFAULT_LIFECYCLE_TYPE;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "scheduler-stub", about = "Task scheduler callback simulator")]
struct Args {
    /// Address to listen on.
    #[arg(long, value_name = "ADDR", default_value = "127.0.0.1:8889")]
    bind: SocketAddr,
    /// Container image reported in completion callbacks.
    #[arg(long, value_name = "IMAGE", default_value = DEFAULT_DOCKER_IMAGE)]
    docker_image: String,
    /// Lifecycle type reported in completion callbacks.
    #[arg(long, value_name = "TYPE", default_value = DEFAULT_LIFECYCLE_TYPE)]
    lifecycle_type: String,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let args = Args::parse();
    let template = CallbackTemplate {
        lifecycle_type: args.lifecycle_type,
        docker_image: args.docker_image,
        ..CallbackTemplate::default()
    };
    let simulator = match CallbackSimulator::new(template, Arc::new(StderrEventSink)) {
        Ok(simulator) => simulator,
        Err(err) => {
            eprintln!("scheduler-stub: init failed: {err}");
            std::process::exit(1);
        }
    };
    let listener = match tokio::net::TcpListener::bind(args.bind).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("scheduler-stub: bind {} failed: {err}", args.bind);
            std::process::exit(1);
        }
    };
    if let Ok(addr) = listener.local_addr() {
        eprintln!("scheduler-stub: listening on http://{addr}");
    }
    let server = axum::serve(listener, simulator.router()).with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
    });
    if let Err(err) = server.await {
        eprintln!("scheduler-stub: server failed: {err}");
        std::process::exit(1);
    }
}
