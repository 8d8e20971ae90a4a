// system-tests/src/bin/fake-target.rs
// ============================================================================
// Module: Fake Target Binary
// Description: Control-plane stand-in launched by the end-to-end suites.
// Purpose: Give the harness a real child process to supervise.
// Dependencies: system-tests, clap, tokio
// ============================================================================

//! Fake target binary. Invoked as `fake-target -c <config.yml>`.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use system_tests::fake_target::FakeTargetConfig;
use system_tests::fake_target::router;

#[derive(Parser, Debug)]
#[command(name = "fake-target")]
struct Args {
    /// Config file synthesized by the harness.
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: PathBuf,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let args = Args::parse();
    let config = match FakeTargetConfig::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("fake-target: {err}");
            std::process::exit(1);
        }
    };
    let app = match router(&config) {
        Ok(app) => app,
        Err(err) => {
            eprintln!("fake-target: init failed: {err}");
            std::process::exit(1);
        }
    };
    let addr = SocketAddr::from(([127, 0, 0, 1], config.external_port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("fake-target: bind {addr} failed: {err}");
            std::process::exit(1);
        }
    };
    println!("fake-target: listening on http://{addr} (config {})", args.config.display());
    if let Err(err) = axum::serve(listener, app).await {
        eprintln!("fake-target: server failed: {err}");
        std::process::exit(1);
    }
}
