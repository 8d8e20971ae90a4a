// crates/capi-harness-stubs/src/server.rs
// ============================================================================
// Module: Stub Server Handle
// Description: Background axum server with graceful shutdown on drop.
// Purpose: Host peer stubs beside a test without blocking its runtime.
// Dependencies: axum, tokio
// ============================================================================

//! ## Overview
//! Stubs bind a loopback listener synchronously, so the address is known
//! before the handle is returned, then serve on a dedicated thread with its
//! own current-thread runtime. Dropping the [`StubHandle`] signals graceful
//! shutdown and joins the thread.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::net::TcpListener as StdTcpListener;
use std::thread;

use axum::Router;
use thiserror::Error;
use tokio::runtime::Builder;
use tokio::sync::oneshot;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures while starting a stub server.
#[derive(Debug, Error)]
pub enum StubError {
    /// The listener could not be bound or configured.
    #[error("stub bind on {addr} failed: {message}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying error.
        message: String,
    },
    /// The server thread could not be started.
    #[error("stub server thread failed: {0}")]
    Runtime(String),
}

// ============================================================================
// SECTION: Handle
// ============================================================================

/// Handle for a running stub server.
#[derive(Debug)]
pub struct StubHandle {
    addr: SocketAddr,
    base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<thread::JoinHandle<()>>,
}

impl StubHandle {
    /// Bound socket address.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `http://<addr>` of the stub.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stops the server and waits for the thread to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for StubHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// SECTION: Spawn
// ============================================================================

/// Binds `bind` and serves `app` on a background thread.
///
/// # Errors
///
/// Returns [`StubError::Bind`] when the address cannot be bound and
/// [`StubError::Runtime`] when the server thread cannot be spawned.
pub fn spawn_router(bind: SocketAddr, app: Router) -> Result<StubHandle, StubError> {
    let bind_error = |err: std::io::Error| StubError::Bind {
        addr: bind,
        message: err.to_string(),
    };
    let listener = StdTcpListener::bind(bind).map_err(bind_error)?;
    listener.set_nonblocking(true).map_err(bind_error)?;
    let addr = listener.local_addr().map_err(bind_error)?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let join = thread::Builder::new()
        .name(format!("stub-{addr}"))
        .spawn(move || {
            let Ok(runtime) = Builder::new_current_thread().enable_all().build() else {
                return;
            };
            runtime.block_on(async move {
                let Ok(listener) = tokio::net::TcpListener::from_std(listener) else {
                    return;
                };
                let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                });
                let _ = server.await;
            });
        })
        .map_err(|err| StubError::Runtime(err.to_string()))?;

    Ok(StubHandle {
        addr,
        base_url: format!("http://{addr}"),
        shutdown: Some(shutdown_tx),
        join: Some(join),
    })
}
