//! Liveness and readiness probes
//!
//! `/healthz` answers as soon as the server is up. `/readyz` answers 503 until
//! the controller has started watching ConsulACLs.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tracing::info;

use crate::Error;

/// Readiness flag shared between the controller and the probe server
#[derive(Clone, Debug, Default)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    /// Mark the operator ready to serve
    pub fn mark_ready(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Current readiness
    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Build the probe router
pub fn health_routes(readiness: Readiness) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(ready))
        .with_state(readiness)
}

/// Serve the probes on `addr` until the process exits
pub async fn serve(addr: SocketAddr, readiness: Readiness) -> Result<(), Error> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::config(format!("failed to bind health probe address {addr}: {e}")))?;
    info!(addr = %addr, "health probe server started");
    axum::serve(listener, health_routes(readiness))
        .await
        .map_err(|e| Error::config(format!("health probe server error: {e}")))
}

async fn ready(State(readiness): State<Readiness>) -> (StatusCode, &'static str) {
    if readiness.is_ready() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}
