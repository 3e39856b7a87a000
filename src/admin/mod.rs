//! Operator diagnostic API.
//!
//! # Routes
//! - `GET  /admin/status`                      gate settings
//! - `GET  /admin/inflight`                    every counter in the namespace
//! - `GET  /admin/inflight/{provider}`         one counter, threshold, decision
//! - `POST /admin/inflight/{provider}/reset`   emergency reset to zero
//!
//! All routes require `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::admission::InflightGate;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State injected into admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub gate: InflightGate,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(gate: InflightGate, api_key: &str) -> Self {
        Self {
            gate,
            api_key: Arc::from(api_key),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/inflight", get(list_inflight))
        .route("/admin/inflight/{provider}", get(get_inflight))
        .route("/admin/inflight/{provider}/reset", post(reset_inflight))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
