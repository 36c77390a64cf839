//! Minimal HTTP shell around the reconciler: a liveness endpoint plus the
//! tenant-registration boundary. Everything interesting happens in
//! `respawn-core`; this crate only exposes it.

pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the axum Router with all routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(routes::health::healthz))
        .route("/api/tenants", get(routes::tenants::list))
        .route("/api/tenants", post(routes::tenants::register))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind and run the server until the task is cancelled.
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("liveness server listening on http://localhost:{port}");
    axum::serve(listener, app).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
