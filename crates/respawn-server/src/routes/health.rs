use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::state::AppState;

/// GET /healthz — whether the reconciliation scheduler is running.
/// 503 until the scheduler's first tick has been armed.
pub async fn healthz(State(app): State<AppState>) -> Response {
    let running = app.ready.load(Ordering::SeqCst);
    let body = Json(serde_json::json!({ "scheduler_running": running }));
    let status = if running {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, body).into_response()
}
