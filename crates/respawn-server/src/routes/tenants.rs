use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub tenant_id: String,
    pub chat_id: i64,
    pub token: String,
}

/// POST /api/tenants — register (or replace) a tenant and reconcile that
/// tenant once before responding.
pub async fn register(
    State(app): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = app
        .reconciler
        .register_tenant(&req.tenant_id, req.chat_id, &req.token)
        .await?;
    tracing::info!(tenant = %tenant.tenant_id, "tenant registered");
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "tenant_id": tenant.tenant_id,
            "chat_id": tenant.chat_id,
            "token": tenant.redacted_token(),
            "registered_at": tenant.registered_at.to_rfc3339(),
        })),
    ))
}

/// GET /api/tenants — stored tenants with credentials redacted.
pub async fn list(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let tenants: Vec<serde_json::Value> = app
        .reconciler
        .store()
        .list()?
        .iter()
        .map(|t| {
            serde_json::json!({
                "tenant_id": t.tenant_id,
                "chat_id": t.chat_id,
                "token": t.redacted_token(),
                "active": t.is_active(),
                "registered_at": t.registered_at.to_rfc3339(),
            })
        })
        .collect();
    Ok(Json(serde_json::json!({ "tenants": tenants })))
}
