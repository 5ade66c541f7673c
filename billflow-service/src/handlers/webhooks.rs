use crate::error::AppError;
use crate::middleware::TenantContext;
use crate::startup::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

/// GET /webhooks
pub async fn list_webhooks(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<impl IntoResponse, AppError> {
    let webhooks = state.store.list_webhooks(ctx.company_id).await?;
    Ok(Json(json!({ "webhooks": webhooks })))
}
