use crate::dtos::{RecordUsageRequest, UsageListQuery, ValidatedJson};
use crate::error::AppError;
use crate::middleware::TenantContext;
use crate::startup::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use validator::Validate;

const DEFAULT_LIMIT: i64 = 100;

/// POST /usage
pub async fn record_usage(
    State(state): State<AppState>,
    ctx: TenantContext,
    ValidatedJson(req): ValidatedJson<RecordUsageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .billing
        .record_usage(
            ctx.company_id,
            req.subscription_id,
            req.metric_name,
            req.quantity,
            "dashboard",
        )
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "usage_record": record }))))
}

/// GET /usage
pub async fn list_usage(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(query): Query<UsageListQuery>,
) -> Result<impl IntoResponse, AppError> {
    query.validate()?;

    let records = state
        .store
        .list_usage(
            ctx.company_id,
            query.subscription_id,
            query.limit.unwrap_or(DEFAULT_LIMIT),
        )
        .await?;
    Ok(Json(json!({ "usage_records": records })))
}

/// GET /usage/summary
pub async fn usage_summary(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<impl IntoResponse, AppError> {
    let summary = state.store.usage_summary(ctx.company_id).await?;
    Ok(Json(json!({ "summary": summary })))
}
