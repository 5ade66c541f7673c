use crate::dtos::{CreateSubscriptionRequest, ValidatedJson};
use crate::error::AppError;
use crate::middleware::TenantContext;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use uuid::Uuid;

/// POST /subscriptions
pub async fn create_subscription(
    State(state): State<AppState>,
    ctx: TenantContext,
    ValidatedJson(req): ValidatedJson<CreateSubscriptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    // The acting user is subscribed unless the request names someone else.
    let user_id = req.user_id.unwrap_or(ctx.user_id);
    let subscription = state
        .billing
        .create_subscription(ctx.company_id, user_id, req.plan_id)
        .await?;

    tracing::info!(
        subscription_id = %subscription.id,
        plan_id = %subscription.plan_id,
        "Subscription created"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "subscription": subscription })),
    ))
}

/// GET /subscriptions
pub async fn list_subscriptions(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<impl IntoResponse, AppError> {
    let subscriptions = state.store.list_subscriptions(ctx.company_id).await?;
    Ok(Json(json!({ "subscriptions": subscriptions })))
}

/// PATCH /subscriptions/:id/cancel
pub async fn cancel_subscription(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(subscription_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let subscription = state
        .billing
        .cancel_subscription(ctx.company_id, subscription_id)
        .await?;

    tracing::info!(subscription_id = %subscription.id, "Subscription canceled");

    Ok(Json(json!({ "subscription": subscription })))
}
