use crate::dtos::{CreatePlanRequest, ValidatedJson};
use crate::error::AppError;
use crate::middleware::TenantContext;
use crate::models::{CreatePlan, PlanInterval};
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// POST /plans
pub async fn create_plan(
    State(state): State<AppState>,
    ctx: TenantContext,
    ValidatedJson(req): ValidatedJson<CreatePlanRequest>,
) -> Result<impl IntoResponse, AppError> {
    let plan = state
        .store
        .create_plan(&CreatePlan {
            company_id: ctx.company_id,
            name: req.name,
            description: req.description,
            price: req.price,
            currency: req.currency.unwrap_or_else(|| "USD".to_string()),
            interval: PlanInterval::from_string(&req.interval),
            features: req.features,
        })
        .await?;

    tracing::info!(plan_id = %plan.id, name = %plan.name, "Plan created");

    Ok((StatusCode::CREATED, Json(json!({ "plan": plan }))))
}

/// GET /plans
pub async fn list_plans(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<impl IntoResponse, AppError> {
    let plans = state.store.list_plans(ctx.company_id).await?;
    Ok(Json(json!({ "plans": plans })))
}
