use crate::dtos::{SignInRequest, SignInResponse, ValidatedJson};
use crate::error::AppError;
use crate::middleware::TenantContext;
use crate::services::sessions;
use crate::startup::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

/// POST /auth/sign-in
pub async fn sign_in(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SignInRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (user, token) = sessions::sign_in(
        state.store.as_ref(),
        &state.sessions,
        &req.email,
        &req.password,
    )
    .await?;

    Ok(Json(SignInResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.sessions.expiry_minutes() * 60,
        user,
    }))
}

/// GET /auth/me
pub async fn me(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .store
        .get_user(ctx.company_id, ctx.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    Ok(Json(json!({ "user": user })))
}
