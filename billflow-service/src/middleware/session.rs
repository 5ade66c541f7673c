//! Session extraction for dashboard routes.

use crate::error::AppError;
use crate::services::sessions::Claims;
use crate::startup::AppState;
use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header, request::Parts};
use uuid::Uuid;

/// Verified session identity of the requesting dashboard user. Extracting
/// one enforces authentication; every tenant-scoped handler takes it and
/// uses `company_id` to scope its store calls.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub company_id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
}

impl TenantContext {
    fn from_claims(claims: Claims) -> Result<Self, AppError> {
        let company_id = Uuid::parse_str(&claims.company_id)
            .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Malformed session claims")))?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Malformed session claims")))?;
        Ok(Self {
            company_id,
            user_id,
            email: claims.email,
            role: claims.role,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
            })?;

        let state = AppState::from_ref(state);
        let context = TenantContext::from_claims(state.sessions.verify_token(token)?)?;

        let span = tracing::Span::current();
        span.record("company_id", context.company_id.to_string().as_str());
        span.record("user_id", context.user_id.to_string().as_str());

        Ok(context)
    }
}
