//! API key extraction for machine ingestion routes.

use crate::error::AppError;
use crate::startup::AppState;
use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header, request::Parts};
use uuid::Uuid;

/// Identity established by presenting an `sk_live_` secret as a bearer
/// token. Carries the owning tenant; the user-level fields of a dashboard
/// session have no equivalent here.
#[derive(Debug, Clone)]
pub struct ApiKeyIdentity {
    pub company_id: Uuid,
    pub api_key_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for ApiKeyIdentity
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let secret = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing API key")))?;

        let state = AppState::from_ref(state);
        let key = state.api_keys.authenticate(secret).await?;

        let span = tracing::Span::current();
        span.record("company_id", key.company_id.to_string().as_str());

        Ok(ApiKeyIdentity {
            company_id: key.company_id,
            api_key_id: key.id,
        })
    }
}
