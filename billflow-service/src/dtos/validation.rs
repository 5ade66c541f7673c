//! JSON extraction with validation baked in.

use crate::error::AppError;
use axum::extract::{FromRequest, Request};
use axum::Json;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError};

/// `Json<T>` that also runs the DTO's validation rules. Parse failures
/// (malformed JSON, missing fields, wrong types) and rule failures both map
/// to 400 through `AppError` instead of axum's plain-text 422.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid request body: {}", e)))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

pub fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("must not be negative".into());
        return Err(err);
    }
    Ok(())
}

pub fn validate_tax_rate(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() || *value > Decimal::from(100) {
        let mut err = ValidationError::new("tax_rate");
        err.message = Some("must be between 0 and 100".into());
        return Err(err);
    }
    Ok(())
}

pub fn validate_interval(value: &str) -> Result<(), ValidationError> {
    if value == "month" || value == "year" {
        return Ok(());
    }
    let mut err = ValidationError::new("interval");
    err.message = Some("must be 'month' or 'year'".into());
    Err(err)
}

pub fn validate_invoice_status(value: &str) -> Result<(), ValidationError> {
    match value {
        "draft" | "open" | "paid" | "void" | "uncollectible" => Ok(()),
        _ => {
            let mut err = ValidationError::new("invoice_status");
            err.message =
                Some("must be one of draft, open, paid, void, uncollectible".into());
            Err(err)
        }
    }
}
