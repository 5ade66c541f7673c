use crate::models::ApiKey;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Create-API-key request. `expires_in_days` is optional; omitted keys
/// never expire.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateApiKeyRequest {
    #[validate(length(min = 1, max = 120, message = "Name is required"))]
    pub name: String,

    #[validate(range(min = 1, max = 3650, message = "Expiry must be between 1 and 3650 days"))]
    pub expires_in_days: Option<i64>,
}

/// Creation response: the plaintext secret plus the stored row. This is the
/// only response that ever carries the secret.
#[derive(Debug, Serialize)]
pub struct CreatedApiKeyResponse {
    pub api_key: String,
    pub api_key_record: ApiKey,
}
