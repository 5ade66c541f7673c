//! API key model. Only the salted hash and a display prefix are stored;
//! the plaintext secret is returned once at creation and never again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApiKey {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    #[serde(skip_serializing)]
    pub key_hash: String,
    #[serde(skip_serializing)]
    pub key_salt: String,
    pub key_prefix: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApiKey {
    /// Whether the key can authenticate requests right now.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |exp| exp > now)
    }
}

/// Input for persisting a newly issued key.
#[derive(Debug, Clone)]
pub struct CreateApiKey {
    pub company_id: Uuid,
    pub name: String,
    pub key_hash: String,
    pub key_salt: String,
    pub key_prefix: String,
    pub expires_at: Option<DateTime<Utc>>,
}
