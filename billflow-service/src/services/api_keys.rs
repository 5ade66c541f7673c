//! API key issuance and verification for machine ingestion.
//!
//! Secrets are random, prefixed `sk_live_`, and returned to the caller
//! exactly once. Only a salted SHA-256 hash and a short display prefix are
//! persisted; verification recomputes the hash per candidate key and
//! compares in constant time.

use crate::error::AppError;
use crate::models::{ApiKey, CreateApiKey};
use crate::services::metrics::record_api_key_auth;
use crate::store::BillingStore;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::info;
use uuid::Uuid;

const SECRET_PREFIX: &str = "sk_live_";
const SECRET_BYTES: usize = 32;
const SALT_BYTES: usize = 16;
const DISPLAY_PREFIX_LEN: usize = 12;

/// A freshly issued key: the stored row plus the plaintext secret, which
/// exists only in this value and the response that carries it.
#[derive(Debug)]
pub struct IssuedApiKey {
    pub key: ApiKey,
    pub secret: String,
}

#[derive(Clone)]
pub struct ApiKeyService {
    store: Arc<dyn BillingStore>,
}

impl ApiKeyService {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    /// Generate a secret, persist its salted hash, and hand both back.
    pub async fn issue(
        &self,
        company_id: Uuid,
        name: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<IssuedApiKey, AppError> {
        let secret = generate_secret();
        let salt = generate_salt();

        let input = CreateApiKey {
            company_id,
            name: name.to_string(),
            key_hash: hash_secret(&salt, &secret),
            key_salt: hex::encode(salt),
            key_prefix: secret.chars().take(DISPLAY_PREFIX_LEN).collect(),
            expires_at,
        };

        let key = self.store.create_api_key(&input).await?;
        info!(api_key_id = %key.id, company_id = %company_id, "API key issued");

        Ok(IssuedApiKey { key, secret })
    }

    /// Resolve a presented secret to its stored key.
    ///
    /// Every active key is a candidate because the per-key salt means the
    /// presented secret cannot be hashed without the row. Revoked keys never
    /// reach the loop; a matched-but-expired key is rejected explicitly.
    pub async fn authenticate(&self, secret: &str) -> Result<ApiKey, AppError> {
        let now = Utc::now();

        for key in self.store.list_active_api_keys().await? {
            let Ok(salt) = hex::decode(&key.key_salt) else {
                continue;
            };
            let Ok(stored) = hex::decode(&key.key_hash) else {
                continue;
            };
            let computed = digest_secret(&salt, secret);
            if stored.len() != computed.len() || !bool::from(computed.ct_eq(&stored)) {
                continue;
            }

            if !key.is_usable(now) {
                record_api_key_auth("expired");
                return Err(AppError::Unauthorized(anyhow::anyhow!(
                    "API key has expired"
                )));
            }

            self.store.touch_api_key(key.id, now).await?;
            record_api_key_auth("success");
            return Ok(key);
        }

        record_api_key_auth("failure");
        Err(AppError::Unauthorized(anyhow::anyhow!("Invalid API key")))
    }
}

fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!("{}{}", SECRET_PREFIX, URL_SAFE_NO_PAD.encode(bytes))
}

fn generate_salt() -> [u8; SALT_BYTES] {
    let mut salt = [0u8; SALT_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

fn digest_secret(salt: &[u8], secret: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(secret.as_bytes());
    hasher.finalize().into()
}

/// Hex-encoded salted digest as stored in `api_keys.key_hash`.
pub fn hash_secret(salt: &[u8], secret: &str) -> String {
    hex::encode(digest_secret(salt, secret))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Company, CreateCompany};
    use crate::store::MemoryStore;
    use chrono::Duration;

    async fn service_with_company() -> (ApiKeyService, Company) {
        let store = Arc::new(MemoryStore::new());
        let company = store
            .create_company(&CreateCompany {
                name: "Acme Corp".to_string(),
                slug: "acme".to_string(),
            })
            .await
            .unwrap();
        (ApiKeyService::new(store), company)
    }

    #[test]
    fn secrets_carry_the_expected_shape() {
        let secret = generate_secret();
        assert!(secret.starts_with("sk_live_"));
        // 32 bytes of entropy base64url-encodes to 43 chars.
        assert_eq!(secret.len(), "sk_live_".len() + 43);
    }

    #[test]
    fn hash_depends_on_the_salt() {
        let secret = generate_secret();
        let first = hash_secret(&generate_salt(), &secret);
        let second = hash_secret(&generate_salt(), &secret);
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn issued_secrets_authenticate() {
        let (service, company) = service_with_company().await;
        let issued = service.issue(company.id, "ci-ingest", None).await.unwrap();

        assert_eq!(issued.key.key_prefix, &issued.secret[..12]);
        assert!(issued.key.last_used_at.is_none());

        let authenticated = service.authenticate(&issued.secret).await.unwrap();
        assert_eq!(authenticated.id, issued.key.id);
        assert_eq!(authenticated.company_id, company.id);
    }

    #[tokio::test]
    async fn tampered_secrets_are_rejected() {
        let (service, company) = service_with_company().await;
        let issued = service.issue(company.id, "ci-ingest", None).await.unwrap();

        let mut tampered = issued.secret.clone();
        let last = if tampered.pop() == Some('A') { 'B' } else { 'A' };
        tampered.push(last);

        let err = service.authenticate(&tampered).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn expired_keys_are_rejected() {
        let (service, company) = service_with_company().await;
        let expires_at = Some(Utc::now() - Duration::minutes(1));
        let issued = service
            .issue(company.id, "old-key", expires_at)
            .await
            .unwrap();

        let err = service.authenticate(&issued.secret).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn revoked_keys_are_rejected() {
        let store = Arc::new(MemoryStore::new());
        let company = store
            .create_company(&CreateCompany {
                name: "Acme Corp".to_string(),
                slug: "acme".to_string(),
            })
            .await
            .unwrap();
        let service = ApiKeyService::new(store.clone());

        let issued = service.issue(company.id, "ci-ingest", None).await.unwrap();
        store
            .revoke_api_key(company.id, issued.key.id)
            .await
            .unwrap();

        let err = service.authenticate(&issued.secret).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
