//! Dashboard sessions: password hashing and signed session tokens.

use crate::config::AuthConfig;
use crate::error::AppError;
use crate::models::User;
use crate::store::BillingStore;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

/// Claims carried by a dashboard session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Tenant the session is bound to
    pub company_id: String,
    pub email: String,
    pub role: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Issues and verifies HS256 session tokens.
#[derive(Clone)]
pub struct SessionService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_minutes: i64,
}

impl SessionService {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            expiry_minutes: config.session_expiry_minutes,
        }
    }

    /// Issue a session token for a verified user.
    pub fn issue_token(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.expiry_minutes);

        let claims = Claims {
            sub: user.id.to_string(),
            company_id: user.company_id.to_string(),
            email: user.email.clone(),
            role: user.role.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to sign token: {}", e)))
    }

    /// Decode and validate a session token.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AppError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }

    pub fn expiry_minutes(&self) -> i64 {
        self.expiry_minutes
    }
}

/// Hash a password using Argon2id with a generated salt.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to hash password: {}", e)))?
        .to_string();
    Ok(hash)
}

/// Verify a password against a stored Argon2 hash.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(password_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Verify credentials and issue a session token.
///
/// Email is unique per company, not globally, so the same address may be
/// registered under several tenants; the password selects the account.
/// Unknown email and wrong password produce the same error so responses do
/// not reveal which one failed.
pub async fn sign_in(
    store: &dyn BillingStore,
    sessions: &SessionService,
    email: &str,
    password: &str,
) -> Result<(User, String), AppError> {
    let user = store
        .find_users_by_email(email)
        .await?
        .into_iter()
        .find(|candidate| verify_password(password, &candidate.password_hash))
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Invalid email or password")))?;

    let token = sessions.issue_token(&user)?;
    tracing::info!(user_id = %user.id, company_id = %user.company_id, "User signed in");

    Ok((user, token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;
    use uuid::Uuid;

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: Secret::new("test-secret-key-for-sessions".to_string()),
            session_expiry_minutes: 60,
        }
    }

    fn test_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            email: "john@acme.com".to_string(),
            name: "John Smith".to_string(),
            role: "owner".to_string(),
            password_hash: "unused".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn hashes_verify_and_reject() {
        let hash = hash_password("password123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("password123", &hash));
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn same_password_hashes_differently() {
        let first = hash_password("password123").unwrap();
        let second = hash_password("password123").unwrap();
        assert_ne!(first, second);
        assert!(verify_password("password123", &first));
        assert!(verify_password("password123", &second));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("password123", "not-a-phc-string"));
    }

    #[test]
    fn issued_tokens_round_trip() {
        let service = SessionService::new(&test_config());
        let user = test_user();

        let token = service.issue_token(&user).unwrap();
        let claims = service.verify_token(&token).unwrap();

        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.company_id, user.company_id.to_string());
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.role, "owner");
        assert!(claims.exp > claims.iat);
    }

    #[tokio::test]
    async fn sign_in_selects_the_account_whose_password_matches() {
        use crate::models::{CreateCompany, CreateUser, UserRole};
        use crate::store::MemoryStore;

        let store = MemoryStore::new();
        let service = SessionService::new(&test_config());

        let mut company_ids = Vec::new();
        for (slug, password) in [("acme", "acme-password"), ("globex", "globex-password")] {
            let company = store
                .create_company(&CreateCompany {
                    name: format!("{} Inc", slug),
                    slug: slug.to_string(),
                })
                .await
                .unwrap();
            store
                .create_user(&CreateUser {
                    company_id: company.id,
                    email: "shared@example.com".to_string(),
                    name: "Shared Owner".to_string(),
                    role: UserRole::Owner,
                    password_hash: hash_password(password).unwrap(),
                })
                .await
                .unwrap();
            company_ids.push(company.id);
        }

        let (acme_user, _) = sign_in(&store, &service, "shared@example.com", "acme-password")
            .await
            .unwrap();
        assert_eq!(acme_user.company_id, company_ids[0]);

        let (globex_user, _) = sign_in(&store, &service, "shared@example.com", "globex-password")
            .await
            .unwrap();
        assert_eq!(globex_user.company_id, company_ids[1]);

        let err = sign_in(&store, &service, "shared@example.com", "neither-password")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn tokens_signed_with_other_secret_fail() {
        let service = SessionService::new(&test_config());
        let other = SessionService::new(&AuthConfig {
            jwt_secret: Secret::new("a-completely-different-secret".to_string()),
            session_expiry_minutes: 60,
        });

        let token = other.issue_token(&test_user()).unwrap();
        assert!(service.verify_token(&token).is_err());
    }
}
