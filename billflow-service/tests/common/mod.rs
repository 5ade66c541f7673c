//! Test helper module for billflow-service integration tests.
//!
//! Spawns the application on a random port against the in-memory store and
//! provides tenant fixtures created directly through the store handle.

#![allow(dead_code)]

use billflow_service::config::{
    AuthConfig, Config, Environment, SecurityConfig, ServerConfig, StoreBackend, StoreConfig,
};
use billflow_service::models::{Company, CreateCompany, CreateUser, User, UserRole};
use billflow_service::services::init_metrics;
use billflow_service::services::sessions::hash_password;
use billflow_service::startup::Application;
use billflow_service::store::BillingStore;
use secrecy::Secret;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "test_password_123";

/// A company provisioned for one test, with a signed-in owner.
pub struct Tenant {
    pub company: Company,
    pub user: User,
    pub email: String,
    pub token: String,
}

/// Test application wrapper for integration tests.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: reqwest::Client,
    pub store: Arc<dyn BillingStore>,
}

fn test_config() -> Config {
    Config {
        environment: Environment::Dev,
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Random port
        },
        store: StoreConfig {
            backend: StoreBackend::Memory,
            database_url: Secret::new("postgres://unused@localhost/unused".to_string()),
            max_connections: 5,
            min_connections: 1,
        },
        auth: AuthConfig {
            jwt_secret: Secret::new("integration-test-signing-secret".to_string()),
            session_expiry_minutes: 60,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        log_level: "warn".to_string(),
        seed_demo_data: false,
    }
}

impl TestApp {
    /// Spawn a new test application on a random port.
    pub async fn spawn() -> Self {
        // Required for the metrics endpoint test; safe to call repeatedly
        init_metrics();

        let app = Application::build(test_config())
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let store = app.store();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to be ready by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            client,
            store,
        }
    }

    /// Create a company with one owner and sign them in.
    ///
    /// There is no public sign-up route, so the rows go in through the
    /// store, the same way an operator would provision a tenant.
    pub async fn tenant(&self, slug: &str) -> Tenant {
        let company = self
            .store
            .create_company(&CreateCompany {
                name: format!("{} Inc", slug),
                slug: slug.to_string(),
            })
            .await
            .expect("Failed to create test company");

        let email = format!("owner@{}.test", slug);
        let user = self
            .store
            .create_user(&CreateUser {
                company_id: company.id,
                email: email.clone(),
                name: "Test Owner".to_string(),
                role: UserRole::Owner,
                password_hash: hash_password(TEST_PASSWORD).expect("Failed to hash password"),
            })
            .await
            .expect("Failed to create test user");

        let token = self.sign_in(&email, TEST_PASSWORD).await;

        Tenant {
            company,
            user,
            email,
            token,
        }
    }

    /// Sign in over HTTP and return the session token.
    pub async fn sign_in(&self, email: &str, password: &str) -> String {
        let response = self
            .client
            .post(format!("{}/auth/sign-in", self.address))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request");
        assert!(
            response.status().is_success(),
            "Sign-in failed with status {}",
            response.status()
        );

        let body: Value = response.json().await.expect("Failed to parse JSON");
        body["token"]
            .as_str()
            .expect("Sign-in response is missing the token")
            .to_string()
    }

    pub async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, token: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn patch(&self, path: &str, token: &str, body: &Value) -> reqwest::Response {
        self.client
            .patch(format!("{}{}", self.address, path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Create a plan over HTTP and return it.
    pub async fn create_plan(&self, token: &str, name: &str, price: &str) -> Value {
        let response = self
            .post(
                "/plans",
                token,
                &json!({ "name": name, "price": price, "interval": "month" }),
            )
            .await;
        assert_eq!(response.status(), 201, "Failed to create test plan");
        let body: Value = response.json().await.expect("Failed to parse JSON");
        body["plan"].clone()
    }

    /// Create a subscription over HTTP and return it.
    pub async fn create_subscription(&self, token: &str, plan_id: &str) -> Value {
        let response = self
            .post("/subscriptions", token, &json!({ "plan_id": plan_id }))
            .await;
        assert_eq!(response.status(), 201, "Failed to create test subscription");
        let body: Value = response.json().await.expect("Failed to parse JSON");
        body["subscription"].clone()
    }
}

/// Parse a uuid out of a JSON string field.
pub fn id_of(value: &Value) -> Uuid {
    value["id"]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .expect("Value has no id field")
}
