mod common;

use billflow_service::models::{CreateCompany, CreateUser, UserRole};
use billflow_service::services::sessions::hash_password;
use common::{TestApp, TEST_PASSWORD};
use serde_json::{json, Value};

#[tokio::test]
async fn sign_in_returns_a_bearer_session() {
    let app = TestApp::spawn().await;
    let tenant = app.tenant("acme").await;

    let response = app
        .client
        .post(format!("{}/auth/sign-in", app.address))
        .json(&json!({ "email": tenant.email, "password": TEST_PASSWORD }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert!(!body["token"].as_str().unwrap_or_default().is_empty());
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 3600);
    assert_eq!(body["user"]["email"], tenant.email.as_str());
    assert_eq!(body["user"]["role"], "owner");
}

#[tokio::test]
async fn sign_in_never_leaks_the_password_hash() {
    let app = TestApp::spawn().await;
    let tenant = app.tenant("acme").await;

    let response = app
        .client
        .post(format!("{}/auth/sign-in", app.address))
        .json(&json!({ "email": tenant.email, "password": TEST_PASSWORD }))
        .send()
        .await
        .expect("Failed to execute request");

    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn wrong_password_and_unknown_email_are_indistinguishable() {
    let app = TestApp::spawn().await;
    let tenant = app.tenant("acme").await;

    let wrong_password = app
        .client
        .post(format!("{}/auth/sign-in", app.address))
        .json(&json!({ "email": tenant.email, "password": "not-the-password" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(wrong_password.status(), 401);
    let wrong_password: Value = wrong_password.json().await.expect("Failed to parse JSON");

    let unknown_email = app
        .client
        .post(format!("{}/auth/sign-in", app.address))
        .json(&json!({ "email": "nobody@acme.test", "password": TEST_PASSWORD }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(unknown_email.status(), 401);
    let unknown_email: Value = unknown_email.json().await.expect("Failed to parse JSON");

    assert_eq!(wrong_password["error"], "Invalid email or password");
    assert_eq!(unknown_email["error"], wrong_password["error"]);
}

#[tokio::test]
async fn shared_emails_sign_in_to_the_tenant_whose_password_matches() {
    let app = TestApp::spawn().await;

    // Email is unique per company, not globally
    let email = "owner@shared.test";
    let credentials = [("acme", "acme-password-123"), ("globex", "globex-password-123")];
    let mut company_ids = Vec::new();
    for (slug, password) in credentials {
        let company = app
            .store
            .create_company(&CreateCompany {
                name: format!("{} Inc", slug),
                slug: slug.to_string(),
            })
            .await
            .expect("Failed to create test company");
        app.store
            .create_user(&CreateUser {
                company_id: company.id,
                email: email.to_string(),
                name: "Shared Owner".to_string(),
                role: UserRole::Owner,
                password_hash: hash_password(password).expect("Failed to hash password"),
            })
            .await
            .expect("Failed to create test user");
        company_ids.push(company.id);
    }

    // Each password lands in its own tenant
    for (company_id, (_, password)) in company_ids.iter().zip(credentials) {
        let token = app.sign_in(email, password).await;
        let body: Value = app
            .get("/auth/me", &token)
            .await
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(body["user"]["company_id"], company_id.to_string());
        assert_eq!(body["user"]["email"], email);
    }

    // A password belonging to neither account is still rejected
    let response = app
        .client
        .post(format!("{}/auth/sign-in", app.address))
        .json(&json!({ "email": email, "password": "neither-password" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["error"], "Invalid email or password");
}

#[tokio::test]
async fn malformed_sign_in_requests_are_rejected() {
    let app = TestApp::spawn().await;

    // Not an email address
    let response = app
        .client
        .post(format!("{}/auth/sign-in", app.address))
        .json(&json!({ "email": "not-an-email", "password": "whatever" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 400);

    // Empty password
    let response = app
        .client
        .post(format!("{}/auth/sign-in", app.address))
        .json(&json!({ "email": "someone@acme.test", "password": "" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 400);

    // Not JSON at all
    let response = app
        .client
        .post(format!("{}/auth/sign-in", app.address))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn me_returns_the_session_user() {
    let app = TestApp::spawn().await;
    let tenant = app.tenant("acme").await;

    let response = app.get("/auth/me", &tenant.token).await;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["user"]["id"], tenant.user.id.to_string());
    assert_eq!(body["user"]["company_id"], tenant.company.id.to_string());
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn protected_routes_reject_missing_and_garbage_tokens() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/auth/me", app.address))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["error"], "Missing or invalid Authorization header");

    let response = app.get("/auth/me", "not-a-real-token").await;
    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["error"], "Invalid or expired token");
}
