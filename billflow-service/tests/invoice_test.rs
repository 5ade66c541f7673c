mod common;

use chrono::{DateTime, Duration, Utc};
use common::TestApp;
use serde_json::{json, Value};
use uuid::Uuid;

#[tokio::test]
async fn generated_invoice_applies_the_tenant_tax_rate() {
    let app = TestApp::spawn().await;
    let tenant = app.tenant("acme").await;
    let plan = app.create_plan(&tenant.token, "Basic", "29.99").await;
    let subscription = app
        .create_subscription(&tenant.token, plan["id"].as_str().unwrap())
        .await;

    let response = app
        .patch(
            "/settings",
            &tenant.token,
            &json!({ "tax_rate": "8.5", "invoice_prefix": "ACME", "payment_terms_days": 15 }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .post(
            "/invoices",
            &tenant.token,
            &json!({ "subscription_id": subscription["id"] }),
        )
        .await;
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("Failed to parse JSON");
    let invoice = &body["invoice"];
    assert_eq!(invoice["status"], "open");
    assert_eq!(invoice["subtotal"], "29.99");
    assert_eq!(invoice["tax"], "2.5492");
    assert_eq!(invoice["total"], "32.5392");
    assert!(invoice["paid_at"].is_null());

    let items = body["items"].as_array().expect("items should be an array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["description"], "Basic - Monthly Subscription");
    assert_eq!(items[0]["quantity"], "1");
    assert_eq!(items[0]["unit_price"], "29.99");
    assert_eq!(items[0]["amount"], "29.99");

    // Due date honors the 15 day payment terms
    let due = DateTime::parse_from_rfc3339(invoice["due_date"].as_str().unwrap())
        .expect("Invalid due date")
        .with_timezone(&Utc);
    let now = Utc::now();
    assert!(due > now + Duration::days(14));
    assert!(due < now + Duration::days(16));
}

#[tokio::test]
async fn invoice_numbers_carry_the_tenant_prefix() {
    let app = TestApp::spawn().await;
    let tenant = app.tenant("acme").await;
    let plan = app.create_plan(&tenant.token, "Basic", "29.99").await;
    let subscription = app
        .create_subscription(&tenant.token, plan["id"].as_str().unwrap())
        .await;

    app.patch("/settings", &tenant.token, &json!({ "invoice_prefix": "ACME" }))
        .await;

    let response = app.post("/invoices", &tenant.token, &json!({})).await;
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("Failed to parse JSON");
    let number = body["invoice"]["invoice_number"].as_str().unwrap();

    let parts: Vec<&str> = number.split('-').collect();
    assert_eq!(parts.len(), 3, "Unexpected invoice number: {}", number);
    assert_eq!(parts[0], "ACME");
    assert_eq!(parts[1].len(), 6);
    assert!(parts[1].chars().all(|c| c.is_ascii_digit()));

    let sub_id = Uuid::parse_str(subscription["id"].as_str().unwrap()).unwrap();
    let expected_fragment = sub_id.simple().to_string()[..8].to_uppercase();
    assert_eq!(parts[2], expected_fragment);
}

#[tokio::test]
async fn invoices_are_denominated_in_the_plan_currency() {
    let app = TestApp::spawn().await;
    let tenant = app.tenant("acme").await;

    // Tenant settings say GBP, the plan says EUR; the plan wins
    app.patch("/settings", &tenant.token, &json!({ "currency": "GBP" }))
        .await;

    let response = app
        .post(
            "/plans",
            &tenant.token,
            &json!({ "name": "Euro Plan", "price": "19.00", "currency": "EUR", "interval": "month" }),
        )
        .await;
    let plan: Value = response.json().await.expect("Failed to parse JSON");
    app.create_subscription(&tenant.token, plan["plan"]["id"].as_str().unwrap())
        .await;

    let response = app.post("/invoices", &tenant.token, &json!({})).await;
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["invoice"]["currency"], "EUR");
}

#[tokio::test]
async fn generate_invoice_auto_selects_the_oldest_active_subscription() {
    let app = TestApp::spawn().await;
    let tenant = app.tenant("acme").await;
    let plan = app.create_plan(&tenant.token, "Basic", "29.99").await;
    let first = app
        .create_subscription(&tenant.token, plan["id"].as_str().unwrap())
        .await;
    let second = app
        .create_subscription(&tenant.token, plan["id"].as_str().unwrap())
        .await;

    let response = app.post("/invoices", &tenant.token, &json!({})).await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["invoice"]["subscription_id"], first["id"]);

    // Once the oldest is canceled the next active one is billed
    let path = format!("/subscriptions/{}/cancel", first["id"].as_str().unwrap());
    app.patch(&path, &tenant.token, &json!({})).await;

    let response = app.post("/invoices", &tenant.token, &json!({})).await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["invoice"]["subscription_id"], second["id"]);
}

#[tokio::test]
async fn generate_invoice_explains_what_is_missing() {
    let app = TestApp::spawn().await;
    let tenant = app.tenant("acme").await;

    // No subscriptions at all
    let response = app.post("/invoices", &tenant.token, &json!({})).await;
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(
        body["error"],
        "No subscriptions found. Please create a subscription first."
    );

    // Only canceled subscriptions
    let plan = app.create_plan(&tenant.token, "Basic", "29.99").await;
    let subscription = app
        .create_subscription(&tenant.token, plan["id"].as_str().unwrap())
        .await;
    let path = format!("/subscriptions/{}/cancel", subscription["id"].as_str().unwrap());
    app.patch(&path, &tenant.token, &json!({})).await;

    let response = app.post("/invoices", &tenant.token, &json!({})).await;
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(
        body["error"],
        "No active subscription found. Please activate a subscription first."
    );

    // An explicit id that does not exist
    let response = app
        .post(
            "/invoices",
            &tenant.token,
            &json!({ "subscription_id": Uuid::new_v4() }),
        )
        .await;
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["error"], "Subscription not found");
}

#[tokio::test]
async fn invoices_can_be_filtered_by_status() {
    let app = TestApp::spawn().await;
    let tenant = app.tenant("acme").await;
    let plan = app.create_plan(&tenant.token, "Basic", "29.99").await;

    // Two subscriptions so the invoice numbers cannot collide
    let first = app
        .create_subscription(&tenant.token, plan["id"].as_str().unwrap())
        .await;
    let second = app
        .create_subscription(&tenant.token, plan["id"].as_str().unwrap())
        .await;

    let open_invoice = app
        .post("/invoices", &tenant.token, &json!({ "subscription_id": first["id"] }))
        .await;
    let open_invoice: Value = open_invoice.json().await.expect("Failed to parse JSON");

    let paid_invoice = app
        .post("/invoices", &tenant.token, &json!({ "subscription_id": second["id"] }))
        .await;
    let paid_invoice: Value = paid_invoice.json().await.expect("Failed to parse JSON");
    let response = app
        .post(
            "/payments",
            &tenant.token,
            &json!({ "invoice_id": paid_invoice["invoice"]["id"] }),
        )
        .await;
    assert_eq!(response.status(), 201);

    let all: Value = app
        .get("/invoices", &tenant.token)
        .await
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(all["invoices"].as_array().map(Vec::len), Some(2));

    let open: Value = app
        .get("/invoices?status=open", &tenant.token)
        .await
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(open["invoices"].as_array().map(Vec::len), Some(1));
    assert_eq!(open["invoices"][0]["id"], open_invoice["invoice"]["id"]);

    let paid: Value = app
        .get("/invoices?status=paid", &tenant.token)
        .await
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(paid["invoices"].as_array().map(Vec::len), Some(1));
    assert_eq!(paid["invoices"][0]["id"], paid_invoice["invoice"]["id"]);
}

#[tokio::test]
async fn unknown_status_filters_are_rejected() {
    let app = TestApp::spawn().await;
    let tenant = app.tenant("acme").await;

    let response = app.get("/invoices?status=settled", &tenant.token).await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["error"], "Validation error");
}

#[tokio::test]
async fn get_invoice_returns_the_line_items() {
    let app = TestApp::spawn().await;
    let tenant = app.tenant("acme").await;
    let plan = app.create_plan(&tenant.token, "Basic", "29.99").await;
    app.create_subscription(&tenant.token, plan["id"].as_str().unwrap())
        .await;

    let created: Value = app
        .post("/invoices", &tenant.token, &json!({}))
        .await
        .json()
        .await
        .expect("Failed to parse JSON");
    let invoice_id = created["invoice"]["id"].as_str().unwrap();

    let response = app
        .get(&format!("/invoices/{}", invoice_id), &tenant.token)
        .await;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["invoice"]["id"], created["invoice"]["id"]);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["items"][0]["invoice_id"], created["invoice"]["id"]);
}

#[tokio::test]
async fn invoices_are_scoped_to_the_tenant() {
    let app = TestApp::spawn().await;
    let acme = app.tenant("acme").await;
    let globex = app.tenant("globex").await;
    let plan = app.create_plan(&acme.token, "Basic", "29.99").await;
    app.create_subscription(&acme.token, plan["id"].as_str().unwrap())
        .await;

    let created: Value = app
        .post("/invoices", &acme.token, &json!({}))
        .await
        .json()
        .await
        .expect("Failed to parse JSON");
    let invoice_id = created["invoice"]["id"].as_str().unwrap();

    let response = app
        .get(&format!("/invoices/{}", invoice_id), &globex.token)
        .await;
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["error"], "Invoice not found");

    let listed: Value = app
        .get("/invoices", &globex.token)
        .await
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(listed["invoices"].as_array().map(Vec::len), Some(0));
}
