//! Demo data for local runs: two tenants with users, plans, settings,
//! active subscriptions, sample invoices and API keys. Idempotent: when the
//! demo tenant already exists nothing is written.

use crate::error::AppError;
use crate::models::{
    CreateCompany, CreateInvoice, CreateInvoiceItem, CreatePayment, CreatePlan,
    CreateSubscription, CreateUser, EffectiveSettings, InvoiceStatus, PaymentStatus, PlanInterval,
    RecordUsage, SubscriptionStatus, UpdateBillingSettings, UserRole,
};
use crate::services::api_keys::ApiKeyService;
use crate::services::billing::{build_invoice_number, compute_invoice_amounts, period_end_for};
use crate::services::sessions::hash_password;
use crate::store::BillingStore;
use chrono::{Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

const DEMO_PASSWORD: &str = "password123";

pub async fn seed_demo_data(store: Arc<dyn BillingStore>) -> Result<(), AppError> {
    if store.find_company_by_slug("acme-corp").await?.is_some() {
        info!("Demo data already present, skipping seed");
        return Ok(());
    }

    info!("Seeding demo data");
    let password_hash = hash_password(DEMO_PASSWORD)?;

    let acme = store
        .create_company(&CreateCompany {
            name: "Acme Corp".to_string(),
            slug: "acme-corp".to_string(),
        })
        .await?;
    let techstart = store
        .create_company(&CreateCompany {
            name: "TechStart Inc".to_string(),
            slug: "techstart-inc".to_string(),
        })
        .await?;

    let john = store
        .create_user(&CreateUser {
            company_id: acme.id,
            email: "john@acme.com".to_string(),
            name: "John Doe".to_string(),
            role: UserRole::Owner,
            password_hash: password_hash.clone(),
        })
        .await?;
    store
        .create_user(&CreateUser {
            company_id: acme.id,
            email: "jane@acme.com".to_string(),
            name: "Jane Smith".to_string(),
            role: UserRole::Admin,
            password_hash: password_hash.clone(),
        })
        .await?;
    let bob = store
        .create_user(&CreateUser {
            company_id: techstart.id,
            email: "bob@techstart.com".to_string(),
            name: "Bob Johnson".to_string(),
            role: UserRole::Owner,
            password_hash,
        })
        .await?;

    store
        .upsert_settings(
            acme.id,
            &UpdateBillingSettings {
                tax_rate: Some(Decimal::new(85, 1)),
                currency: Some("USD".to_string()),
                invoice_prefix: Some("ACME".to_string()),
                payment_terms_days: Some(30),
                webhook_url: None,
            },
        )
        .await?;
    store
        .upsert_settings(
            techstart.id,
            &UpdateBillingSettings {
                tax_rate: Some(Decimal::new(100, 1)),
                currency: Some("USD".to_string()),
                invoice_prefix: Some("TECH".to_string()),
                payment_terms_days: Some(15),
                webhook_url: None,
            },
        )
        .await?;

    let basic = store
        .create_plan(&CreatePlan {
            company_id: acme.id,
            name: "Basic Plan".to_string(),
            description: Some("Perfect for small teams".to_string()),
            price: Decimal::new(2999, 2),
            currency: "USD".to_string(),
            interval: PlanInterval::Month,
            features: Some(serde_json::json!({
                "users": 5,
                "storage": "10GB",
                "support": "email",
            })),
        })
        .await?;
    store
        .create_plan(&CreatePlan {
            company_id: acme.id,
            name: "Pro Plan".to_string(),
            description: Some("For growing businesses".to_string()),
            price: Decimal::new(9999, 2),
            currency: "USD".to_string(),
            interval: PlanInterval::Month,
            features: Some(serde_json::json!({
                "users": 25,
                "storage": "100GB",
                "support": "priority",
            })),
        })
        .await?;
    let enterprise = store
        .create_plan(&CreatePlan {
            company_id: techstart.id,
            name: "Enterprise Plan".to_string(),
            description: Some("For large organizations".to_string()),
            price: Decimal::new(29999, 2),
            currency: "USD".to_string(),
            interval: PlanInterval::Month,
            features: Some(serde_json::json!({
                "users": "unlimited",
                "storage": "1TB",
                "support": "24/7",
            })),
        })
        .await?;

    let now = Utc::now();
    let acme_subscription = store
        .create_subscription(&CreateSubscription {
            company_id: acme.id,
            plan_id: basic.id,
            user_id: john.id,
            status: SubscriptionStatus::Active,
            current_period_start: now,
            current_period_end: period_end_for(now, PlanInterval::Month),
        })
        .await?;
    store
        .create_subscription(&CreateSubscription {
            company_id: techstart.id,
            plan_id: enterprise.id,
            user_id: bob.id,
            status: SubscriptionStatus::Active,
            current_period_start: now,
            current_period_end: period_end_for(now, PlanInterval::Month),
        })
        .await?;

    // Two sample invoices for Acme, one of them already paid. The numbers
    // use consecutive clock readings so they cannot collide.
    let settings = EffectiveSettings::from_stored(store.get_settings(acme.id).await?);
    let amounts = compute_invoice_amounts(basic.price, settings.tax_rate);
    let due_date = now + Duration::days(i64::from(settings.payment_terms_days));
    let millis = now.timestamp_millis();
    let item = CreateInvoiceItem {
        description: "Basic Plan - Monthly Subscription".to_string(),
        quantity: Decimal::ONE,
        unit_price: basic.price,
        amount: amounts.subtotal,
    };

    let (first_invoice, _) = store
        .create_invoice_with_item(
            &CreateInvoice {
                company_id: acme.id,
                subscription_id: acme_subscription.id,
                invoice_number: build_invoice_number(
                    &settings.invoice_prefix,
                    acme_subscription.id,
                    millis,
                ),
                status: InvoiceStatus::Open,
                subtotal: amounts.subtotal,
                tax: amounts.tax,
                total: amounts.total,
                currency: basic.currency.clone(),
                due_date,
            },
            &item,
        )
        .await?;
    store
        .create_invoice_with_item(
            &CreateInvoice {
                company_id: acme.id,
                subscription_id: acme_subscription.id,
                invoice_number: build_invoice_number(
                    &settings.invoice_prefix,
                    acme_subscription.id,
                    millis + 1,
                ),
                status: InvoiceStatus::Open,
                subtotal: amounts.subtotal,
                tax: amounts.tax,
                total: amounts.total,
                currency: basic.currency.clone(),
                due_date,
            },
            &item,
        )
        .await?;

    store
        .pay_invoice(
            acme.id,
            first_invoice.id,
            &CreatePayment {
                amount: first_invoice.total,
                currency: first_invoice.currency.clone(),
                status: PaymentStatus::Completed,
                payment_method: "demo_card".to_string(),
                transaction_id: format!("txn_{}", millis),
            },
            now,
        )
        .await?;

    // A month of API call volume for the dashboard charts.
    for _ in 0..30 {
        let quantity = Decimal::from(rand::rngs::OsRng.gen_range(1_000u32..11_000));
        store
            .record_usage(&RecordUsage {
                company_id: acme.id,
                subscription_id: acme_subscription.id,
                metric_name: "api_calls".to_string(),
                quantity,
            })
            .await?;
    }

    let keys = ApiKeyService::new(store.clone());
    let production = keys.issue(acme.id, "Production Key", None).await?;
    let test = keys.issue(acme.id, "Test Key", None).await?;
    info!(secret = %production.secret, "Demo API key issued (Production Key)");
    info!(secret = %test.secret, "Demo API key issued (Test Key)");

    info!("Demo data seeded");
    Ok(())
}
