//! PostgreSQL store backend.

use crate::error::AppError;
use crate::models::{
    ApiKey, BillingSettings, Company, CreateApiKey, CreateCompany, CreateInvoice,
    CreateInvoiceItem, CreatePayment, CreatePlan, CreateSubscription, CreateUser, Invoice,
    InvoiceItem, InvoiceStatus, Payment, Plan, RecordUsage, RecordWebhook, Subscription,
    SubscriptionStatus, UpdateBillingSettings, UsageMetricSummary, UsageRecord, User, Webhook,
    WebhookStatus,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::store::BillingStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const INVOICE_COLUMNS: &str = "id, company_id, subscription_id, invoice_number, status, subtotal, tax, total, currency, due_date, paid_at, created_at, updated_at";
const SUBSCRIPTION_COLUMNS: &str = "id, company_id, plan_id, user_id, status, current_period_start, current_period_end, cancel_at_period_end, created_at, updated_at";
const API_KEY_COLUMNS: &str = "id, company_id, name, key_hash, key_salt, key_prefix, expires_at, is_active, last_used_at, created_at, updated_at";

/// Connection pool wrapper implementing [`BillingStore`] against PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new connection pool.
    #[instrument(skip(database_url))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the schema in ./migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl BillingStore for PgStore {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    // =========================================================================
    // Companies & users
    // =========================================================================

    #[instrument(skip(self, input), fields(slug = %input.slug))]
    async fn create_company(&self, input: &CreateCompany) -> Result<Company, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_company"])
            .start_timer();

        let company = sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (id, name, slug)
            VALUES ($1, $2, $3)
            RETURNING id, name, slug, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.slug)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        timer.observe_duration();
        info!(company_id = %company.id, slug = %company.slug, "Company created");

        Ok(company)
    }

    #[instrument(skip(self))]
    async fn find_company_by_slug(&self, slug: &str) -> Result<Option<Company>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_company_by_slug"])
            .start_timer();

        let company = sqlx::query_as::<_, Company>(
            "SELECT id, name, slug, created_at, updated_at FROM companies WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to find company: {}", e)))?;

        timer.observe_duration();

        Ok(company)
    }

    #[instrument(skip(self, input), fields(company_id = %input.company_id, email = %input.email))]
    async fn create_user(&self, input: &CreateUser) -> Result<User, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_user"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, company_id, email, name, role, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, company_id, email, name, role, password_hash, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.company_id)
        .bind(&input.email)
        .bind(&input.name)
        .bind(input.role.as_str())
        .bind(&input.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        timer.observe_duration();
        info!(user_id = %user.id, "User created");

        Ok(user)
    }

    #[instrument(skip(self, email))]
    async fn find_users_by_email(&self, email: &str) -> Result<Vec<User>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_users_by_email"])
            .start_timer();

        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, company_id, email, name, role, password_hash, created_at, updated_at
            FROM users
            WHERE email = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to find users: {}", e)))?;

        timer.observe_duration();

        Ok(users)
    }

    #[instrument(skip(self), fields(company_id = %company_id, user_id = %user_id))]
    async fn get_user(&self, company_id: Uuid, user_id: Uuid) -> Result<Option<User>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_user"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, company_id, email, name, role, password_hash, created_at, updated_at
            FROM users
            WHERE company_id = $1 AND id = $2
            "#,
        )
        .bind(company_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get user: {}", e)))?;

        timer.observe_duration();

        Ok(user)
    }

    // =========================================================================
    // Plans
    // =========================================================================

    #[instrument(skip(self, input), fields(company_id = %input.company_id))]
    async fn create_plan(&self, input: &CreatePlan) -> Result<Plan, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_plan"])
            .start_timer();

        let plan = sqlx::query_as::<_, Plan>(
            r#"
            INSERT INTO plans (id, company_id, name, description, price, currency, billing_interval, features)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, company_id, name, description, price, currency, billing_interval, features, is_active, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.company_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(&input.currency)
        .bind(input.interval.as_str())
        .bind(&input.features)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        timer.observe_duration();
        info!(plan_id = %plan.id, name = %plan.name, "Plan created");

        Ok(plan)
    }

    #[instrument(skip(self), fields(company_id = %company_id, plan_id = %plan_id))]
    async fn get_plan(&self, company_id: Uuid, plan_id: Uuid) -> Result<Option<Plan>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_plan"])
            .start_timer();

        let plan = sqlx::query_as::<_, Plan>(
            r#"
            SELECT id, company_id, name, description, price, currency, billing_interval, features, is_active, created_at, updated_at
            FROM plans
            WHERE company_id = $1 AND id = $2
            "#,
        )
        .bind(company_id)
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get plan: {}", e)))?;

        timer.observe_duration();

        Ok(plan)
    }

    #[instrument(skip(self), fields(company_id = %company_id))]
    async fn list_plans(&self, company_id: Uuid) -> Result<Vec<Plan>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_plans"])
            .start_timer();

        let plans = sqlx::query_as::<_, Plan>(
            r#"
            SELECT id, company_id, name, description, price, currency, billing_interval, features, is_active, created_at, updated_at
            FROM plans
            WHERE company_id = $1 AND is_active = TRUE
            ORDER BY price ASC, created_at ASC, id ASC
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list plans: {}", e)))?;

        timer.observe_duration();

        Ok(plans)
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    #[instrument(skip(self, input), fields(company_id = %input.company_id, plan_id = %input.plan_id))]
    async fn create_subscription(
        &self,
        input: &CreateSubscription,
    ) -> Result<Subscription, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_subscription"])
            .start_timer();

        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            INSERT INTO subscriptions (id, company_id, plan_id, user_id, status, current_period_start, current_period_end)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(input.company_id)
        .bind(input.plan_id)
        .bind(input.user_id)
        .bind(input.status.as_str())
        .bind(input.current_period_start)
        .bind(input.current_period_end)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        timer.observe_duration();
        info!(subscription_id = %subscription.id, "Subscription created");

        Ok(subscription)
    }

    #[instrument(skip(self), fields(company_id = %company_id, subscription_id = %subscription_id))]
    async fn get_subscription(
        &self,
        company_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_subscription"])
            .start_timer();

        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE company_id = $1 AND id = $2",
        ))
        .bind(company_id)
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get subscription: {}", e))
        })?;

        timer.observe_duration();

        Ok(subscription)
    }

    #[instrument(skip(self), fields(company_id = %company_id))]
    async fn first_active_subscription(
        &self,
        company_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["first_active_subscription"])
            .start_timer();

        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            SELECT {SUBSCRIPTION_COLUMNS}
            FROM subscriptions
            WHERE company_id = $1 AND status = $2
            ORDER BY created_at
            LIMIT 1
            "#,
        ))
        .bind(company_id)
        .bind(SubscriptionStatus::Active.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get active subscription: {}", e))
        })?;

        timer.observe_duration();

        Ok(subscription)
    }

    #[instrument(skip(self), fields(company_id = %company_id))]
    async fn count_subscriptions(&self, company_id: Uuid) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["count_subscriptions"])
            .start_timer();

        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE company_id = $1")
                .bind(company_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!(
                        "Failed to count subscriptions: {}",
                        e
                    ))
                })?;

        timer.observe_duration();

        Ok(count.0)
    }

    #[instrument(skip(self), fields(company_id = %company_id))]
    async fn list_subscriptions(&self, company_id: Uuid) -> Result<Vec<Subscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_subscriptions"])
            .start_timer();

        let subscriptions = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            SELECT {SUBSCRIPTION_COLUMNS}
            FROM subscriptions
            WHERE company_id = $1
            ORDER BY created_at DESC
            "#,
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list subscriptions: {}", e))
        })?;

        timer.observe_duration();

        Ok(subscriptions)
    }

    #[instrument(skip(self), fields(company_id = %company_id, subscription_id = %subscription_id))]
    async fn cancel_subscription(
        &self,
        company_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["cancel_subscription"])
            .start_timer();

        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            UPDATE subscriptions
            SET status = $3, cancel_at_period_end = FALSE, updated_at = now()
            WHERE company_id = $1 AND id = $2
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#,
        ))
        .bind(company_id)
        .bind(subscription_id)
        .bind(SubscriptionStatus::Canceled.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to cancel subscription: {}", e))
        })?;

        timer.observe_duration();

        if let Some(ref sub) = subscription {
            info!(subscription_id = %sub.id, "Subscription canceled");
        }

        Ok(subscription)
    }

    // =========================================================================
    // Invoices
    // =========================================================================

    #[instrument(skip(self, invoice, item), fields(company_id = %invoice.company_id, invoice_number = %invoice.invoice_number))]
    async fn create_invoice_with_item(
        &self,
        invoice: &CreateInvoice,
        item: &CreateInvoiceItem,
    ) -> Result<(Invoice, InvoiceItem), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice_with_item"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        // A duplicate invoice_number aborts here as Conflict; the caller
        // regenerates the number and retries.
        let created = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (id, company_id, subscription_id, invoice_number, status, subtotal, tax, total, currency, due_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(invoice.company_id)
        .bind(invoice.subscription_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.status.as_str())
        .bind(invoice.subtotal)
        .bind(invoice.tax)
        .bind(invoice.total)
        .bind(&invoice.currency)
        .bind(invoice.due_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;

        let created_item = sqlx::query_as::<_, InvoiceItem>(
            r#"
            INSERT INTO invoice_items (id, invoice_id, description, quantity, unit_price, amount)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, invoice_id, description, quantity, unit_price, amount, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(created.id)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;

        tx.commit().await.map_err(AppError::from)?;

        timer.observe_duration();
        info!(invoice_id = %created.id, invoice_number = %created.invoice_number, "Invoice created");

        Ok((created, created_item))
    }

    #[instrument(skip(self), fields(company_id = %company_id, invoice_id = %invoice_id))]
    async fn get_invoice(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE company_id = $1 AND id = $2",
        ))
        .bind(company_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    #[instrument(skip(self), fields(company_id = %company_id))]
    async fn list_invoices(
        &self,
        company_id: Uuid,
        status: Option<InvoiceStatus>,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE company_id = $1
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        ))
        .bind(company_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    async fn list_invoice_items(&self, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoice_items"])
            .start_timer();

        let items = sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT id, invoice_id, description, quantity, unit_price, amount, created_at
            FROM invoice_items
            WHERE invoice_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list invoice items: {}", e))
        })?;

        timer.observe_duration();

        Ok(items)
    }

    #[instrument(skip(self, payment), fields(company_id = %company_id, invoice_id = %invoice_id))]
    async fn pay_invoice(
        &self,
        company_id: Uuid,
        invoice_id: Uuid,
        payment: &CreatePayment,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<(Invoice, Payment)>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["pay_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        // The status guard makes concurrent double-pays lose: only one
        // UPDATE can match the unpaid row.
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET status = $3, paid_at = $4, updated_at = now()
            WHERE company_id = $1 AND id = $2 AND status <> $3
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(company_id)
        .bind(invoice_id)
        .bind(InvoiceStatus::Paid.as_str())
        .bind(paid_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?;

        let Some(invoice) = invoice else {
            tx.rollback().await.map_err(AppError::from)?;
            timer.observe_duration();
            return Ok(None);
        };

        let created_payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (id, invoice_id, amount, currency, status, payment_method, transaction_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, invoice_id, amount, currency, status, payment_method, transaction_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice.id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(&payment.payment_method)
        .bind(&payment.transaction_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;

        tx.commit().await.map_err(AppError::from)?;

        timer.observe_duration();
        info!(invoice_id = %invoice.id, payment_id = %created_payment.id, "Invoice paid");

        Ok(Some((invoice, created_payment)))
    }

    // =========================================================================
    // Payments
    // =========================================================================

    #[instrument(skip(self), fields(company_id = %company_id))]
    async fn list_payments(&self, company_id: Uuid) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT p.id, p.invoice_id, p.amount, p.currency, p.status, p.payment_method, p.transaction_id, p.created_at
            FROM payments p
            JOIN invoices i ON i.id = p.invoice_id
            WHERE i.company_id = $1
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        timer.observe_duration();

        Ok(payments)
    }

    // =========================================================================
    // Usage
    // =========================================================================

    #[instrument(skip(self, input), fields(company_id = %input.company_id, metric_name = %input.metric_name))]
    async fn record_usage(&self, input: &RecordUsage) -> Result<UsageRecord, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_usage"])
            .start_timer();

        let record = sqlx::query_as::<_, UsageRecord>(
            r#"
            INSERT INTO usage_records (id, company_id, subscription_id, metric_name, quantity, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, company_id, subscription_id, metric_name, quantity, recorded_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.company_id)
        .bind(input.subscription_id)
        .bind(&input.metric_name)
        .bind(input.quantity)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        timer.observe_duration();

        Ok(record)
    }

    #[instrument(skip(self), fields(company_id = %company_id))]
    async fn list_usage(
        &self,
        company_id: Uuid,
        subscription_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<UsageRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_usage"])
            .start_timer();

        let records = sqlx::query_as::<_, UsageRecord>(
            r#"
            SELECT id, company_id, subscription_id, metric_name, quantity, recorded_at, created_at
            FROM usage_records
            WHERE company_id = $1
              AND ($2::uuid IS NULL OR subscription_id = $2)
            ORDER BY recorded_at DESC
            LIMIT $3
            "#,
        )
        .bind(company_id)
        .bind(subscription_id)
        .bind(limit.clamp(1, 1000))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list usage: {}", e)))?;

        timer.observe_duration();

        Ok(records)
    }

    #[instrument(skip(self), fields(company_id = %company_id))]
    async fn usage_summary(&self, company_id: Uuid) -> Result<Vec<UsageMetricSummary>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["usage_summary"])
            .start_timer();

        let summary = sqlx::query_as::<_, UsageMetricSummary>(
            r#"
            SELECT metric_name,
                   SUM(quantity) AS total,
                   ROUND(AVG(quantity), 4) AS average,
                   MIN(quantity) AS minimum,
                   MAX(quantity) AS maximum,
                   COUNT(*) AS count
            FROM usage_records
            WHERE company_id = $1
            GROUP BY metric_name
            ORDER BY metric_name
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to summarize usage: {}", e))
        })?;

        timer.observe_duration();

        Ok(summary)
    }

    // =========================================================================
    // API keys
    // =========================================================================

    #[instrument(skip(self, input), fields(company_id = %input.company_id, name = %input.name))]
    async fn create_api_key(&self, input: &CreateApiKey) -> Result<ApiKey, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_api_key"])
            .start_timer();

        let key = sqlx::query_as::<_, ApiKey>(&format!(
            r#"
            INSERT INTO api_keys (id, company_id, name, key_hash, key_salt, key_prefix, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {API_KEY_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(input.company_id)
        .bind(&input.name)
        .bind(&input.key_hash)
        .bind(&input.key_salt)
        .bind(&input.key_prefix)
        .bind(input.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        timer.observe_duration();
        info!(api_key_id = %key.id, prefix = %key.key_prefix, "API key created");

        Ok(key)
    }

    #[instrument(skip(self), fields(company_id = %company_id))]
    async fn list_api_keys(&self, company_id: Uuid) -> Result<Vec<ApiKey>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_api_keys"])
            .start_timer();

        let keys = sqlx::query_as::<_, ApiKey>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE company_id = $1 ORDER BY created_at DESC",
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list API keys: {}", e)))?;

        timer.observe_duration();

        Ok(keys)
    }

    #[instrument(skip(self), fields(company_id = %company_id, key_id = %key_id))]
    async fn revoke_api_key(
        &self,
        company_id: Uuid,
        key_id: Uuid,
    ) -> Result<Option<ApiKey>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["revoke_api_key"])
            .start_timer();

        let key = sqlx::query_as::<_, ApiKey>(&format!(
            r#"
            UPDATE api_keys
            SET is_active = FALSE, updated_at = now()
            WHERE company_id = $1 AND id = $2
            RETURNING {API_KEY_COLUMNS}
            "#,
        ))
        .bind(company_id)
        .bind(key_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to revoke API key: {}", e)))?;

        timer.observe_duration();

        if let Some(ref k) = key {
            info!(api_key_id = %k.id, "API key revoked");
        }

        Ok(key)
    }

    #[instrument(skip(self))]
    async fn list_active_api_keys(&self) -> Result<Vec<ApiKey>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_active_api_keys"])
            .start_timer();

        let keys = sqlx::query_as::<_, ApiKey>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE is_active = TRUE",
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list active API keys: {}", e))
        })?;

        timer.observe_duration();

        Ok(keys)
    }

    #[instrument(skip(self), fields(key_id = %key_id))]
    async fn touch_api_key(&self, key_id: Uuid, used_at: DateTime<Utc>) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["touch_api_key"])
            .start_timer();

        sqlx::query("UPDATE api_keys SET last_used_at = $2, updated_at = now() WHERE id = $1")
            .bind(key_id)
            .bind(used_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to touch API key: {}", e))
            })?;

        timer.observe_duration();

        Ok(())
    }

    // =========================================================================
    // Settings
    // =========================================================================

    #[instrument(skip(self), fields(company_id = %company_id))]
    async fn get_settings(&self, company_id: Uuid) -> Result<Option<BillingSettings>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_settings"])
            .start_timer();

        let settings = sqlx::query_as::<_, BillingSettings>(
            r#"
            SELECT id, company_id, tax_rate, currency, invoice_prefix, payment_terms_days, webhook_url, created_at, updated_at
            FROM billing_settings
            WHERE company_id = $1
            "#,
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get settings: {}", e)))?;

        timer.observe_duration();

        Ok(settings)
    }

    #[instrument(skip(self, update), fields(company_id = %company_id))]
    async fn upsert_settings(
        &self,
        company_id: Uuid,
        update: &UpdateBillingSettings,
    ) -> Result<BillingSettings, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_settings"])
            .start_timer();

        let settings = sqlx::query_as::<_, BillingSettings>(
            r#"
            INSERT INTO billing_settings (id, company_id, tax_rate, currency, invoice_prefix, payment_terms_days, webhook_url)
            VALUES ($1, $2, COALESCE($3, 0), COALESCE($4, 'USD'), COALESCE($5, 'INV'), COALESCE($6, 30), $7)
            ON CONFLICT (company_id) DO UPDATE SET
                tax_rate = COALESCE($3, billing_settings.tax_rate),
                currency = COALESCE($4, billing_settings.currency),
                invoice_prefix = COALESCE($5, billing_settings.invoice_prefix),
                payment_terms_days = COALESCE($6, billing_settings.payment_terms_days),
                webhook_url = COALESCE($7, billing_settings.webhook_url),
                updated_at = now()
            RETURNING id, company_id, tax_rate, currency, invoice_prefix, payment_terms_days, webhook_url, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(update.tax_rate)
        .bind(&update.currency)
        .bind(&update.invoice_prefix)
        .bind(update.payment_terms_days)
        .bind(&update.webhook_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to upsert settings: {}", e))
        })?;

        timer.observe_duration();
        info!(company_id = %company_id, "Billing settings updated");

        Ok(settings)
    }

    // =========================================================================
    // Webhook event log
    // =========================================================================

    #[instrument(skip(self, input), fields(company_id = %input.company_id, event_type = %input.event_type))]
    async fn record_webhook(&self, input: &RecordWebhook) -> Result<Webhook, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_webhook"])
            .start_timer();

        let webhook = sqlx::query_as::<_, Webhook>(
            r#"
            INSERT INTO webhooks (id, company_id, event_type, payload, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, company_id, event_type, payload, status, response_status, response_body, attempts, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.company_id)
        .bind(&input.event_type)
        .bind(&input.payload)
        .bind(WebhookStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        timer.observe_duration();

        Ok(webhook)
    }

    #[instrument(skip(self), fields(company_id = %company_id))]
    async fn list_webhooks(&self, company_id: Uuid) -> Result<Vec<Webhook>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_webhooks"])
            .start_timer();

        let webhooks = sqlx::query_as::<_, Webhook>(
            r#"
            SELECT id, company_id, event_type, payload, status, response_status, response_body, attempts, created_at
            FROM webhooks
            WHERE company_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list webhooks: {}", e)))?;

        timer.observe_duration();

        Ok(webhooks)
    }
}
