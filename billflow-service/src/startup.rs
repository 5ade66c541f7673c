//! Application assembly: store selection, shared state, router, listener.

use crate::config::{Config, StoreBackend};
use crate::error::AppError;
use crate::handlers;
use crate::middleware::{metrics_middleware, request_id_middleware};
use crate::services::{ApiKeyService, BillingService, SessionService};
use crate::store::{BillingStore, MemoryStore, PgStore};
use axum::http::{header, HeaderValue, Method};
use axum::middleware::from_fn;
use axum::routing::{get, patch, post};
use axum::Router;
use secrecy::ExposeSecret;
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn BillingStore>,
    pub sessions: SessionService,
    pub api_keys: ApiKeyService,
    pub billing: BillingService,
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self, AppError> {
        let store: Arc<dyn BillingStore> = match config.store.backend {
            StoreBackend::Memory => {
                tracing::info!("Using in-memory store");
                Arc::new(MemoryStore::new())
            }
            StoreBackend::Postgres => {
                let store = PgStore::new(
                    config.store.database_url.expose_secret(),
                    config.store.max_connections,
                    config.store.min_connections,
                )
                .await?;
                store.run_migrations().await?;
                Arc::new(store)
            }
        };

        let state = AppState {
            sessions: SessionService::new(&config.auth),
            api_keys: ApiKeyService::new(Arc::clone(&store)),
            billing: BillingService::new(Arc::clone(&store)),
            store,
            config: config.clone(),
        };

        let app = build_router(state.clone());

        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Listening");

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn store(&self) -> Arc<dyn BillingStore> {
        Arc::clone(&self.state.store)
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.security.allowed_origins);

    Router::new()
        // Probes and metrics, no auth
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        // Credential exchange
        .route("/auth/sign-in", post(handlers::sign_in))
        // Dashboard routes; each handler extracts a TenantContext
        .route("/auth/me", get(handlers::me))
        .route(
            "/plans",
            post(handlers::create_plan).get(handlers::list_plans),
        )
        .route(
            "/subscriptions",
            post(handlers::create_subscription).get(handlers::list_subscriptions),
        )
        .route(
            "/subscriptions/:id/cancel",
            patch(handlers::cancel_subscription),
        )
        .route(
            "/invoices",
            post(handlers::generate_invoice).get(handlers::list_invoices),
        )
        .route("/invoices/:id", get(handlers::get_invoice))
        .route(
            "/payments",
            post(handlers::pay_invoice).get(handlers::list_payments),
        )
        .route(
            "/usage",
            post(handlers::record_usage).get(handlers::list_usage),
        )
        .route("/usage/summary", get(handlers::usage_summary))
        .route(
            "/api-keys",
            post(handlers::create_api_key).get(handlers::list_api_keys),
        )
        .route("/api-keys/:id/revoke", patch(handlers::revoke_api_key))
        .route(
            "/settings",
            get(handlers::get_settings).patch(handlers::update_settings),
        )
        .route("/webhooks", get(handlers::list_webhooks))
        // Machine ingestion; the handler extracts an ApiKeyIdentity
        .route("/v1/usage", post(handlers::ingest_usage))
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
