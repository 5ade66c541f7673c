use billflow_service::config::Config;
use billflow_service::error::AppError;
use billflow_service::services::seed::seed_demo_data;
use billflow_service::services::{init_metrics, init_tracing};
use billflow_service::startup::Application;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Fail fast on invalid configuration
    let config = Config::from_env()?;

    init_tracing(env!("CARGO_PKG_NAME"), &config.log_level);
    init_metrics();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = config.environment.as_str(),
        store = ?config.store.backend,
        "Starting billing service"
    );

    let seed_requested = config.seed_demo_data;
    let application = Application::build(config).await?;

    if seed_requested {
        seed_demo_data(application.store()).await?;
    }

    application.run_until_stopped().await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}
