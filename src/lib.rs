pub mod api;
pub mod config;
pub mod core_state;
pub mod db;
pub mod models;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::core_state::{CoreError, CoreState};

/// Run the service until Ctrl-C.
pub async fn run() -> Result<(), CoreError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = AppConfig::from_env()?;
    tracing::info!(
        database = %config.database_path.display(),
        bind_addr = %config.bind_addr,
        workers = config.worker_concurrency,
        step_timeout_ms = config.step_timeout.as_millis() as u64,
        "Configuration loaded"
    );

    let bind_addr = config.bind_addr;
    let core = CoreState::from_config(config)?;
    let mut server = api::start_api_server(core.clone(), bind_addr).await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown requested");

    server.shutdown();
    server.stopped().await;
    core.shutdown().await;

    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
