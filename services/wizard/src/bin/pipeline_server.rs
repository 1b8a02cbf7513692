//! services/wizard/src/bin/pipeline_server.rs

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wizard_lib::{
    adapters::{InMemoryPipeline, KeywordScorer, LocalDiskStorage},
    config::{Config, StorageBackend},
    error::WizardError,
    web::{router, state::AppState},
};

#[tokio::main]
async fn main() -> Result<(), WizardError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Select Document Storage ---
    let storage = match &config.storage {
        StorageBackend::Local { base_path } => {
            tokio::fs::create_dir_all(base_path).await?;
            info!("Storing uploads under {}", base_path.display());
            Arc::new(LocalDiskStorage::new(base_path.clone()))
        }
        StorageBackend::Azure { container_name, .. } => {
            return Err(WizardError::Internal(format!(
                "Azure blob storage (container '{}') is not supported by this server; use STORAGE_TYPE=local",
                container_name
            )))
        }
    };

    // --- 3. Initialize the Pipeline ---
    let scorer = KeywordScorer::new()
        .map_err(|e| WizardError::Internal(format!("Invalid scorer pattern: {}", e)))?;
    let pipeline = InMemoryPipeline::new(config.upload_policy(), storage, Arc::new(scorer));

    // --- 4. Build the Shared AppState & Router ---
    let app_state = Arc::new(AppState {
        pipeline: Arc::new(pipeline),
        config: config.clone(),
    });
    let app = router(app_state);

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "OpenAPI document available at http://{}/api-docs/openapi.json",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
