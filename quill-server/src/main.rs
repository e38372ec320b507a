//! quill server binary

use anyhow::Context;
use quill_engine::StorageEngine;
use quill_server::{config, AppState, QuillServer, ServerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = config::command().get_matches();
    let config = ServerConfig::from_matches(&matches)?;

    init_tracing(config.log_json);

    info!("Starting quill server");
    info!("Data directory: {}", config.data_dir.display());
    info!("Bind address: {}", config.bind);

    if !config.data_dir.exists() {
        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("failed to create data directory {}", config.data_dir.display())
        })?;
        info!("Created data directory: {}", config.data_dir.display());
    }

    let engine = StorageEngine::new(&config.data_dir).context("failed to initialize storage engine")?;
    info!("Storage engine initialized");

    let state = AppState::from_config(&config, engine)?;
    QuillServer::new(state).serve(config.bind).await?;

    info!("Server shutdown gracefully");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
