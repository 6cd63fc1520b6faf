use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::info;

use crate::core::config::AppConfig;
use crate::core::lifecycle::LifecycleManager;
use crate::core::terminal::{self, GuideSection};
use crate::interfaces::web::{ApiServer, ApiServerConfig};

/// Runs the API until Ctrl+C.
pub async fn run_serve(config: Arc<AppConfig>) -> Result<()> {
    terminal::print_banner();

    let mut lifecycle = LifecycleManager::new();
    lifecycle.attach(Arc::new(Mutex::new(ApiServer::new(ApiServerConfig {
        config: config.clone(),
    }))));
    lifecycle.start().await?;

    let engine = if config.engine.is_configured() {
        config.engine.base().to_string()
    } else {
        "not configured".to_string()
    };
    GuideSection::new("QED API")
        .status(
            "Listening",
            &format!("http://{}:{}/api", config.server.host, config.server.port),
        )
        .status("Engine", &engine)
        .status("History", &config.history.db_path.display().to_string())
        .blank()
        .text("Press Ctrl+C to stop.")
        .print();
    println!();

    tokio::signal::ctrl_c().await?;
    info!("Ctrl+C received, stopping.");
    lifecycle.shutdown().await
}
