pub(crate) mod auth;
mod handlers;
mod router;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::core::config::AppConfig;
use crate::core::engine::EngineClient;
use crate::core::history::HistoryReader;
use crate::core::lifecycle::LifecycleComponent;
use crate::core::tasks::TaskService;

pub struct ApiServerConfig {
    pub config: Arc<AppConfig>,
}

pub struct ApiServer {
    config: Arc<AppConfig>,
    handle: Option<JoinHandle<()>>,
}

/// Shared per-request context. Every member is cheap to clone and holds no
/// mutable state.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Arc<AppConfig>,
    pub(crate) engine: EngineClient,
    pub(crate) history: HistoryReader,
    pub(crate) tasks: TaskService,
}

impl AppState {
    pub(crate) fn new(config: Arc<AppConfig>) -> Self {
        let engine = EngineClient::new(config.engine.clone());
        let history = HistoryReader::new(&config.history.db_path);
        let tasks = TaskService::new(
            engine.clone(),
            history.clone(),
            Arc::new(config.catalog.clone()),
        );
        Self {
            config,
            engine,
            history,
            tasks,
        }
    }
}

impl ApiServer {
    pub fn new(config: ApiServerConfig) -> Self {
        Self {
            config: config.config,
            handle: None,
        }
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

#[async_trait]
impl LifecycleComponent for ApiServer {
    async fn on_init(&mut self) -> Result<()> {
        info!("API Server initializing...");
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        let addr = self.addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind API server to {}", addr))?;
        let app = router::build_api_router(AppState::new(self.config.clone()));

        info!("API Server running at http://{addr}");
        self.handle = Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("API Server crashed: {}", e);
            }
        }));
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("API Server shutting down...");
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
