//! Prediction server
//!
//! Small axum front end over the inference service: an HTML form for
//! browsers and a JSON endpoint for programs.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::PipelineConfig;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Artifact locations the handlers load from
    pub pipeline: PipelineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            pipeline: PipelineConfig::from_env(),
        }
    }
}

impl ServerConfig {
    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }
}

/// Start the server with the given configuration
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();

    if !config.pipeline.model_path.exists() {
        warn!(
            model_path = %config.pipeline.model_path.display(),
            "No trained model found, predictions will fail until training runs"
        );
    }

    let state = Arc::new(AppState::new(config.pipeline.clone()));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        host = %config.host,
        port = config.port,
        encoder_path = %config.pipeline.encoder_path.display(),
        model_path = %config.pipeline.model_path.display(),
        started_at = %start_time.to_rfc3339(),
        "Mushroom prediction server starting"
    );
    info!(url = %format!("http://{}/predict_datapoint", addr), "Prediction form available");
    info!(url = %format!("http://{}/api/health", addr), "Health endpoint available");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Could not listen for ctrl+c, shutting down");
        }
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(
            uptime_secs = uptime.num_seconds(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_pipeline_overrides_artifacts() {
        let config = ServerConfig::default().with_pipeline(PipelineConfig::with_artifacts_dir("elsewhere"));
        assert!(config.pipeline.model_path.starts_with("elsewhere"));
        assert!(!config.host.is_empty());
    }
}
