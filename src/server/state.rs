//! Application state shared across handlers

use chrono::{DateTime, Utc};

use crate::config::PipelineConfig;

/// Handlers reload artifacts on every request, so the state only records
/// where they live.
#[derive(Debug, Clone)]
pub struct AppState {
    pub pipeline: PipelineConfig,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(pipeline: PipelineConfig) -> Self {
        Self {
            pipeline,
            started_at: Utc::now(),
        }
    }

    pub fn uptime_secs(&self) -> i64 {
        Utc::now().signed_duration_since(self.started_at).num_seconds()
    }

    /// Whether both artifacts are on disk
    pub fn artifacts_ready(&self) -> bool {
        self.pipeline.encoder_path.exists() && self.pipeline.model_path.exists()
    }
}
