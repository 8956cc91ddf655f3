//! Shared collaborators of every conversation in a run.

use std::sync::Arc;

use crate::domain::models::{OperationKey, OrchestrationConfig, ProgressEvent, ProgressPayload};
use crate::domain::ports::Converser;

use super::metrics::MetricsRecorder;
use super::progress::ProgressBus;

/// Everything a conversation needs besides its own state.
///
/// Cheap to clone; the metrics recorder and progress bus are shared.
#[derive(Clone)]
pub struct AgentContext {
    pub converser: Arc<dyn Converser>,
    pub metrics: MetricsRecorder,
    pub progress: Arc<ProgressBus>,
    pub config: OrchestrationConfig,
    /// Prefix of every prompt cache key issued during this run.
    pub run_id: String,
}

impl AgentContext {
    pub fn new(converser: Arc<dyn Converser>, config: OrchestrationConfig) -> Self {
        Self {
            converser,
            metrics: MetricsRecorder::new(),
            progress: Arc::new(ProgressBus::default()),
            config,
            run_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Stable cache key of one batch item, shared by all of its rounds and retries.
    pub fn cache_key(&self, operation: OperationKey, unit: &str) -> String {
        format!("{}:{}:{}", self.run_id, operation, unit)
    }

    /// Publish a progress record stamped with the current running totals.
    pub async fn publish(&self, payload: ProgressPayload) -> ProgressEvent {
        let totals = self.metrics.summary().await.total;
        self.progress.publish(payload, totals)
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("converser", &self.converser.name())
            .field("config", &self.config)
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}
