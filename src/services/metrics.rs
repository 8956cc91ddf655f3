//! Aggregate metrics recorder with per-model cost estimation.
//!
//! Accumulates token usage and call-outcome counters per operation
//! (artifact kind x stage). Every update is an additive merge, so parallel
//! conversations can record concurrently in any order.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::models::{CallTally, OperationKey, TokenUsage};

/// Pricing per million tokens for a specific model.
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    /// Cost per million input tokens (USD).
    pub input: f64,
    /// Cost per million output tokens (USD).
    pub output: f64,
    /// Cost per million cache read tokens (USD).
    pub cache_read: f64,
    /// Cost per million cache write tokens (USD).
    pub cache_write: f64,
}

/// Known model pricing table (costs in USD per million tokens).
const PRICING_TABLE: &[(&str, ModelPricing)] = &[
    (
        "opus",
        ModelPricing { input: 15.0, output: 75.0, cache_read: 1.5, cache_write: 18.75 },
    ),
    (
        "sonnet",
        ModelPricing { input: 3.0, output: 15.0, cache_read: 0.3, cache_write: 3.75 },
    ),
    (
        "haiku",
        ModelPricing { input: 0.80, output: 4.0, cache_read: 0.08, cache_write: 1.0 },
    ),
];

/// Get pricing for a model by name or alias.
///
/// Matches against known model name substrings (e.g. "sonnet" matches
/// "claude-sonnet-4-5-20250929").
pub fn get_model_pricing(model: &str) -> Option<ModelPricing> {
    let model_lower = model.to_lowercase();
    PRICING_TABLE
        .iter()
        .find(|(name, _)| model_lower.contains(name))
        .map(|(_, pricing)| *pricing)
}

/// Estimate cost in USD for the given usage.
pub fn estimate_cost(model: &str, usage: &TokenUsage) -> Option<f64> {
    let pricing = get_model_pricing(model)?;

    let cost = (usage.input_tokens as f64 * pricing.input
        + usage.output_tokens as f64 * pricing.output
        + usage.cache_read_tokens as f64 * pricing.cache_read
        + usage.cache_write_tokens as f64 * pricing.cache_write)
        / 1_000_000.0;

    Some(cost)
}

/// Counters of one operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationMetrics {
    pub usage: TokenUsage,
    pub tally: CallTally,
}

impl OperationMetrics {
    pub fn merge(&mut self, other: &OperationMetrics) {
        self.usage += other.usage;
        self.tally += other.tally;
    }
}

/// Snapshot of all counters.
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub by_operation: BTreeMap<OperationKey, OperationMetrics>,
    pub total: OperationMetrics,
}

impl MetricsSummary {
    /// Format as a human-readable summary, pricing usage with `model`.
    pub fn format_summary(&self, model: &str) -> String {
        let usage = &self.total.usage;
        let tally = &self.total.tally;
        let mut s = match estimate_cost(model, usage) {
            Some(cost) => format!("Cost: ${cost:.4} ("),
            None => "Cost: unknown (".to_string(),
        };
        s.push_str(&format!(
            "{}K input, {}K output",
            usage.input_tokens / 1000,
            usage.output_tokens / 1000
        ));
        if usage.cache_read_tokens > 0 {
            s.push_str(&format!(", {}K cache_read", usage.cache_read_tokens / 1000));
        }
        if usage.cache_write_tokens > 0 {
            s.push_str(&format!(", {}K cache_write", usage.cache_write_tokens / 1000));
        }
        s.push(')');
        s.push_str(&format!(
            "\nCalls: {} attempted, {} succeeded, {} consented, {} validation failed, {} malformed",
            tally.attempted, tally.succeeded, tally.consented, tally.validation_failed, tally.malformed
        ));

        if self.by_operation.len() > 1 {
            s.push_str("\n  By operation:");
            for (key, metrics) in &self.by_operation {
                s.push_str(&format!(
                    "\n    {}: {} calls, {} tokens",
                    key,
                    metrics.tally.attempted,
                    metrics.usage.total()
                ));
            }
        }

        s
    }
}

/// Metrics recorder shared by every conversation of a run.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder {
    operations: Arc<RwLock<BTreeMap<OperationKey, OperationMetrics>>>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a delta to an operation and return the new running total.
    pub async fn record(&self, key: OperationKey, delta: OperationMetrics) -> OperationMetrics {
        let mut operations = self.operations.write().await;
        operations.entry(key).or_default().merge(&delta);
        let mut total = OperationMetrics::default();
        for metrics in operations.values() {
            total.merge(metrics);
        }
        total
    }

    pub async fn summary(&self) -> MetricsSummary {
        let operations = self.operations.read().await;
        let mut total = OperationMetrics::default();
        for metrics in operations.values() {
            total.merge(metrics);
        }
        MetricsSummary {
            by_operation: operations.clone(),
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ArtifactKind, Stage};

    fn key(stage: Stage) -> OperationKey {
        OperationKey::new(ArtifactKind::Transformer, stage)
    }

    fn usage(input: u64, output: u64) -> OperationMetrics {
        OperationMetrics {
            usage: TokenUsage::new(input, output),
            tally: CallTally::default(),
        }
    }

    #[test]
    fn test_get_model_pricing_full_name() {
        let pricing = get_model_pricing("claude-opus-4-6-20250616").unwrap();
        assert_eq!(pricing.input, 15.0);
        assert!(get_model_pricing("unknown-model").is_none());
    }

    #[test]
    fn test_estimate_cost_cache_read() {
        let usage = TokenUsage {
            cache_read_tokens: 1_000_000,
            ..Default::default()
        };
        let cost = estimate_cost("opus", &usage).unwrap();
        assert!((cost - 1.5).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_record_returns_running_total() {
        let recorder = MetricsRecorder::new();
        recorder.record(key(Stage::Plan), usage(100, 10)).await;
        let total = recorder
            .record(
                key(Stage::Write),
                OperationMetrics {
                    usage: TokenUsage::default(),
                    tally: CallTally {
                        attempted: 1,
                        ..Default::default()
                    },
                },
            )
            .await;

        assert_eq!(total.usage.input_tokens, 100);
        assert_eq!(total.tally.attempted, 1);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let recorder = MetricsRecorder::new();
        let mut handles = Vec::new();
        for _ in 0..32 {
            let recorder = recorder.clone();
            handles.push(tokio::spawn(async move {
                recorder
                    .record(
                        key(Stage::Write),
                        OperationMetrics {
                            usage: TokenUsage::new(10, 1),
                            tally: CallTally {
                                attempted: 1,
                                succeeded: 1,
                                ..Default::default()
                            },
                        },
                    )
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let summary = recorder.summary().await;
        assert_eq!(summary.total.tally.attempted, 32);
        assert_eq!(summary.total.usage.input_tokens, 320);
    }

    #[tokio::test]
    async fn test_format_lists_operations() {
        let recorder = MetricsRecorder::new();
        recorder.record(key(Stage::Plan), usage(10_000, 5_000)).await;
        recorder.record(key(Stage::Write), usage(20_000, 1_000)).await;

        let summary = recorder.summary().await;
        assert_eq!(summary.total.usage.input_tokens, 30_000);
        let formatted = summary.format_summary("sonnet");
        assert!(formatted.starts_with("Cost: $"));
        assert!(formatted.contains("By operation:"));
        assert!(formatted.contains("transformer.plan"));
    }

    #[test]
    fn test_summary_is_ordered_by_operation() {
        let recorder = MetricsRecorder::new();
        let summary = tokio_test::block_on(async {
            recorder.record(key(Stage::Write), usage(1, 1)).await;
            recorder.record(key(Stage::Plan), usage(1, 1)).await;
            recorder.summary().await
        });
        let stages: Vec<Stage> = summary.by_operation.keys().map(|k| k.stage).collect();
        assert_eq!(stages, vec![Stage::Plan, Stage::Write]);
    }
}
