//! Spinner rendering of the orchestration progress stream.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::domain::models::{ProgressEvent, ProgressPayload};

const SPINNER_TEMPLATE: &str = "[{elapsed_precise}] {spinner:.green} {msg}";
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Create a spinner for indeterminate operations
pub fn create_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(SPINNER_CHARS);
    spinner.set_style(style);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// One-line description of a progress record.
pub fn describe(event: &ProgressEvent) -> String {
    let what = match &event.payload {
        ProgressPayload::PlanProduced {
            kind,
            shape,
            entity,
            completed,
            total,
        } => format!(
            "planned {kind} {shape} -> {} ({completed}/{total})",
            entity.as_deref().unwrap_or("skipped")
        ),
        ProgressPayload::DraftProduced {
            name, completed, total, ..
        } => format!("wrote {name} ({completed}/{total})"),
        ProgressPayload::CorrectionProduced {
            pass,
            name,
            round,
            changed,
            ..
        } => {
            let verdict = if *changed { "rewrote" } else { "kept" };
            format!("{} correction round {round}: {verdict} {name}", pass.as_str())
        }
        ProgressPayload::PreliminaryRound {
            operation,
            unit,
            kind,
            requested,
            ..
        } => format!("{operation} {unit}: fetched {} ({kind})", requested.join(", ")),
    };
    format!(
        "[step {}] {what} | {} tokens, {} calls, {} self-corrections",
        event.step,
        event.usage.total(),
        event.tally.attempted,
        event.tally.validation_failed + event.tally.malformed + event.tally.consented
    )
}

/// Background task that mirrors progress records onto a spinner.
pub struct ProgressRenderer {
    spinner: ProgressBar,
    handle: JoinHandle<()>,
}

impl ProgressRenderer {
    pub fn spawn(mut receiver: broadcast::Receiver<ProgressEvent>, hidden: bool) -> Self {
        let spinner = create_spinner();
        if hidden {
            spinner.set_draw_target(ProgressDrawTarget::hidden());
        }
        spinner.set_message("starting");

        let bar = spinner.clone();
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => bar.set_message(describe(&event)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Progress renderer lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self { spinner, handle }
    }

    pub fn finish(self, message: impl Into<String>) {
        self.handle.abort();
        self.spinner.finish_with_message(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ArtifactKind, CallTally, CorrectionPass, TokenUsage};

    fn event(payload: ProgressPayload) -> ProgressEvent {
        ProgressEvent {
            sequence: 4,
            timestamp: chrono::Utc::now(),
            step: 3,
            usage: TokenUsage::new(1200, 300),
            tally: CallTally {
                attempted: 5,
                succeeded: 3,
                consented: 1,
                validation_failed: 1,
                malformed: 0,
            },
            payload,
        }
    }

    #[test]
    fn test_describe_correction() {
        let line = describe(&event(ProgressPayload::CorrectionProduced {
            kind: ArtifactKind::Transformer,
            pass: CorrectionPass::Casting,
            name: "OrderTransformer".to_string(),
            round: 2,
            changed: false,
        }));
        assert_eq!(
            line,
            "[step 3] casting correction round 2: kept OrderTransformer | 1500 tokens, 5 calls, 2 self-corrections"
        );
    }

    #[test]
    fn test_describe_skipped_plan() {
        let line = describe(&event(ProgressPayload::PlanProduced {
            kind: ArtifactKind::Collector,
            shape: "IOrder.ICreate".to_string(),
            entity: None,
            completed: 1,
            total: 2,
        }));
        assert!(line.starts_with("[step 3] planned collector IOrder.ICreate -> skipped (1/2)"));
    }

    #[tokio::test]
    async fn test_renderer_follows_stream() {
        let (sender, receiver) = broadcast::channel(4);
        let renderer = ProgressRenderer::spawn(receiver, true);
        sender
            .send(event(ProgressPayload::DraftProduced {
                kind: ArtifactKind::Transformer,
                name: "OrderTransformer".to_string(),
                location: "src/transformers/OrderTransformer.ts".to_string(),
                completed: 1,
                total: 1,
            }))
            .unwrap();
        tokio::task::yield_now().await;
        renderer.finish("done");
    }
}
