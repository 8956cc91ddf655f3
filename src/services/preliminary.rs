//! Progressive context controller.
//!
//! Runs one conversation as an explicit bounded loop. Each round the agent
//! either asks for more read-only context of an offered kind, or submits the
//! final action. Context requests are checked against the source catalogs,
//! resolved, and appended to the history; the kind is then withdrawn from the
//! offered set so the next round's action schema can no longer express it.
//!
//! A controller is created per conversation and never shared.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    render_issues, ActionSchema, AgentAction, CallTally, ConversationMessage, ConversationRequest,
    FinalAction, GeneratedArtifact, OperationKey, PreliminaryKind, PreliminaryRequest, ProgressPayload,
    ReplyOutcome, SchemaCatalog, ShapeCatalog, TokenUsage, ValidationIssue,
};

use super::agent_context::AgentContext;
use super::metrics::OperationMetrics;

/// Name of the single function every agent must call.
pub const FUNCTION_NAME: &str = "process";

/// Read-only data a conversation may request.
#[derive(Debug, Clone, Copy)]
pub struct PreliminarySources<'a> {
    pub schemas: &'a SchemaCatalog,
    pub shapes: &'a ShapeCatalog,
    /// Previously generated artifacts, keyed by entry point name.
    pub prior_artifacts: &'a BTreeMap<String, GeneratedArtifact>,
}

impl PreliminarySources<'_> {
    fn keys(&self, kind: PreliminaryKind) -> Vec<String> {
        match kind {
            PreliminaryKind::EntitySchemas => self.schemas.names(),
            PreliminaryKind::TargetShapes => self.shapes.names(),
            PreliminaryKind::PriorArtifacts => self.prior_artifacts.keys().cloned().collect(),
        }
    }

    fn contains(&self, kind: PreliminaryKind, key: &str) -> bool {
        match kind {
            PreliminaryKind::EntitySchemas => self.schemas.contains(key),
            PreliminaryKind::TargetShapes => self.shapes.contains(key),
            PreliminaryKind::PriorArtifacts => self.prior_artifacts.contains_key(key),
        }
    }

    fn render(&self, kind: PreliminaryKind, key: &str) -> DomainResult<String> {
        let body = match kind {
            PreliminaryKind::EntitySchemas => to_json_block(self.schemas.require(key)?)?,
            PreliminaryKind::TargetShapes => to_json_block(self.shapes.require(key)?)?,
            PreliminaryKind::PriorArtifacts => match self.prior_artifacts.get(key) {
                Some(artifact) => format!("```typescript\n// {}\n{}\n```", artifact.location, artifact.content),
                None => return Err(DomainError::ValidationFailed(format!("prior artifact not found: {key}"))),
            },
        };
        Ok(format!("### {key}\n{body}"))
    }
}

fn to_json_block<T: Serialize>(value: &T) -> DomainResult<String> {
    Ok(format!("```json\n{}\n```", serde_json::to_string_pretty(value)?))
}

/// Result of a converged conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Completed<T> {
    pub value: T,
    /// Rounds it took, including context fetches and rejected replies.
    pub trials: u32,
}

/// Per-conversation progressive context state.
#[derive(Debug)]
pub struct PreliminaryController<'a> {
    sources: PreliminarySources<'a>,
    offered: BTreeSet<PreliminaryKind>,
    known: BTreeMap<PreliminaryKind, BTreeSet<String>>,
}

impl<'a> PreliminaryController<'a> {
    /// Offer every kind in `declared`.
    pub fn new(sources: PreliminarySources<'a>, declared: impl IntoIterator<Item = PreliminaryKind>) -> Self {
        Self {
            sources,
            offered: declared.into_iter().collect(),
            known: BTreeMap::new(),
        }
    }

    /// Record keys already present in the seed prompt.
    pub fn with_known(mut self, kind: PreliminaryKind, keys: impl IntoIterator<Item = String>) -> Self {
        self.known.entry(kind).or_default().extend(keys);
        self
    }

    /// Mark a kind as supplied locally in full; it is never offered.
    pub fn with_local(mut self, kind: PreliminaryKind) -> Self {
        self.offered.remove(&kind);
        let keys = self.sources.keys(kind);
        self.known.entry(kind).or_default().extend(keys);
        self
    }

    pub fn offered(&self) -> &BTreeSet<PreliminaryKind> {
        &self.offered
    }

    pub fn known(&self, kind: PreliminaryKind) -> Vec<String> {
        self.known
            .get(&kind)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Check a context request against the source data.
    pub fn validate(&self, request: &PreliminaryRequest) -> Vec<ValidationIssue> {
        let path = format!("$input.request[{}].names", request.kind.tag());
        let mut issues = Vec::new();

        if !self.offered.contains(&request.kind) {
            issues.push(ValidationIssue::new(
                "$input.request.type",
                "an offered action",
                format!("`{}` is not available anymore", request.kind.tag()),
            ));
            return issues;
        }
        if request.names.is_empty() {
            issues.push(ValidationIssue::new(&path, "at least one name", "no names were requested"));
            return issues;
        }

        let unknown: Vec<&String> = request
            .names
            .iter()
            .filter(|name| !self.sources.contains(request.kind, name))
            .collect();
        if !unknown.is_empty() {
            let valid = self.sources.keys(request.kind);
            for name in unknown {
                issues.push(ValidationIssue::new(
                    &path,
                    format!("one of [{}]", valid.join(", ")),
                    format!("`{name}` does not exist"),
                ));
            }
            return issues;
        }

        let known = self.known.get(&request.kind);
        let all_known = request
            .names
            .iter()
            .all(|name| known.is_some_and(|k| k.contains(name)));
        if all_known {
            issues.push(ValidationIssue::new(
                &path,
                "names not already provided",
                format!(
                    "[{}] already provided; use what you have or request something else",
                    request.names.join(", ")
                ),
            ));
        }
        issues
    }

    /// Load the requested data and withdraw the kind from the offered set.
    ///
    /// Returns the context message plus the known and newly supplied keys.
    fn resolve(&mut self, request: &PreliminaryRequest) -> DomainResult<(ConversationMessage, Vec<String>, Vec<String>)> {
        let known_before = self.known(request.kind);
        let known = self.known.entry(request.kind).or_default();

        let mut requested = Vec::new();
        let mut sections = Vec::new();
        for name in &request.names {
            if known.contains(name) || requested.contains(name) {
                continue;
            }
            sections.push(self.sources.render(request.kind, name)?);
            requested.push(name.clone());
        }
        known.extend(requested.iter().cloned());
        self.offered.remove(&request.kind);

        let message = ConversationMessage::Context {
            kind: request.kind,
            text: sections.join("\n\n"),
        };
        Ok((message, known_before, requested))
    }

    /// Drive a conversation to a validated final action.
    ///
    /// `validate_final` returns the structural issues of a submitted final
    /// action; an empty list accepts it.
    #[instrument(skip_all, fields(operation = %operation, unit = %unit))]
    pub async fn orchestrate<T, F>(
        &mut self,
        ctx: &AgentContext,
        operation: OperationKey,
        unit: &str,
        mut history: Vec<ConversationMessage>,
        mut validate_final: F,
    ) -> DomainResult<Completed<T>>
    where
        T: FinalAction,
        F: FnMut(&T) -> DomainResult<Vec<ValidationIssue>>,
    {
        let max_rounds = ctx.config.max_rounds;
        let cache_key = ctx.cache_key(operation, unit);

        for trial in 1..=max_rounds {
            let schema = ActionSchema::new::<T>(FUNCTION_NAME, self.offered.clone());
            let request = ConversationRequest {
                history: history.clone(),
                schema: schema.clone(),
                cache_key: cache_key.clone(),
            };

            let mut tally = CallTally {
                attempted: 1,
                ..Default::default()
            };
            let timeout = Duration::from_secs(ctx.config.round_timeout_secs);
            let reply = match tokio::time::timeout(timeout, ctx.converser.converse(request)).await {
                Ok(result) => result,
                Err(_) => Err(DomainError::Timeout(ctx.config.round_timeout_secs)),
            };
            let reply = match reply {
                Ok(reply) => reply,
                Err(e) if e.is_retryable() => {
                    warn!(trial, error = %e, "Vendor round failed, retrying");
                    record(ctx, operation, TokenUsage::default(), tally).await;
                    if ctx.config.retry_cooldown_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(ctx.config.retry_cooldown_ms)).await;
                    }
                    continue;
                }
                Err(e) => {
                    record(ctx, operation, TokenUsage::default(), tally).await;
                    return Err(e);
                }
            };

            let arguments = match reply.outcome {
                ReplyOutcome::Text(text) => {
                    debug!(trial, "Agent replied with text instead of a function call");
                    tally.consented = 1;
                    record(ctx, operation, reply.usage, tally).await;
                    history.push(ConversationMessage::AssistantText { text });
                    history.push(ConversationMessage::feedback(format!(
                        "Do not reply with text. Call the `{FUNCTION_NAME}` function with one of [{}].",
                        schema.tags().join(", ")
                    )));
                    continue;
                }
                ReplyOutcome::Action(arguments) => arguments,
            };
            history.push(ConversationMessage::AssistantAction {
                arguments: arguments.clone(),
            });

            match schema.parse::<T>(&arguments) {
                Err(malformed) => {
                    debug!(trial, reason = %malformed, "Malformed agent reply");
                    tally.malformed = 1;
                    record(ctx, operation, reply.usage, tally).await;
                    history.push(ConversationMessage::feedback(format!(
                        "Your function call does not match the declared schema: {malformed}"
                    )));
                }
                Ok(AgentAction::Preliminary(request)) => {
                    let issues = self.validate(&request);
                    if !issues.is_empty() {
                        tally.validation_failed = 1;
                        record(ctx, operation, reply.usage, tally).await;
                        history.push(ConversationMessage::feedback(render_issues(&issues)));
                        continue;
                    }

                    let (message, known, requested) = self.resolve(&request)?;
                    history.push(message);
                    let totals = record(ctx, operation, reply.usage, tally).await;
                    info!(trial, kind = %request.kind, count = requested.len(), "Supplied preliminary context");
                    ctx.progress.publish(
                        ProgressPayload::PreliminaryRound {
                            operation,
                            unit: unit.to_string(),
                            kind: request.kind,
                            trial,
                            known,
                            requested,
                        },
                        totals,
                    );
                }
                Ok(AgentAction::Complete(value)) => {
                    let issues = validate_final(&value)?;
                    if issues.is_empty() {
                        tally.succeeded = 1;
                        record(ctx, operation, reply.usage, tally).await;
                        debug!(trial, "Conversation converged");
                        return Ok(Completed { value, trials: trial });
                    }

                    debug!(trial, issues = issues.len(), "Final action rejected");
                    tally.validation_failed = 1;
                    record(ctx, operation, reply.usage, tally).await;
                    history.push(ConversationMessage::feedback(render_issues(&issues)));
                }
            }
        }

        warn!(max_rounds, "Conversation did not converge");
        Err(DomainError::ConvergenceFailed {
            operation: operation.to_string(),
            unit: unit.to_string(),
            trials: max_rounds,
        })
    }
}

async fn record(ctx: &AgentContext, operation: OperationKey, usage: TokenUsage, tally: CallTally) -> OperationMetrics {
    ctx.metrics.record(operation, OperationMetrics { usage, tally }).await
}
