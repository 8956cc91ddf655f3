//! Plan orchestrator.
//!
//! Decides, for each target shape accepted by the artifact kind's naming
//! filter, whether an artifact is generated and from which entity schema.
//! One conversation per shape; conversations run concurrently.

use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, instrument};

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    ArtifactKind, ConversationMessage, FinalAction, GeneratedArtifact, MappingPlan, OperationKey, PlanReference,
    PreliminaryKind, ProgressPayload, SchemaCatalog, ShapeCatalog, ShapeFilterConfig, Stage, ValidationIssue,
};

use super::agent_context::AgentContext;
use super::batch::{run_bounded, BatchResult};
use super::preliminary::{PreliminaryController, PreliminarySources};

/// One plan as submitted by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedShape {
    pub target_shape_name: String,
    pub entity_schema_name: Option<String>,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub references: Vec<PlanReference>,
}

/// Final action of a plan conversation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlanCompletion {
    pub plans: Vec<PlannedShape>,
}

impl FinalAction for PlanCompletion {
    fn description() -> &'static str {
        "Submit the mapping plan for the requested target shape."
    }

    fn properties() -> Value {
        json!({
            "plans": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "targetShapeName": { "type": "string" },
                        "entitySchemaName": { "type": ["string", "null"] },
                        "rationale": { "type": "string" },
                        "references": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "name": { "type": "string" },
                                    "entitySchemaName": { "type": "string" },
                                    "source": { "type": "string" }
                                },
                                "required": ["name", "entitySchemaName", "source"]
                            }
                        }
                    },
                    "required": ["targetShapeName", "entitySchemaName", "rationale", "references"]
                }
            }
        })
    }

    fn required() -> &'static [&'static str] {
        &["plans"]
    }
}

/// Whether `shape_name` is planned for `kind` under the configured filters.
pub fn accepts(filters: &ShapeFilterConfig, kind: ArtifactKind, shape_name: &str) -> bool {
    match kind {
        ArtifactKind::Transformer => !filters
            .transformer_exclude_suffixes
            .iter()
            .any(|suffix| shape_name.ends_with(suffix.as_str())),
        ArtifactKind::Collector => filters
            .collector_include_suffixes
            .iter()
            .any(|suffix| shape_name.ends_with(suffix.as_str())),
    }
}

/// Structural checks of a plan completion for `shape`.
pub fn validate_plan(completion: &PlanCompletion, shape: &str, schemas: &SchemaCatalog) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if completion.plans.len() != 1 {
        issues.push(ValidationIssue::new(
            "$input.plans",
            format!("exactly one plan for `{shape}`"),
            format!("received {} plans; redo with only `{shape}`", completion.plans.len()),
        ));
    }

    let valid = || format!("one of [{}] or null", schemas.names().join(", "));
    for (index, plan) in completion.plans.iter().enumerate() {
        if plan.target_shape_name != shape {
            issues.push(ValidationIssue::new(
                format!("$input.plans[{index}].targetShapeName"),
                format!("\"{shape}\""),
                format!(
                    "you planned `{}`, but this conversation is only about `{shape}`; redo with only `{shape}`",
                    plan.target_shape_name
                ),
            ));
        }
        if let Some(entity) = &plan.entity_schema_name {
            if !schemas.contains(entity) {
                issues.push(ValidationIssue::new(
                    format!("$input.plans[{index}].entitySchemaName"),
                    valid(),
                    format!("entity schema `{entity}` does not exist"),
                ));
            }
        }
        for (r, reference) in plan.references.iter().enumerate() {
            if !schemas.contains(&reference.entity_schema_name) {
                issues.push(ValidationIssue::new(
                    format!("$input.plans[{index}].references[{r}].entitySchemaName"),
                    format!("one of [{}]", schemas.names().join(", ")),
                    format!("entity schema `{}` does not exist", reference.entity_schema_name),
                ));
            }
        }
    }
    issues
}

const SYSTEM_PROMPT: &str = "You plan mapping functions between API payload shapes and database entities. \
Decide which entity schema the requested shape is built from, or null when the shape has no backing entity. \
List every value the function cannot read from its input as a reference.";

fn seed_history(kind: ArtifactKind, shape: &str, shapes: &ShapeCatalog, schemas: &SchemaCatalog) -> DomainResult<Vec<ConversationMessage>> {
    let target = serde_json::to_string_pretty(shapes.require(shape)?)?;
    Ok(vec![
        ConversationMessage::system(SYSTEM_PROMPT),
        ConversationMessage::user(format!(
            "Plan the {kind} for target shape `{shape}`.\n\n```json\n{target}\n```\n\nAvailable entity schemas: [{}]",
            schemas.names().join(", ")
        )),
    ])
}

/// Runs plan conversations for one artifact kind.
pub struct PlanOrchestrator<'a> {
    ctx: &'a AgentContext,
    schemas: &'a SchemaCatalog,
    shapes: &'a ShapeCatalog,
    filters: &'a ShapeFilterConfig,
}

impl<'a> PlanOrchestrator<'a> {
    pub fn new(
        ctx: &'a AgentContext,
        schemas: &'a SchemaCatalog,
        shapes: &'a ShapeCatalog,
        filters: &'a ShapeFilterConfig,
    ) -> Self {
        Self {
            ctx,
            schemas,
            shapes,
            filters,
        }
    }

    /// Shapes planned for `kind`, in name order.
    pub fn shapes_for(&self, kind: ArtifactKind) -> Vec<String> {
        self.shapes
            .names()
            .into_iter()
            .filter(|name| accepts(self.filters, kind, name))
            .collect()
    }

    /// Plan every accepted shape of `kind`.
    #[instrument(skip_all, fields(kind = %kind))]
    pub async fn orchestrate(&self, kind: ArtifactKind) -> BatchResult<MappingPlan> {
        let shapes = self.shapes_for(kind);
        let total = shapes.len();
        let completed = AtomicUsize::new(0);
        info!(total, "Planning shapes");

        let units = shapes.into_iter().map(|s| (s, ())).collect();
        let batch = run_bounded(self.ctx.config.max_concurrency, units, |shape, ()| {
            let completed = &completed;
            async move {
                let plan = self.plan_one(kind, &shape).await?;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                self.ctx
                    .publish(ProgressPayload::PlanProduced {
                        kind,
                        shape: shape.clone(),
                        entity: plan.entity_schema_name.clone(),
                        completed: done,
                        total,
                    })
                    .await;
                Ok(plan)
            }
        })
        .await;

        info!(planned = batch.successes().count(), failed = batch.failure_count(), "Planning finished");
        batch
    }

    /// Run one plan conversation.
    pub async fn plan_one(&self, kind: ArtifactKind, shape: &str) -> DomainResult<MappingPlan> {
        let history = seed_history(kind, shape, self.shapes, self.schemas)?;
        let prior = BTreeMap::<String, GeneratedArtifact>::new();
        let sources = PreliminarySources {
            schemas: self.schemas,
            shapes: self.shapes,
            prior_artifacts: &prior,
        };
        let mut controller = PreliminaryController::new(
            sources,
            [PreliminaryKind::EntitySchemas, PreliminaryKind::TargetShapes],
        )
        .with_known(PreliminaryKind::TargetShapes, [shape.to_string()]);

        let schemas = self.schemas;
        let completed = controller
            .orchestrate::<PlanCompletion, _>(
                self.ctx,
                OperationKey::new(kind, Stage::Plan),
                shape,
                history,
                |completion| Ok(validate_plan(completion, shape, schemas)),
            )
            .await?;

        let planned = completed.value.plans.into_iter().next();
        let mut plan = MappingPlan::new(kind, shape, None);
        if let Some(planned) = planned {
            plan.entity_schema_name = planned.entity_schema_name;
            plan.rationale = planned.rationale;
            plan.references = planned.references;
        }
        Ok(plan)
    }
}
