//! Write orchestrator.
//!
//! Turns each generated plan into a draft artifact. Before a conversation
//! starts, the artifacts reachable through the target shape reference graph
//! are offered as neighbors; the accepted content may only call those.

use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ArtifactKind, ConversationMessage, FieldMappingEntry, FinalAction, GeneratedArtifact, MappingPlan, OperationKey,
    PreliminaryKind, ProgressPayload, SchemaCatalog, ShapeCatalog, Stage, ValidationIssue,
};

use super::agent_context::AgentContext;
use super::batch::{run_bounded, BatchResult};
use super::dependency_resolver::DependencyResolver;
use super::mapping_validator;
use super::neighbor_scan;
use super::preliminary::{PreliminaryController, PreliminarySources};
use super::templates;

/// Final action of a write conversation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WriteCompletion {
    /// One entry per member of the entity schema.
    pub mappings: Vec<FieldMappingEntry>,
    pub draft: String,
    /// Self-review of the draft.
    #[serde(default)]
    pub review: String,
    /// Revised content, or `null` when the draft stands.
    #[serde(default)]
    pub revise: Option<String>,
}

impl WriteCompletion {
    /// Content that is actually kept.
    pub fn effective_content(&self) -> &str {
        self.revise.as_deref().unwrap_or(&self.draft)
    }

    fn content_path(&self) -> &'static str {
        if self.revise.is_some() {
            "$input.revise"
        } else {
            "$input.draft"
        }
    }
}

/// JSON schema of a field mapping entry list.
pub(crate) fn mappings_schema() -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "member": { "type": "string" },
                "kind": { "type": "string", "enum": ["scalar", "belongsTo", "hasOne", "hasMany"] },
                "nullable": { "type": ["boolean", "null"] },
                "how": { "type": "string" }
            },
            "required": ["member", "kind", "nullable", "how"]
        }
    })
}

impl FinalAction for WriteCompletion {
    fn description() -> &'static str {
        "Submit the field mappings, the draft, its review and the optional revision."
    }

    fn properties() -> Value {
        json!({
            "mappings": mappings_schema(),
            "draft": { "type": "string" },
            "review": { "type": "string" },
            "revise": { "type": ["string", "null"] }
        })
    }

    fn required() -> &'static [&'static str] {
        &["mappings", "draft", "review", "revise"]
    }
}

/// Checks shared by the write and correction gates.
pub(crate) fn validate_content(
    resolver: &DependencyResolver,
    content: &str,
    entry_point: &str,
    allowed: &BTreeSet<String>,
    path: &str,
) -> DomainResult<Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    if !neighbor_scan::declares_entry_point(content, entry_point)? {
        issues.push(ValidationIssue::new(
            path,
            format!("a top-level declaration of `{entry_point}`"),
            format!("the content never declares `{entry_point}`"),
        ));
    }
    issues.extend(resolver.validate_neighbor_references(content, entry_point, allowed, path)?);
    Ok(issues)
}

const SYSTEM_PROMPT: &str = "You write TypeScript mapping functions between database entities and API payloads. \
Document how every member of the entity schema is handled, then write the function following the template. \
Only call the neighbor functions you are offered.";

/// Runs write conversations.
pub struct WriteOrchestrator<'a> {
    ctx: &'a AgentContext,
    schemas: &'a SchemaCatalog,
    shapes: &'a ShapeCatalog,
    prior_artifacts: &'a BTreeMap<String, GeneratedArtifact>,
    resolver: DependencyResolver,
}

impl<'a> WriteOrchestrator<'a> {
    pub fn new(
        ctx: &'a AgentContext,
        schemas: &'a SchemaCatalog,
        shapes: &'a ShapeCatalog,
        prior_artifacts: &'a BTreeMap<String, GeneratedArtifact>,
    ) -> Self {
        Self {
            ctx,
            schemas,
            shapes,
            prior_artifacts,
            resolver: DependencyResolver::new(),
        }
    }

    /// Write every generated plan of `kind` in `plans`.
    #[instrument(skip_all, fields(kind = %kind))]
    pub async fn orchestrate(&self, kind: ArtifactKind, plans: &[MappingPlan]) -> BatchResult<GeneratedArtifact> {
        let targets: Vec<(String, &MappingPlan)> = plans
            .iter()
            .filter(|p| p.kind == kind && p.is_generated())
            .map(|p| (p.entry_point_name(), p))
            .collect();
        let total = targets.len();
        let completed = AtomicUsize::new(0);
        info!(total, "Writing artifacts");

        let batch = run_bounded(self.ctx.config.max_concurrency, targets, |_, plan| {
            let completed = &completed;
            async move {
                let artifact = self.write_one(plan, plans).await?;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                self.ctx
                    .publish(ProgressPayload::DraftProduced {
                        kind,
                        name: artifact.name(),
                        location: artifact.location.clone(),
                        completed: done,
                        total,
                    })
                    .await;
                Ok(artifact)
            }
        })
        .await;

        info!(written = batch.successes().count(), failed = batch.failure_count(), "Writing finished");
        batch
    }

    fn neighbor_section(&self, neighbors: &[&MappingPlan]) -> String {
        if neighbors.is_empty() {
            return "No neighbor functions are available; map nested values inline.".to_string();
        }
        let mut sections = vec!["Neighbor functions you may call:".to_string()];
        for neighbor in neighbors {
            let name = neighbor.entry_point_name();
            let mut section = format!(
                "### {name}\n- shape: {}\n- entity: {}\n```typescript\n{}```",
                neighbor.target_shape_name,
                neighbor.entity_schema_name.as_deref().unwrap_or("none"),
                templates::signature(neighbor)
            );
            if let Some(prior) = self.prior_artifacts.get(&name) {
                section.push_str(&format!("\nCurrent implementation:\n```typescript\n{}\n```", prior.content));
            }
            sections.push(section);
        }
        sections.join("\n\n")
    }

    /// Run one write conversation.
    pub async fn write_one(&self, plan: &MappingPlan, plans: &[MappingPlan]) -> DomainResult<GeneratedArtifact> {
        let name = plan.entry_point_name();
        let entity_name = plan
            .entity_schema_name
            .as_deref()
            .ok_or_else(|| DomainError::PreconditionFailed(format!("plan for `{}` has no entity", plan.target_shape_name)))?;
        let schema = self.schemas.require(entity_name)?;
        let shape = self.shapes.require(&plan.target_shape_name)?;

        let neighbors = self.resolver.neighbors_by_reference_graph(plan, plans, self.shapes);
        let allowed: BTreeSet<String> = neighbors.iter().map(|p| p.entry_point_name()).collect();
        let required = mapping_validator::required_members(schema, self.schemas);

        let history = vec![
            ConversationMessage::system(SYSTEM_PROMPT),
            ConversationMessage::user(format!(
                "Write `{name}` at `{location}`.\n\n## Template\n```typescript\n{template}```\n\n\
                 ## Target shape `{shape_name}`\n```json\n{shape_json}\n```\n\n\
                 ## Entity schema `{entity_name}`\n```json\n{schema_json}\n```\n\n\
                 ## Members to map\n```json\n{members}\n```\n\n{neighbors}",
                location = plan.kind.location(&plan.target_shape_name),
                template = templates::signature(plan),
                shape_name = plan.target_shape_name,
                shape_json = serde_json::to_string_pretty(shape)?,
                schema_json = serde_json::to_string_pretty(schema)?,
                members = serde_json::to_string_pretty(&required)?,
                neighbors = self.neighbor_section(&neighbors),
            )),
        ];

        let sources = PreliminarySources {
            schemas: self.schemas,
            shapes: self.shapes,
            prior_artifacts: self.prior_artifacts,
        };
        let mut declared = vec![PreliminaryKind::EntitySchemas, PreliminaryKind::TargetShapes];
        if !self.prior_artifacts.is_empty() {
            declared.push(PreliminaryKind::PriorArtifacts);
        }
        let inlined_priors = allowed.iter().filter(|n| self.prior_artifacts.contains_key(*n)).cloned();
        let mut controller = PreliminaryController::new(sources, declared)
            .with_known(PreliminaryKind::EntitySchemas, [entity_name.to_string()])
            .with_known(PreliminaryKind::TargetShapes, [plan.target_shape_name.clone()])
            .with_known(PreliminaryKind::PriorArtifacts, inlined_priors);

        let resolver = &self.resolver;
        let catalog = self.schemas;
        let completed = controller
            .orchestrate::<WriteCompletion, _>(
                self.ctx,
                OperationKey::new(plan.kind, Stage::Write),
                &name,
                history,
                |completion| {
                    let mut issues =
                        mapping_validator::validate_as_issues(schema, catalog, &completion.mappings, "$input.mappings");
                    issues.extend(validate_content(
                        resolver,
                        completion.effective_content(),
                        &name,
                        &allowed,
                        completion.content_path(),
                    )?);
                    Ok(issues)
                },
            )
            .await?;

        let content = completed.value.effective_content().to_string();
        let neighbors = neighbor_scan::scan_references(&content, &name)?;
        Ok(GeneratedArtifact::new(plan.clone(), content, neighbors))
    }
}
