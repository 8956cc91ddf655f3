//! Correction orchestrator.
//!
//! Repairs artifacts the external compiler rejected. A pass repeatedly
//! compiles the whole artifact set, opens one conversation per artifact that
//! still has diagnostics, and replaces its content wholesale with the
//! accepted rewrite. Every rejected `(content, diagnostics)` pair is kept in
//! order and shown to later rounds.

use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CompileOutcome, ConversationMessage, CorrectionPass, Diagnostic, EntitySchema, FailureRecord, FieldMappingEntry,
    FinalAction, GeneratedArtifact, MappingPlan, OperationKey, PreliminaryKind, ProgressPayload, SchemaCatalog,
    ShapeCatalog, SourceFile, ValidationIssue,
};
use crate::domain::ports::Compiler;

use super::agent_context::AgentContext;
use super::batch::run_bounded;
use super::dependency_resolver::DependencyResolver;
use super::mapping_validator;
use super::neighbor_scan;
use super::preliminary::{PreliminaryController, PreliminarySources};
use super::templates;
use super::write_orchestrator::{mappings_schema, validate_content};

/// Mappings and content of a corrected artifact.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CorrectedContent {
    pub mappings: Vec<FieldMappingEntry>,
    pub content: String,
}

/// Final action of a correction conversation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CorrectionCompletion {
    /// What the diagnostics mean and how they are fixed.
    #[serde(default)]
    pub analysis: String,
    /// The current content is already correct; nothing else is read.
    #[serde(default)]
    pub unchanged: bool,
    #[serde(default)]
    pub draft: Option<CorrectedContent>,
    #[serde(default)]
    pub review: String,
    #[serde(default)]
    pub revise: Option<CorrectedContent>,
}

impl CorrectionCompletion {
    /// Content that replaces the artifact, or `None` for the unchanged verdict.
    pub fn replacement(&self) -> Option<&CorrectedContent> {
        if self.unchanged {
            return None;
        }
        self.revise.as_ref().or(self.draft.as_ref())
    }

    fn replacement_path(&self) -> &'static str {
        if self.revise.is_some() {
            "$input.revise.content"
        } else {
            "$input.draft.content"
        }
    }
}

impl FinalAction for CorrectionCompletion {
    fn description() -> &'static str {
        "Submit the corrected artifact, or declare the current content unchanged."
    }

    fn properties() -> Value {
        let corrected = json!({
            "type": ["object", "null"],
            "properties": {
                "mappings": mappings_schema(),
                "content": { "type": "string" }
            },
            "required": ["mappings", "content"]
        });
        json!({
            "analysis": { "type": "string" },
            "unchanged": { "type": "boolean" },
            "draft": corrected.clone(),
            "review": { "type": "string" },
            "revise": corrected
        })
    }

    fn required() -> &'static [&'static str] {
        &["analysis", "unchanged", "draft", "review", "revise"]
    }
}

/// Collected outcome of one pass.
#[derive(Debug)]
pub struct CorrectionReport {
    pub artifacts: Vec<GeneratedArtifact>,
    /// Result of the last compilation of `artifacts`.
    pub outcome: CompileOutcome,
    /// Artifacts whose correction conversation failed; their content is kept.
    pub failures: Vec<(String, DomainError)>,
    pub rounds: u32,
}

/// Compile every artifact together.
pub async fn compile_artifacts(compiler: &dyn Compiler, artifacts: &[GeneratedArtifact]) -> DomainResult<CompileOutcome> {
    let files: Vec<SourceFile> = artifacts
        .iter()
        .map(|a| SourceFile {
            location: a.location.clone(),
            content: a.content.clone(),
        })
        .collect();
    compiler.compile(&files).await
}

fn system_prompt(pass: CorrectionPass) -> &'static str {
    match pass {
        CorrectionPass::Casting => {
            "You fix type errors in TypeScript mapping functions. Only repair casts, nullability \
             handling and value conversions the compiler rejects; keep the mapping logic as it is."
        }
        CorrectionPass::Overall => {
            "You fix TypeScript mapping functions the compiler rejects. Rework the mapping logic \
             where needed, but keep every member of the entity schema mapped."
        }
    }
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| format!("- {d}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_history(history: &[FailureRecord]) -> String {
    if history.is_empty() {
        return "No earlier attempts.".to_string();
    }
    history
        .iter()
        .enumerate()
        .map(|(i, record)| {
            format!(
                "### Attempt {}\n```typescript\n{}\n```\n{}",
                i + 1,
                record.artifact_content,
                render_diagnostics(&record.diagnostics)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One artifact handed to a correction conversation.
struct Attempt {
    artifact: GeneratedArtifact,
    diagnostics: Vec<Diagnostic>,
    history: Vec<FailureRecord>,
}

/// Runs correction passes.
pub struct CorrectionOrchestrator<'a> {
    ctx: &'a AgentContext,
    schemas: &'a SchemaCatalog,
    shapes: &'a ShapeCatalog,
    compiler: &'a dyn Compiler,
    resolver: DependencyResolver,
}

impl<'a> CorrectionOrchestrator<'a> {
    pub fn new(
        ctx: &'a AgentContext,
        schemas: &'a SchemaCatalog,
        shapes: &'a ShapeCatalog,
        compiler: &'a dyn Compiler,
    ) -> Self {
        Self {
            ctx,
            schemas,
            shapes,
            compiler,
            resolver: DependencyResolver::new(),
        }
    }

    /// Run one pass over `artifacts`.
    ///
    /// `history` holds the failure records of every artifact by entry point
    /// name and is extended in place, so a later pass sees earlier ones.
    #[instrument(skip_all, fields(pass = pass.as_str()))]
    pub async fn correct(
        &self,
        pass: CorrectionPass,
        mut artifacts: Vec<GeneratedArtifact>,
        history: &mut BTreeMap<String, Vec<FailureRecord>>,
    ) -> DomainResult<CorrectionReport> {
        let mut outcome = compile_artifacts(self.compiler, &artifacts).await?;
        let mut settled: BTreeSet<String> = BTreeSet::new();
        let mut failures = Vec::new();
        let mut rounds = 0;

        for round in 1..=self.ctx.config.correction_budget {
            let attempts: Vec<(String, Attempt)> = artifacts
                .iter()
                .filter(|a| !settled.contains(&a.name()))
                .filter_map(|a| {
                    let diagnostics = outcome.diagnostics_for(&a.location);
                    if diagnostics.is_empty() {
                        return None;
                    }
                    let name = a.name();
                    let attempt = Attempt {
                        artifact: a.clone(),
                        diagnostics,
                        history: history.get(&name).cloned().unwrap_or_default(),
                    };
                    Some((name, attempt))
                })
                .collect();
            if attempts.is_empty() {
                break;
            }
            rounds = round;
            info!(round, failing = attempts.len(), "Correcting artifacts");

            let current: BTreeMap<String, GeneratedArtifact> =
                artifacts.iter().map(|a| (a.name(), a.clone())).collect();
            let plans: Vec<MappingPlan> = artifacts.iter().map(|a| a.plan.clone()).collect();

            let batch = run_bounded(self.ctx.config.max_concurrency, attempts, |name, attempt| {
                let current = &current;
                let plans = &plans;
                async move {
                    let allowed: BTreeSet<String> = self
                        .resolver
                        .neighbors_by_reference_graph(&attempt.artifact.plan, plans, self.shapes)
                        .into_iter()
                        .map(MappingPlan::entry_point_name)
                        .collect();
                    let corrected = self.correct_one(pass, &attempt, &allowed, current).await?;
                    self.ctx
                        .publish(ProgressPayload::CorrectionProduced {
                            kind: attempt.artifact.kind,
                            pass,
                            name,
                            round,
                            changed: corrected.is_some(),
                        })
                        .await;
                    Ok((attempt, corrected))
                }
            })
            .await;

            for unit in batch.units {
                match unit.result {
                    Ok((attempt, corrected)) => {
                        history.entry(unit.unit.clone()).or_default().push(FailureRecord {
                            artifact_content: attempt.artifact.content.clone(),
                            diagnostics: attempt.diagnostics,
                        });
                        match corrected {
                            Some(artifact) => {
                                if let Some(slot) = artifacts.iter_mut().find(|a| a.name() == unit.unit) {
                                    *slot = artifact;
                                }
                            }
                            None => {
                                settled.insert(unit.unit);
                            }
                        }
                    }
                    Err(e) => {
                        warn!(unit = %unit.unit, error = %e, "Correction failed");
                        settled.insert(unit.unit.clone());
                        failures.push((unit.unit, e));
                    }
                }
            }

            outcome = compile_artifacts(self.compiler, &artifacts).await?;
            if outcome.is_success() {
                break;
            }
        }

        info!(rounds, clean = outcome.is_success(), failed = failures.len(), "Correction pass finished");
        Ok(CorrectionReport {
            artifacts,
            outcome,
            failures,
            rounds,
        })
    }

    /// Run one correction conversation. `None` means the agent kept the content.
    async fn correct_one(
        &self,
        pass: CorrectionPass,
        attempt: &Attempt,
        allowed: &BTreeSet<String>,
        current: &BTreeMap<String, GeneratedArtifact>,
    ) -> DomainResult<Option<GeneratedArtifact>> {
        let artifact = &attempt.artifact;
        let plan = &artifact.plan;
        let name = artifact.name();
        let entity_name = plan
            .entity_schema_name
            .as_deref()
            .ok_or_else(|| DomainError::PreconditionFailed(format!("artifact `{name}` has no entity")))?;
        let schema = self.schemas.require(entity_name)?;
        let required = mapping_validator::required_members(schema, self.schemas);
        let neighbors = allowed.iter().filter(|n| **n != name).cloned().collect::<Vec<_>>();

        let history = vec![
            ConversationMessage::system(system_prompt(pass)),
            ConversationMessage::user(format!(
                "Correct `{name}` at `{location}`.\n\n## Template\n```typescript\n{template}```\n\n\
                 ## Current content\n```typescript\n{content}\n```\n\n\
                 ## Diagnostics\n{diagnostics}\n\n## Earlier attempts\n{earlier}\n\n\
                 ## Entity schema `{entity_name}`\n```json\n{schema_json}\n```\n\n\
                 ## Members to map\n```json\n{members}\n```\n\n\
                 Neighbor functions you may call: [{neighbors}]",
                location = artifact.location,
                template = templates::signature(plan),
                content = artifact.content,
                diagnostics = render_diagnostics(&attempt.diagnostics),
                earlier = render_history(&attempt.history),
                schema_json = serde_json::to_string_pretty(schema)?,
                members = serde_json::to_string_pretty(&required)?,
                neighbors = neighbors.join(", "),
            )),
        ];

        let sources = PreliminarySources {
            schemas: self.schemas,
            shapes: self.shapes,
            prior_artifacts: current,
        };
        let mut declared = vec![PreliminaryKind::EntitySchemas, PreliminaryKind::TargetShapes];
        if current.len() > 1 {
            declared.push(PreliminaryKind::PriorArtifacts);
        }
        let mut controller = PreliminaryController::new(sources, declared)
            .with_known(PreliminaryKind::EntitySchemas, [entity_name.to_string()])
            .with_known(PreliminaryKind::PriorArtifacts, [name.clone()]);

        let resolver = &self.resolver;
        let catalog = self.schemas;
        let completed = controller
            .orchestrate::<CorrectionCompletion, _>(
                self.ctx,
                OperationKey::new(artifact.kind, pass.stage()),
                &name,
                history,
                |completion| validate_correction(resolver, schema, catalog, completion, &name, allowed),
            )
            .await?;

        let Some(replacement) = completed.value.replacement() else {
            return Ok(None);
        };
        let content = replacement.content.clone();
        let neighbors = neighbor_scan::scan_references(&content, &name)?;
        Ok(Some(artifact.with_content(content, neighbors)))
    }
}

/// Gate of a correction completion.
///
/// Coverage is checked on the draft mappings and, when present, on the
/// revised mappings; content checks apply to the replacement.
pub fn validate_correction(
    resolver: &DependencyResolver,
    schema: &EntitySchema,
    catalog: &SchemaCatalog,
    completion: &CorrectionCompletion,
    entry_point: &str,
    allowed: &BTreeSet<String>,
) -> DomainResult<Vec<ValidationIssue>> {
    if completion.unchanged {
        return Ok(Vec::new());
    }

    let mut issues = Vec::new();
    match &completion.draft {
        Some(draft) => issues.extend(mapping_validator::validate_as_issues(
            schema,
            catalog,
            &draft.mappings,
            "$input.draft.mappings",
        )),
        None => issues.push(ValidationIssue::new(
            "$input.draft",
            "the corrected mappings and content",
            "draft is null although unchanged is false",
        )),
    }
    if let Some(revise) = &completion.revise {
        issues.extend(mapping_validator::validate_as_issues(
            schema,
            catalog,
            &revise.mappings,
            "$input.revise.mappings",
        ));
    }
    if let Some(replacement) = completion.replacement() {
        issues.extend(validate_content(
            resolver,
            &replacement.content,
            entry_point,
            allowed,
            completion.replacement_path(),
        )?);
    }
    Ok(issues)
}
