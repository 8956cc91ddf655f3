//! End-to-end run over one schema/shape snapshot.
//!
//! Plan, write, then the casting and overall correction passes. Every step
//! bumps the progress step counter so subscribers can group records.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ArtifactKind, CompileOutcome, CorrectionPass, Diagnostic, FailureRecord, GeneratedArtifact, MappingPlan,
    SchemaCatalog, ShapeCatalog, ShapeFilterConfig, Stage,
};
use crate::domain::ports::Compiler;

use super::agent_context::AgentContext;
use super::correction_orchestrator::CorrectionOrchestrator;
use super::dependency_resolver::DependencyResolver;
use super::metrics::MetricsSummary;
use super::plan_orchestrator::PlanOrchestrator;
use super::write_orchestrator::WriteOrchestrator;

/// A unit that ended in an error instead of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    pub stage: Stage,
    pub unit: String,
    pub error: String,
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub plans: Vec<MappingPlan>,
    pub artifacts: Vec<GeneratedArtifact>,
    pub failures: Vec<UnitFailure>,
    /// Diagnostics left after the last correction pass.
    pub unresolved: Vec<Diagnostic>,
    pub failure_history: BTreeMap<String, Vec<FailureRecord>>,
    pub metrics: MetricsSummary,
    /// A call cycle among the final artifacts, if any.
    pub cycle: Option<Vec<String>>,
}

impl PipelineReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.unresolved.is_empty()
    }
}

fn failures_of(stage: Stage, failed: Vec<(String, DomainError)>) -> impl Iterator<Item = UnitFailure> {
    failed.into_iter().map(move |(unit, e)| {
        warn!(stage = stage.as_str(), unit = %unit, error = %e, "Unit failed");
        UnitFailure {
            stage,
            unit,
            error: e.to_string(),
        }
    })
}

/// Runs the whole generate, validate and correct sequence.
pub struct MappingPipeline {
    ctx: AgentContext,
    compiler: Arc<dyn Compiler>,
    filters: ShapeFilterConfig,
}

impl MappingPipeline {
    pub fn new(ctx: AgentContext, compiler: Arc<dyn Compiler>, filters: ShapeFilterConfig) -> Self {
        Self { ctx, compiler, filters }
    }

    pub fn context(&self) -> &AgentContext {
        &self.ctx
    }

    /// Run every stage.
    ///
    /// Fails only on missing inputs or when the compiler cannot run; unit
    /// failures are collected in the report.
    #[instrument(skip_all, fields(run_id = %self.ctx.run_id))]
    pub async fn run(
        &self,
        schemas: &SchemaCatalog,
        shapes: &ShapeCatalog,
        prior_artifacts: &BTreeMap<String, GeneratedArtifact>,
    ) -> DomainResult<PipelineReport> {
        if schemas.is_empty() {
            return Err(DomainError::PreconditionFailed("no entity schemas were supplied".to_string()));
        }
        if shapes.is_empty() {
            return Err(DomainError::PreconditionFailed("no target shapes were supplied".to_string()));
        }

        let mut failures = Vec::new();

        self.ctx.progress.set_step(1);
        let planner = PlanOrchestrator::new(&self.ctx, schemas, shapes, &self.filters);
        let mut plans = Vec::new();
        for kind in ArtifactKind::ALL {
            let (ok, failed) = planner.orchestrate(kind).await.partition();
            plans.extend(ok);
            failures.extend(failures_of(Stage::Plan, failed));
        }
        info!(plans = plans.len(), generated = plans.iter().filter(|p| p.is_generated()).count(), "Plans ready");

        self.ctx.progress.set_step(2);
        let writer = WriteOrchestrator::new(&self.ctx, schemas, shapes, prior_artifacts);
        let mut artifacts = Vec::new();
        for kind in ArtifactKind::ALL {
            let (ok, failed) = writer.orchestrate(kind, &plans).await.partition();
            artifacts.extend(ok);
            failures.extend(failures_of(Stage::Write, failed));
        }

        let corrector = CorrectionOrchestrator::new(&self.ctx, schemas, shapes, self.compiler.as_ref());
        let mut history = BTreeMap::new();
        let mut outcome = CompileOutcome::Success;
        if !artifacts.is_empty() {
            for (step, pass) in [(3, CorrectionPass::Casting), (4, CorrectionPass::Overall)] {
                self.ctx.progress.set_step(step);
                let report = corrector.correct(pass, artifacts, &mut history).await?;
                artifacts = report.artifacts;
                outcome = report.outcome;
                failures.extend(failures_of(pass.stage(), report.failures));
                if outcome.is_success() {
                    break;
                }
            }
        }

        let unresolved = match outcome {
            CompileOutcome::Success => Vec::new(),
            CompileOutcome::Failure { diagnostics } => diagnostics,
        };
        let cycle = DependencyResolver::new().detect_cycle(&artifacts);
        if let Some(cycle) = &cycle {
            warn!(cycle = %cycle.join(" -> "), "Generated artifacts call each other in a cycle");
        }

        let metrics = self.ctx.metrics.summary().await;
        info!(
            artifacts = artifacts.len(),
            failures = failures.len(),
            unresolved = unresolved.len(),
            tokens = metrics.total.usage.total(),
            "Pipeline finished"
        );

        Ok(PipelineReport {
            plans,
            artifacts,
            failures,
            unresolved,
            failure_history: history,
            metrics,
            cycle,
        })
    }
}
