//! `mapsmith run`: plan, write and correct every artifact.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::compiler::ProcessCompiler;
use crate::adapters::converser::{AnthropicConverser, RateLimitedConverser};
use crate::cli::input::{load_prior_artifacts, load_schemas, load_shapes, write_artifacts};
use crate::cli::output::progress::ProgressRenderer;
use crate::cli::output::table::TableFormatter;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{CallTally, Config, Diagnostic, GeneratedArtifact, TokenUsage};
use crate::domain::ports::{Compiler, Converser};
use crate::services::metrics::estimate_cost;
use crate::services::{AgentContext, MappingPipeline, PipelineReport, UnitFailure};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Entity schema document (JSON or YAML list)
    #[arg(long)]
    pub schemas: PathBuf,
    /// Target shape document (JSON or YAML list)
    #[arg(long)]
    pub shapes: PathBuf,
    /// Directory the artifacts and their index are written to
    #[arg(short, long, default_value = "generated")]
    pub out: PathBuf,
    /// Output directory of an earlier run, offered to agents as prior artifacts
    #[arg(long)]
    pub prior: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct ArtifactOutput {
    pub kind: String,
    pub name: String,
    pub location: String,
    pub neighbors: Vec<String>,
}

impl From<&GeneratedArtifact> for ArtifactOutput {
    fn from(artifact: &GeneratedArtifact) -> Self {
        Self {
            kind: artifact.kind.as_str().to_string(),
            name: artifact.name(),
            location: artifact.location.clone(),
            neighbors: artifact.neighbors.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub run_id: String,
    pub out_dir: String,
    pub artifacts: Vec<ArtifactOutput>,
    pub failures: Vec<UnitFailure>,
    pub unresolved: Vec<Diagnostic>,
    pub cycle: Option<Vec<String>>,
    pub usage: TokenUsage,
    pub tally: CallTally,
    pub cost_usd: Option<f64>,
    #[serde(skip)]
    report: PipelineReport,
    #[serde(skip)]
    model: String,
}

impl RunOutput {
    fn new(run_id: String, out_dir: String, report: PipelineReport, model: String) -> Self {
        Self {
            run_id,
            out_dir,
            artifacts: report.artifacts.iter().map(ArtifactOutput::from).collect(),
            failures: report.failures.clone(),
            unresolved: report.unresolved.clone(),
            cycle: report.cycle.clone(),
            usage: report.metrics.total.usage,
            tally: report.metrics.total.tally,
            cost_usd: estimate_cost(&model, &report.metrics.total.usage),
            report,
            model,
        }
    }
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let formatter = TableFormatter::new();
        let mut lines = vec![format!(
            "Generated {} artifact(s) into {}",
            self.artifacts.len(),
            self.out_dir
        )];
        if !self.report.artifacts.is_empty() {
            lines.push(formatter.format_artifacts(&self.report.artifacts));
        }
        if !self.failures.is_empty() {
            lines.push(format!("\n{} unit(s) failed:", self.failures.len()));
            lines.push(formatter.format_failures(&self.failures));
        }
        if !self.unresolved.is_empty() {
            lines.push(format!("\n{} diagnostic(s) remain after correction:", self.unresolved.len()));
            lines.push(formatter.format_diagnostics(&self.unresolved));
        }
        if let Some(cycle) = &self.cycle {
            lines.push(format!("\nWarning: call cycle {}", cycle.join(" -> ")));
        }
        lines.push(String::new());
        lines.push(self.report.metrics.format_summary(&self.model));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: RunArgs, config: Config, json: bool) -> Result<()> {
    let schemas = load_schemas(&args.schemas)?;
    let shapes = load_shapes(&args.shapes)?;
    let prior = match &args.prior {
        Some(dir) => load_prior_artifacts(dir)?,
        None => Default::default(),
    };

    let vendor: Arc<dyn Converser> =
        Arc::new(AnthropicConverser::new(config.vendor.clone()).context("Failed to create vendor client")?);
    let converser: Arc<dyn Converser> = Arc::new(RateLimitedConverser::new(vendor, &config.rate_limit)?);
    let compiler: Arc<dyn Compiler> = Arc::new(ProcessCompiler::new(&config.compiler)?);

    let ctx = AgentContext::new(converser, config.orchestration.clone());
    let run_id = ctx.run_id.clone();
    let renderer = ProgressRenderer::spawn(ctx.progress.subscribe(), json);
    let pipeline = MappingPipeline::new(ctx, compiler, config.filters.clone());

    let report = match pipeline.run(&schemas, &shapes, &prior).await {
        Ok(report) => report,
        Err(e) => {
            renderer.finish("failed");
            return Err(e).context("Pipeline failed");
        }
    };
    renderer.finish(format!("{} artifact(s) generated", report.artifacts.len()));

    write_artifacts(&args.out, &report.artifacts)?;
    let clean = report.is_clean();
    let result = RunOutput::new(run_id, args.out.display().to_string(), report, config.vendor.model.clone());
    output(&result, json);

    if !clean {
        anyhow::bail!(
            "{} unit(s) failed and {} diagnostic(s) are unresolved",
            result.failures.len(),
            result.unresolved.len()
        );
    }
    Ok(())
}
