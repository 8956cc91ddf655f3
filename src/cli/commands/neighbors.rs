//! `mapsmith neighbors`: show which artifacts may call which.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::cli::input::{load_plans, load_prior_artifacts, load_shapes};
use crate::cli::output::table::TableFormatter;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{MappingPlan, ValidationIssue};
use crate::services::{neighbor_scan, DependencyResolver};

#[derive(Args, Debug)]
pub struct NeighborsArgs {
    /// Target shape document (JSON or YAML list)
    #[arg(long)]
    pub shapes: PathBuf,
    /// Mapping plans (JSON or YAML list)
    #[arg(long)]
    pub plans: PathBuf,
    /// Output directory of a run whose artifacts are checked against the offer
    #[arg(long)]
    pub artifacts: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct NeighborRow {
    pub kind: String,
    pub entry_point: String,
    pub shape: String,
    pub offered: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct NeighborsOutput {
    pub rows: Vec<NeighborRow>,
    /// Calls in generated content to artifacts outside the offer.
    pub violations: Vec<ValidationIssue>,
    pub cycle: Option<Vec<String>>,
    #[serde(skip)]
    table_rows: Vec<(MappingPlan, Vec<String>)>,
}

impl CommandOutput for NeighborsOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![TableFormatter::new().format_neighbors(&self.table_rows)];
        for violation in &self.violations {
            lines.push(format!("✗ {}: {}", violation.path, violation.description));
        }
        if let Some(cycle) = &self.cycle {
            lines.push(format!("! call cycle {}", cycle.join(" -> ")));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: NeighborsArgs, json: bool) -> Result<()> {
    let shapes = load_shapes(&args.shapes)?;
    let plans = load_plans(&args.plans)?;
    let resolver = DependencyResolver::new();

    let mut table_rows = Vec::new();
    for plan in plans.iter().filter(|p| p.is_generated()) {
        let offered: Vec<String> = resolver
            .neighbors_by_reference_graph(plan, &plans, &shapes)
            .into_iter()
            .map(MappingPlan::entry_point_name)
            .collect();
        table_rows.push((plan.clone(), offered));
    }

    let mut violations = Vec::new();
    let mut cycle = None;
    if let Some(dir) = &args.artifacts {
        let mut artifacts = Vec::new();
        for artifact in load_prior_artifacts(dir)?.into_values() {
            let name = artifact.name();
            let allowed: BTreeSet<String> = table_rows
                .iter()
                .find(|(plan, _)| plan.entry_point_name() == name)
                .map(|(_, offered)| offered.iter().cloned().collect())
                .unwrap_or_default();
            violations.extend(resolver.validate_neighbor_references(
                &artifact.content,
                &name,
                &allowed,
                &artifact.location,
            )?);
            let neighbors = neighbor_scan::scan_references(&artifact.content, &name)?;
            artifacts.push(artifact.with_content(artifact.content.clone(), neighbors));
        }
        cycle = resolver.detect_cycle(&artifacts);
    }

    let result = NeighborsOutput {
        rows: table_rows
            .iter()
            .map(|(plan, offered)| NeighborRow {
                kind: plan.kind.as_str().to_string(),
                entry_point: plan.entry_point_name(),
                shape: plan.target_shape_name.clone(),
                offered: offered.clone(),
            })
            .collect(),
        violations,
        cycle,
        table_rows,
    };
    output(&result, json);
    Ok(())
}
