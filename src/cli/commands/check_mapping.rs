//! `mapsmith check-mapping`: run the coverage validator on a mapping file.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::input::{load_mappings, load_schemas};
use crate::cli::output::table::TableFormatter;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::ValidationIssue;
use crate::services::mapping_validator::{self, MappingIssue, RequiredMember};

#[derive(Args, Debug)]
pub struct CheckMappingArgs {
    /// Entity schema document (JSON or YAML list)
    #[arg(long)]
    pub schemas: PathBuf,
    /// Entity schema the mappings describe
    #[arg(short, long)]
    pub entity: String,
    /// Field mapping entries (JSON or YAML list)
    #[arg(short, long)]
    pub mappings: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct CheckMappingOutput {
    pub entity: String,
    pub valid: bool,
    pub required: Vec<RequiredMember>,
    pub issues: Vec<ValidationIssue>,
    #[serde(skip)]
    raw: Vec<MappingIssue>,
}

impl CommandOutput for CheckMappingOutput {
    fn to_human(&self) -> String {
        let table = TableFormatter::new().format_required_members(&self.required, &self.raw);
        let verdict = if self.valid {
            format!("✓ mapping covers all {} member(s) of {}", self.required.len(), self.entity)
        } else {
            format!("✗ {} issue(s) in the mapping of {}", self.issues.len(), self.entity)
        };
        format!("{table}\n{verdict}")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: CheckMappingArgs, json: bool) -> Result<()> {
    let catalog = load_schemas(&args.schemas)?;
    let schema = catalog.require(&args.entity)?;
    let mappings = load_mappings(&args.mappings)?;

    let raw = mapping_validator::validate(schema, &catalog, &mappings);
    let result = CheckMappingOutput {
        entity: args.entity,
        valid: raw.is_empty(),
        required: mapping_validator::required_members(schema, &catalog),
        issues: raw.iter().map(|issue| issue.to_validation_issue("mappings")).collect(),
        raw,
    };
    output(&result, json);

    if !result.valid {
        anyhow::bail!("mapping has {} issue(s)", result.issues.len());
    }
    Ok(())
}
