//! Table output formatting for CLI commands
//!
//! Tables for artifacts, unit failures, mapping issues and neighbor sets,
//! rendered with comfy-table.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use crate::domain::models::{Diagnostic, GeneratedArtifact, MappingPlan};
use crate::services::mapping_validator::{MappingIssue, RequiredMember};
use crate::services::UnitFailure;

use super::truncate;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
        }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    fn header(names: &[&str]) -> Vec<Cell> {
        names
            .iter()
            .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
            .collect()
    }

    fn colored(&self, text: impl Into<String>, color: Color) -> Cell {
        let cell = Cell::new(text.into());
        if self.use_colors {
            cell.fg(color)
        } else {
            cell
        }
    }

    pub fn format_artifacts(&self, artifacts: &[GeneratedArtifact]) -> String {
        let mut table = create_base_table();
        table.set_header(Self::header(&["Kind", "Name", "Entity", "Location", "Neighbors"]));

        for artifact in artifacts {
            let neighbors = if artifact.neighbors.is_empty() {
                "-".to_string()
            } else {
                artifact.neighbors.join(", ")
            };
            table.add_row(vec![
                Cell::new(artifact.kind.as_str()),
                self.colored(artifact.name(), Color::Cyan),
                Cell::new(artifact.plan.entity_schema_name.as_deref().unwrap_or("-")),
                Cell::new(&artifact.location),
                Cell::new(truncate(&neighbors, 60)),
            ]);
        }

        table.to_string()
    }

    pub fn format_failures(&self, failures: &[UnitFailure]) -> String {
        let mut table = create_base_table();
        table.set_header(Self::header(&["Stage", "Unit", "Error"]));

        for failure in failures {
            table.add_row(vec![
                Cell::new(failure.stage.as_str()),
                Cell::new(&failure.unit),
                self.colored(truncate(&failure.error, 80), Color::Red),
            ]);
        }

        table.to_string()
    }

    pub fn format_diagnostics(&self, diagnostics: &[Diagnostic]) -> String {
        let mut table = create_base_table();
        table.set_header(Self::header(&["File", "Code", "Message"]));

        for diagnostic in diagnostics {
            let file = match (&diagnostic.file, diagnostic.line) {
                (Some(file), Some(line)) => format!("{file}:{line}"),
                (Some(file), None) => file.clone(),
                (None, _) => "-".to_string(),
            };
            table.add_row(vec![
                Cell::new(file),
                Cell::new(diagnostic.code.as_deref().unwrap_or("-")),
                self.colored(truncate(&diagnostic.message, 80), Color::Yellow),
            ]);
        }

        table.to_string()
    }

    pub fn format_required_members(&self, members: &[RequiredMember], issues: &[MappingIssue]) -> String {
        let mut table = create_base_table();
        table.set_header(Self::header(&["Member", "Kind", "Nullable", "Status"]));

        for member in members {
            let problem = issues.iter().find(|issue| issue.member() == member.name);
            let status = match problem {
                Some(issue) => self.colored(format!("✗ {issue}"), Color::Red),
                None => self.colored("✓", Color::Green),
            };
            let nullable = member
                .nullable
                .map_or_else(|| "-".to_string(), |nullable| nullable.to_string());
            table.add_row(vec![
                Cell::new(&member.name),
                Cell::new(member.kind.as_str()),
                Cell::new(nullable),
                status,
            ]);
        }

        for issue in issues.iter().filter(|issue| issue.is_unknown()) {
            table.add_row(vec![
                Cell::new(issue.member()),
                Cell::new("-"),
                Cell::new("-"),
                self.colored(format!("✗ {issue}"), Color::Red),
            ]);
        }

        table.to_string()
    }

    pub fn format_neighbors(&self, rows: &[(MappingPlan, Vec<String>)]) -> String {
        let mut table = create_base_table();
        table.set_header(Self::header(&["Kind", "Entry point", "Shape", "Neighbors"]));

        for (plan, neighbors) in rows {
            let neighbors = if neighbors.is_empty() {
                "-".to_string()
            } else {
                neighbors.join(", ")
            };
            table.add_row(vec![
                Cell::new(plan.kind.as_str()),
                self.colored(plan.entry_point_name(), Color::Cyan),
                Cell::new(&plan.target_shape_name),
                Cell::new(neighbors),
            ]);
        }

        table.to_string()
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn create_base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Check if color output is supported
fn supports_color() -> bool {
    // Respect NO_COLOR environment variable
    if env::var("NO_COLOR").is_ok() {
        return false;
    }

    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}
