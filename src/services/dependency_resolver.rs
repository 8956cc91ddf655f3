use std::collections::{BTreeMap, BTreeSet};

use crate::domain::errors::DomainResult;
use crate::domain::models::{GeneratedArtifact, MappingPlan, ShapeCatalog, ValidationIssue};

use super::neighbor_scan;

/// Service for resolving which artifacts may call each other and checking
/// generated content against that set
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver;

// Standalone helper for cycle detection (no self needed)
fn detect_cycle_util<'a>(
    node: &'a str,
    graph: &'a BTreeMap<String, Vec<String>>,
    visited: &mut BTreeSet<&'a str>,
    rec_stack: &mut BTreeSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(neighbors) = graph.get(node) {
        for neighbor in neighbors {
            let neighbor = neighbor.as_str();
            if !visited.contains(neighbor) {
                if detect_cycle_util(neighbor, graph, visited, rec_stack, path) {
                    return true;
                }
            } else if rec_stack.contains(neighbor) {
                // Cycle detected
                if let Some(cycle_start) = path.iter().position(|&name| name == neighbor) {
                    path.drain(0..cycle_start);
                    return true;
                }
            }
        }
    }

    rec_stack.remove(node);
    path.pop();
    false
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Generated plans of the same kind whose shape is reachable from `plan`'s
    /// shape through the target shape reference graph
    pub fn neighbors_by_reference_graph<'a>(
        &self,
        plan: &MappingPlan,
        plans: &'a [MappingPlan],
        shapes: &ShapeCatalog,
    ) -> Vec<&'a MappingPlan> {
        let reachable = shapes.reachable_from(&plan.target_shape_name);
        plans
            .iter()
            .filter(|p| p.kind == plan.kind && p.is_generated())
            .filter(|p| p.target_shape_name != plan.target_shape_name)
            .filter(|p| reachable.contains(&p.target_shape_name))
            .collect()
    }

    /// Check that `content` only calls entry points in `allowed`
    ///
    /// Calls to `self_name` (recursion) are always allowed.
    pub fn validate_neighbor_references(
        &self,
        content: &str,
        self_name: &str,
        allowed: &BTreeSet<String>,
        path: &str,
    ) -> DomainResult<Vec<ValidationIssue>> {
        let listed = allowed.iter().cloned().collect::<Vec<_>>().join(", ");
        let mut reported = BTreeSet::new();
        let mut issues = Vec::new();

        for call in neighbor_scan::scan_entry_calls(content)? {
            if call.target == self_name || allowed.contains(&call.target) {
                continue;
            }
            if !reported.insert(call.target.clone()) {
                continue;
            }
            let hint = if allowed.is_empty() {
                "no neighbor artifacts are available, so map the value inline".to_string()
            } else {
                format!("use one of [{listed}]")
            };
            issues.push(ValidationIssue::new(
                path,
                "a call into an offered neighbor",
                format!(
                    "`{}.{}()` at line {} calls an artifact that is not a neighbor; {hint}",
                    call.target, call.function, call.line
                ),
            ));
        }
        Ok(issues)
    }

    /// Detect a call cycle among generated artifacts
    pub fn detect_cycle(&self, artifacts: &[GeneratedArtifact]) -> Option<Vec<String>> {
        let graph: BTreeMap<String, Vec<String>> = artifacts
            .iter()
            .map(|a| (a.name(), a.neighbors.clone()))
            .collect();

        // DFS-based cycle detection
        let mut visited = BTreeSet::new();
        let mut rec_stack = BTreeSet::new();
        let mut path = Vec::new();

        for name in graph.keys() {
            if !visited.contains(name.as_str())
                && detect_cycle_util(name, &graph, &mut visited, &mut rec_stack, &mut path)
            {
                return Some(path.into_iter().map(str::to_string).collect());
            }
        }

        None
    }
}
