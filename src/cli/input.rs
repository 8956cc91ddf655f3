//! Loading of schema, shape, plan and artifact documents.
//!
//! Files ending in `.json` are read as JSON; everything else as YAML.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::models::{
    EntitySchema, FieldMappingEntry, GeneratedArtifact, MappingPlan, SchemaCatalog, ShapeCatalog, TargetShape,
};

/// Name of the artifact index written next to generated sources.
pub const ARTIFACT_INDEX: &str = "artifacts.json";

pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    if is_json {
        serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
    } else {
        serde_yaml::from_str(&text).with_context(|| format!("Invalid YAML in {}", path.display()))
    }
}

pub fn load_schemas(path: &Path) -> Result<SchemaCatalog> {
    let schemas: Vec<EntitySchema> = read_document(path)?;
    Ok(SchemaCatalog::new(schemas))
}

pub fn load_shapes(path: &Path) -> Result<ShapeCatalog> {
    let shapes: Vec<TargetShape> = read_document(path)?;
    Ok(ShapeCatalog::new(shapes))
}

pub fn load_plans(path: &Path) -> Result<Vec<MappingPlan>> {
    read_document(path)
}

pub fn load_mappings(path: &Path) -> Result<Vec<FieldMappingEntry>> {
    read_document(path)
}

/// Artifacts of an earlier run, keyed by entry point name.
pub fn load_prior_artifacts(dir: &Path) -> Result<BTreeMap<String, GeneratedArtifact>> {
    let artifacts: Vec<GeneratedArtifact> = read_document(&dir.join(ARTIFACT_INDEX))?;
    Ok(artifacts.into_iter().map(|a| (a.name(), a)).collect())
}

/// Write every artifact under `dir` at its location, plus the index.
pub fn write_artifacts(dir: &Path, artifacts: &[GeneratedArtifact]) -> Result<()> {
    for artifact in artifacts {
        let path = dir.join(&artifact.location);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, &artifact.content).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    std::fs::create_dir_all(dir)?;
    let index = serde_json::to_string_pretty(artifacts)?;
    std::fs::write(dir.join(ARTIFACT_INDEX), index).context("Failed to write artifact index")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ArtifactKind;

    #[test]
    fn test_yaml_schemas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schemas.yaml");
        std::fs::write(
            &path,
            r"
- name: shopping_orders
  primary: { name: id }
  plainFields:
    - { name: code, type: string }
  belongsTo:
    - name: customer
      target: shopping_customers
      foreignKey: shopping_customer_id
      oppositeName: orders
- name: shopping_customers
  primary: { name: id }
",
        )
        .unwrap();

        let catalog = load_schemas(&path).unwrap();
        assert_eq!(catalog.names(), vec!["shopping_customers", "shopping_orders"]);
        assert_eq!(catalog.reverse_relations("shopping_customers").len(), 1);
    }

    #[test]
    fn test_artifacts_round_trip_through_directory() {
        let dir = tempfile::tempdir().unwrap();
        let plan = MappingPlan::new(ArtifactKind::Collector, "IOrder.ICreate", Some("orders"));
        let artifact = GeneratedArtifact::new(plan, "export namespace OrderCollector {}".to_string(), vec![]);

        write_artifacts(dir.path(), std::slice::from_ref(&artifact)).unwrap();
        assert!(dir.path().join("src/collectors/OrderCollector.ts").exists());

        let prior = load_prior_artifacts(dir.path()).unwrap();
        assert_eq!(prior.get("OrderCollector"), Some(&artifact));
    }
}
