//! Mapping plan domain models.

use serde::{Deserialize, Serialize};

use super::artifact::ArtifactKind;

/// An entity that must be supplied out-of-band to the generated function,
/// e.g. an identifier only available from the call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanReference {
    /// Parameter name under which the value is passed.
    pub name: String,
    /// Entity schema the value identifies.
    pub entity_schema_name: String,
    /// Human-readable provenance, e.g. "path parameter `customerId`".
    pub source: String,
}

/// Decision to generate (or not) an artifact for one target shape.
///
/// Superseded wholesale on re-plan, never partially mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingPlan {
    pub kind: ArtifactKind,
    pub target_shape_name: String,
    /// `None` means the shape is not generated at all.
    pub entity_schema_name: Option<String>,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub references: Vec<PlanReference>,
}

impl MappingPlan {
    pub fn new(kind: ArtifactKind, shape: impl Into<String>, entity: Option<&str>) -> Self {
        Self {
            kind,
            target_shape_name: shape.into(),
            entity_schema_name: entity.map(str::to_string),
            rationale: String::new(),
            references: Vec::new(),
        }
    }

    pub fn with_reference(mut self, name: &str, entity: &str, source: &str) -> Self {
        self.references.push(PlanReference {
            name: name.to_string(),
            entity_schema_name: entity.to_string(),
            source: source.to_string(),
        });
        self
    }

    /// Whether this plan asks for an artifact to be generated.
    pub fn is_generated(&self) -> bool {
        self.entity_schema_name.is_some()
    }

    /// Entry point name of the artifact this plan produces.
    pub fn entry_point_name(&self) -> String {
        self.kind.entry_point_name(&self.target_shape_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_entity_is_not_generated() {
        let plan = MappingPlan::new(ArtifactKind::Transformer, "IPage.IRequest", None);
        assert!(!plan.is_generated());
    }

    #[test]
    fn test_serialized_form() {
        let plan = MappingPlan::new(ArtifactKind::Collector, "IOrder.ICreate", Some("orders"))
            .with_reference("customer", "customers", "authenticated customer");
        let json = serde_json::to_value(&plan).unwrap();

        assert_eq!(json["kind"], "collector");
        assert_eq!(json["targetShapeName"], "IOrder.ICreate");
        assert_eq!(json["entitySchemaName"], "orders");
        assert_eq!(json["references"][0]["entitySchemaName"], "customers");
        assert_eq!(plan.entry_point_name(), "OrderCollector");
    }
}
