//! Target shape domain models.
//!
//! A target shape is an external-facing data contract (an API payload).
//! Shapes may reference each other by name, forming a reference graph that
//! the dependency resolver walks to find an artifact's neighbors.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::domain::errors::{DomainError, DomainResult};

/// Structural type of a shape property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ShapeType {
    Primitive {
        #[serde(rename = "type")]
        ty: String,
    },
    Reference {
        name: String,
    },
    Array {
        items: Box<ShapeType>,
    },
    Object {
        properties: Vec<ShapeProperty>,
    },
}

impl ShapeType {
    pub fn primitive(ty: impl Into<String>) -> Self {
        Self::Primitive { ty: ty.into() }
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::Reference { name: name.into() }
    }

    pub fn array(items: ShapeType) -> Self {
        Self::Array {
            items: Box::new(items),
        }
    }

    fn collect_references(&self, out: &mut BTreeSet<String>) {
        match self {
            Self::Primitive { .. } => {}
            Self::Reference { name } => {
                out.insert(name.clone());
            }
            Self::Array { items } => items.collect_references(out),
            Self::Object { properties } => {
                for property in properties {
                    property.ty.collect_references(out);
                }
            }
        }
    }
}

/// A named member of a target shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ShapeType,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub nullable: bool,
}

const fn default_required() -> bool {
    true
}

/// Authoritative description of an external-facing data contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetShape {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<ShapeProperty>,
    #[serde(default)]
    pub description: Option<String>,
}

impl TargetShape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            description: None,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, ty: ShapeType) -> Self {
        self.properties.push(ShapeProperty {
            name: name.into(),
            ty,
            required: true,
            nullable: false,
        });
        self
    }

    /// Shape names referenced directly by this shape's properties.
    pub fn references(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for property in &self.properties {
            property.ty.collect_references(&mut out);
        }
        out.remove(&self.name);
        out
    }
}

/// Read-only collection of target shapes with reference-graph traversal.
#[derive(Debug, Clone, Default)]
pub struct ShapeCatalog {
    shapes: BTreeMap<String, TargetShape>,
}

impl ShapeCatalog {
    pub fn new(shapes: impl IntoIterator<Item = TargetShape>) -> Self {
        Self {
            shapes: shapes.into_iter().map(|s| (s.name.clone(), s)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TargetShape> {
        self.shapes.get(name)
    }

    pub fn require(&self, name: &str) -> DomainResult<&TargetShape> {
        self.get(name)
            .ok_or_else(|| DomainError::TargetShapeNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.shapes.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.shapes.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetShape> {
        self.shapes.values()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// All shapes transitively reachable from `start`, excluding `start` itself.
    ///
    /// References to names absent from the catalog are reported but not
    /// followed. Cycles are tolerated.
    pub fn reachable_from(&self, start: &str) -> BTreeSet<String> {
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(start.to_string());

        while let Some(name) = queue.pop_front() {
            let Some(shape) = self.shapes.get(&name) else {
                continue;
            };
            for reference in shape.references() {
                if reference != start && visited.insert(reference.clone()) {
                    queue.push_back(reference);
                }
            }
        }

        visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ShapeCatalog {
        ShapeCatalog::new(vec![
            TargetShape::new("IOrder")
                .with_property("id", ShapeType::primitive("string"))
                .with_property("customer", ShapeType::reference("ICustomer"))
                .with_property("items", ShapeType::array(ShapeType::reference("IOrderItem"))),
            TargetShape::new("IOrderItem")
                .with_property("product", ShapeType::reference("IProduct.ISummary"))
                .with_property("order", ShapeType::reference("IOrder")),
            TargetShape::new("IProduct.ISummary").with_property("name", ShapeType::primitive("string")),
            TargetShape::new("ICustomer").with_property("name", ShapeType::primitive("string")),
        ])
    }

    #[test]
    fn test_direct_references_include_nested() {
        let catalog = catalog();
        let refs = catalog.get("IOrder").unwrap().references();
        assert_eq!(
            refs.into_iter().collect::<Vec<_>>(),
            vec!["ICustomer".to_string(), "IOrderItem".to_string()]
        );
    }

    #[test]
    fn test_reachable_is_transitive_and_cycle_safe() {
        let catalog = catalog();
        let reachable = catalog.reachable_from("IOrder");
        assert!(reachable.contains("IProduct.ISummary"));
        assert!(reachable.contains("ICustomer"));
        assert!(!reachable.contains("IOrder"));
        assert_eq!(reachable.len(), 3);
    }

    #[test]
    fn test_reachable_from_leaf_is_empty() {
        assert!(catalog().reachable_from("ICustomer").is_empty());
    }

    #[test]
    fn test_deserialize_tagged_types() {
        let json = r#"{
            "name": "IOrder",
            "properties": [
                { "name": "items", "type": { "kind": "array", "items": { "kind": "reference", "name": "IOrderItem" } } },
                { "name": "memo", "type": { "kind": "primitive", "type": "string" }, "nullable": true }
            ]
        }"#;
        let shape: TargetShape = serde_json::from_str(json).unwrap();
        assert!(shape.properties[1].nullable);
        assert!(shape.properties[0].required);
        assert!(shape.references().contains("IOrderItem"));
    }
}
