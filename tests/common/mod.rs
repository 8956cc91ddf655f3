//! Common test utilities for integration tests
//!
//! Provides a small shopping-mall fixture (schemas and shapes), builders for
//! scripted agent replies, and a context wired to a scripted converser.

#![allow(dead_code)]

use mapsmith::adapters::converser::ScriptedConverser;
use mapsmith::domain::models::{
    ArtifactKind, EntitySchema, GeneratedArtifact, MappingPlan, OrchestrationConfig, SchemaCatalog, ShapeCatalog,
    ShapeType, TargetShape,
};
use mapsmith::services::AgentContext;
use serde_json::{json, Value};
use std::sync::Arc;

/// `customers`, `orders` (belongs to a customer) and `order_items`
/// (belongs to an order, reverse name `items`).
pub fn schemas() -> SchemaCatalog {
    SchemaCatalog::new(vec![
        EntitySchema::new("customers").with_field("name", "string", false),
        EntitySchema::new("orders")
            .with_field("total", "double", false)
            .with_belongs_to("customer", "customers", false, "orders"),
        EntitySchema::new("order_items")
            .with_field("quantity", "int", false)
            .with_belongs_to("order", "orders", false, "items"),
    ])
}

/// Read and create shapes of the fixture entities.
pub fn shapes() -> ShapeCatalog {
    ShapeCatalog::new(vec![
        TargetShape::new("IOrder")
            .with_property("total", ShapeType::primitive("number"))
            .with_property("customer", ShapeType::reference("ICustomer"))
            .with_property("items", ShapeType::array(ShapeType::reference("IOrderItem"))),
        TargetShape::new("ICustomer").with_property("name", ShapeType::primitive("string")),
        TargetShape::new("IOrderItem").with_property("quantity", ShapeType::primitive("number")),
        TargetShape::new("IOrder.ICreate")
            .with_property("customer", ShapeType::reference("ICustomer.ICreate"))
            .with_property("items", ShapeType::array(ShapeType::reference("IOrderItem.ICreate"))),
        TargetShape::new("ICustomer.ICreate").with_property("name", ShapeType::primitive("string")),
        TargetShape::new("IOrderItem.ICreate").with_property("quantity", ShapeType::primitive("number")),
    ])
}

/// Orchestration settings for deterministic scripted runs.
pub fn config(max_rounds: u32) -> OrchestrationConfig {
    OrchestrationConfig {
        max_rounds,
        max_concurrency: 1,
        retry_cooldown_ms: 0,
        ..Default::default()
    }
}

pub fn context(converser: Arc<ScriptedConverser>, max_rounds: u32) -> AgentContext {
    AgentContext::new(converser, config(max_rounds)).with_run_id("test-run")
}

/// A context request action.
pub fn fetch(tag: &str, names: &[&str]) -> Value {
    json!({ "thinking": "need more context", "request": { "type": tag, "names": names } })
}

/// A plan completion holding the given `(shape, entity)` pairs.
pub fn plan_reply(plans: &[(&str, Option<&str>)]) -> Value {
    let plans: Vec<Value> = plans
        .iter()
        .map(|(shape, entity)| {
            json!({
                "targetShapeName": shape,
                "entitySchemaName": entity,
                "rationale": "matches by name",
                "references": []
            })
        })
        .collect();
    json!({ "thinking": "planned", "request": { "type": "complete", "plans": plans } })
}

/// A write completion with `content` as the draft.
pub fn write_reply(mappings: Value, content: &str) -> Value {
    json!({
        "thinking": "written",
        "request": {
            "type": "complete",
            "mappings": mappings,
            "draft": content,
            "review": "looks right",
            "revise": null
        }
    })
}

/// A correction completion replacing the content.
pub fn correction_reply(mappings: Value, content: &str) -> Value {
    json!({
        "thinking": "fixed",
        "request": {
            "type": "complete",
            "analysis": "the cast was wrong",
            "unchanged": false,
            "draft": { "mappings": mappings, "content": content },
            "review": "compiles now",
            "revise": null
        }
    })
}

/// A correction completion keeping the current content.
pub fn unchanged_reply() -> Value {
    json!({
        "thinking": "nothing to do",
        "request": {
            "type": "complete",
            "analysis": "the diagnostic belongs to another file",
            "unchanged": true,
            "draft": null,
            "review": "",
            "revise": null
        }
    })
}

fn entry(member: &str, kind: &str, nullable: Value) -> Value {
    json!({ "member": member, "kind": kind, "nullable": nullable, "how": format!("maps {member}") })
}

pub fn customer_mappings() -> Value {
    json!([
        entry("id", "scalar", json!(false)),
        entry("name", "scalar", json!(false)),
        entry("orders", "hasMany", Value::Null),
    ])
}

pub fn order_mappings() -> Value {
    json!([
        entry("id", "scalar", json!(false)),
        entry("total", "scalar", json!(false)),
        entry("customer", "belongsTo", json!(false)),
        entry("items", "hasMany", Value::Null),
    ])
}

pub fn order_item_mappings() -> Value {
    json!([
        entry("id", "scalar", json!(false)),
        entry("quantity", "scalar", json!(false)),
        entry("order", "belongsTo", json!(false)),
    ])
}

pub const CUSTOMER_TRANSFORMER: &str = r#"export namespace CustomerTransformer {
  export function select() {
    return {};
  }

  export async function transform(input: any): Promise<ICustomer> {
    return { name: input.name };
  }
}
"#;

pub const ORDER_TRANSFORMER: &str = r#"export namespace OrderTransformer {
  export function select() {
    return { include: { customer: CustomerTransformer.select() } };
  }

  export async function transform(input: any): Promise<IOrder> {
    return {
      total: input.total,
      customer: await CustomerTransformer.transform(input.customer),
      items: [],
    };
  }
}
"#;

pub const ORDER_COLLECTOR: &str = r#"export namespace OrderCollector {
  export async function collect(props: any) {
    return {
      id: props.id,
      total: props.body.total,
      customer: { connect: { id: props.customer.id } },
      items: {
        create: await Promise.all(
          props.body.items.map((item: any) => OrderItemCollector.collect({ body: item })),
        ),
      },
    };
  }
}
"#;

pub fn plan(kind: ArtifactKind, shape: &str, entity: &str) -> MappingPlan {
    MappingPlan::new(kind, shape, Some(entity))
}

pub fn artifact(kind: ArtifactKind, shape: &str, entity: &str, content: &str) -> GeneratedArtifact {
    GeneratedArtifact::new(plan(kind, shape, entity), content.to_string(), Vec::new())
}
