//! Write conversations and neighbor offers.

mod common;

use mapsmith::adapters::converser::ScriptedConverser;
use mapsmith::domain::models::{ArtifactKind, ConversationMessage, GeneratedArtifact, MappingPlan};
use mapsmith::domain::DomainError;
use mapsmith::services::{DependencyResolver, WriteOrchestrator};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use common::{order_mappings, plan, write_reply, ORDER_COLLECTOR};

fn collector_plans() -> Vec<MappingPlan> {
    vec![
        plan(ArtifactKind::Collector, "IOrder.ICreate", "orders"),
        plan(ArtifactKind::Collector, "ICustomer.ICreate", "customers"),
        plan(ArtifactKind::Collector, "IOrderItem.ICreate", "order_items"),
    ]
}

const CALLS_UNOFFERED: &str = r#"export namespace OrderCollector {
  export async function collect(props: any) {
    return {
      customer: { connect: { id: props.customer.id } },
      product: await ProductZ.collect(props.body.product),
      items: { create: [await OrderItemCollector.collect({ body: props.body.items[0] })] },
    };
  }
}
"#;

fn feedbacks(history: &[ConversationMessage]) -> Vec<String> {
    history
        .iter()
        .filter(|m| matches!(m, ConversationMessage::Feedback { .. }))
        .map(ConversationMessage::text)
        .collect()
}

#[tokio::test]
async fn test_call_outside_offered_neighbors_is_rejected() {
    let (schemas, shapes, prior) = (common::schemas(), common::shapes(), BTreeMap::new());
    let converser = Arc::new(ScriptedConverser::from_actions(vec![
        write_reply(order_mappings(), CALLS_UNOFFERED),
        write_reply(order_mappings(), ORDER_COLLECTOR),
    ]));
    let ctx = common::context(converser.clone(), 4);
    let writer = WriteOrchestrator::new(&ctx, &schemas, &shapes, &prior);
    let plans = collector_plans();

    let artifact = writer.write_one(&plans[0], &plans).await.unwrap();

    let requests = converser.requests();
    assert_eq!(requests.len(), 2);
    let feedback = feedbacks(&requests[1].history).join("\n");
    assert!(feedback.contains("ProductZ.collect()"), "{feedback}");
    assert!(feedback.contains("use one of [CustomerCollector, OrderItemCollector]"), "{feedback}");
    assert!(!feedback.contains("OrderItemCollector.collect()"));

    assert_eq!(artifact.name(), "OrderCollector");
    assert_eq!(artifact.location, "src/collectors/OrderCollector.ts");
    assert_eq!(artifact.content, ORDER_COLLECTOR);
}

#[tokio::test]
async fn test_discovered_neighbors_are_within_offer() {
    let (schemas, shapes, prior) = (common::schemas(), common::shapes(), BTreeMap::new());
    let converser = Arc::new(ScriptedConverser::from_actions(vec![write_reply(order_mappings(), ORDER_COLLECTOR)]));
    let ctx = common::context(converser.clone(), 2);
    let writer = WriteOrchestrator::new(&ctx, &schemas, &shapes, &prior);
    let plans = collector_plans();

    let artifact = writer.write_one(&plans[0], &plans).await.unwrap();

    let offered: BTreeSet<String> = DependencyResolver::new()
        .neighbors_by_reference_graph(&plans[0], &plans, &shapes)
        .into_iter()
        .map(MappingPlan::entry_point_name)
        .collect();
    assert_eq!(artifact.neighbors, vec!["OrderItemCollector"]);
    assert!(artifact.neighbors.iter().all(|n| offered.contains(n)));

    let prompt = requests_user_prompt(&converser);
    assert!(prompt.contains("### CustomerCollector"));
    assert!(prompt.contains("### OrderItemCollector"));
}

fn requests_user_prompt(converser: &ScriptedConverser) -> String {
    converser.requests()[0]
        .history
        .iter()
        .find(|m| matches!(m, ConversationMessage::User { .. }))
        .map(ConversationMessage::text)
        .unwrap_or_default()
}

#[tokio::test]
async fn test_incomplete_mappings_are_fed_back() {
    let (schemas, shapes, prior) = (common::schemas(), common::shapes(), BTreeMap::new());
    let partial = json!([
        { "member": "id", "kind": "scalar", "nullable": false, "how": "uuid" },
        { "member": "total", "kind": "scalar", "nullable": false, "how": "body.total" },
        { "member": "customer", "kind": "belongsTo", "nullable": false, "how": "connect" }
    ]);
    let converser = Arc::new(ScriptedConverser::from_actions(vec![
        write_reply(partial, ORDER_COLLECTOR),
        write_reply(order_mappings(), ORDER_COLLECTOR),
    ]));
    let ctx = common::context(converser.clone(), 3);
    let writer = WriteOrchestrator::new(&ctx, &schemas, &shapes, &prior);
    let plans = collector_plans();

    writer.write_one(&plans[0], &plans).await.unwrap();

    let feedback = feedbacks(&converser.requests()[1].history).join("\n");
    assert!(feedback.contains("missing member: items"), "{feedback}");
    assert!(feedback.contains("$input.mappings"));
}

#[tokio::test]
async fn test_plan_without_entity_fails_before_conversation() {
    let (schemas, shapes, prior) = (common::schemas(), common::shapes(), BTreeMap::new());
    let converser = Arc::new(ScriptedConverser::default());
    let ctx = common::context(converser.clone(), 2);
    let writer = WriteOrchestrator::new(&ctx, &schemas, &shapes, &prior);
    let discarded = MappingPlan::new(ArtifactKind::Transformer, "IOrderItem", None);

    let err = writer.write_one(&discarded, &[discarded.clone()]).await.unwrap_err();
    assert!(matches!(err, DomainError::PreconditionFailed(_)));
    assert!(converser.requests().is_empty());
}

#[tokio::test]
async fn test_orchestrate_writes_generated_plans_of_kind() {
    let (schemas, shapes, prior) = (common::schemas(), common::shapes(), BTreeMap::new());
    let converser = Arc::new(ScriptedConverser::from_actions(vec![
        write_reply(common::customer_mappings(), common::CUSTOMER_TRANSFORMER),
        write_reply(order_mappings(), common::ORDER_TRANSFORMER),
    ]));
    let ctx = common::context(converser, 2);
    let writer = WriteOrchestrator::new(&ctx, &schemas, &shapes, &prior);
    let plans = vec![
        plan(ArtifactKind::Transformer, "ICustomer", "customers"),
        plan(ArtifactKind::Transformer, "IOrder", "orders"),
        MappingPlan::new(ArtifactKind::Transformer, "IOrderItem", None),
        plan(ArtifactKind::Collector, "IOrder.ICreate", "orders"),
    ];

    let batch = writer.orchestrate(ArtifactKind::Transformer, &plans).await;
    assert_eq!(batch.failure_count(), 0);
    let artifacts: Vec<&GeneratedArtifact> = batch.successes().collect();
    assert_eq!(artifacts.len(), 2);
    assert_eq!(artifacts[0].name(), "CustomerTransformer");
    assert!(artifacts[0].neighbors.is_empty());
    assert_eq!(artifacts[1].name(), "OrderTransformer");
    assert_eq!(artifacts[1].neighbors, vec!["CustomerTransformer"]);
}

#[tokio::test]
async fn test_prior_artifacts_are_offered_and_inlined() {
    let (schemas, shapes) = (common::schemas(), common::shapes());
    let customer = common::artifact(ArtifactKind::Transformer, "ICustomer", "customers", common::CUSTOMER_TRANSFORMER);
    let prior: BTreeMap<String, GeneratedArtifact> = [(customer.name(), customer)].into_iter().collect();
    let converser = Arc::new(ScriptedConverser::from_actions(vec![write_reply(
        order_mappings(),
        common::ORDER_TRANSFORMER,
    )]));
    let ctx = common::context(converser.clone(), 2);
    let writer = WriteOrchestrator::new(&ctx, &schemas, &shapes, &prior);
    let plans = vec![
        plan(ArtifactKind::Transformer, "ICustomer", "customers"),
        plan(ArtifactKind::Transformer, "IOrder", "orders"),
    ];

    writer.write_one(&plans[1], &plans).await.unwrap();

    let request = &converser.requests()[0];
    assert!(request.schema.offers(mapsmith::domain::models::PreliminaryKind::PriorArtifacts));
    assert!(requests_user_prompt(&converser).contains("Current implementation:"));
}
