//! End-to-end runs of the mapping pipeline against scripted collaborators.

mod common;

use mapsmith::adapters::compiler::ScriptedCompiler;
use mapsmith::adapters::converser::ScriptedConverser;
use mapsmith::domain::models::{
    CompileOutcome, Diagnostic, ProgressPayload, ShapeCatalog, ShapeFilterConfig, TargetShape,
};
use mapsmith::domain::DomainError;
use mapsmith::services::MappingPipeline;
use std::collections::BTreeMap;
use std::sync::Arc;

use common::{correction_reply, plan_reply, write_reply};

const ORDER_ITEM_COLLECTOR: &str = r#"export namespace OrderItemCollector {
  export async function collect(props: any) {
    return { id: props.id, quantity: props.body.quantity };
  }
}
"#;

const FIXED_ORDER: &str = r#"export namespace OrderTransformer {
  export function select() {
    return { include: { customer: CustomerTransformer.select() } };
  }

  export async function transform(input: any): Promise<IOrder> {
    return {
      total: Number(input.total),
      customer: await CustomerTransformer.transform(input.customer),
      items: [],
    };
  }
}
"#;

#[tokio::test]
async fn test_full_run_plans_writes_and_corrects() {
    let (schemas, shapes) = (common::schemas(), common::shapes());
    let converser = Arc::new(ScriptedConverser::from_actions(vec![
        // step 1: transformers, then collectors, each in shape name order
        plan_reply(&[("ICustomer", Some("customers"))]),
        plan_reply(&[("IOrder", Some("orders"))]),
        plan_reply(&[("IOrderItem", None)]),
        plan_reply(&[("ICustomer.ICreate", None)]),
        plan_reply(&[("IOrder.ICreate", Some("orders"))]),
        plan_reply(&[("IOrderItem.ICreate", Some("order_items"))]),
        // step 2
        write_reply(common::customer_mappings(), common::CUSTOMER_TRANSFORMER),
        write_reply(common::order_mappings(), common::ORDER_TRANSFORMER),
        write_reply(common::order_mappings(), common::ORDER_COLLECTOR),
        write_reply(common::order_item_mappings(), ORDER_ITEM_COLLECTOR),
        // step 3
        correction_reply(common::order_mappings(), FIXED_ORDER),
    ]));
    let compiler = Arc::new(ScriptedCompiler::new(vec![CompileOutcome::Failure {
        diagnostics: vec![Diagnostic::new(
            Some("src/transformers/OrderTransformer.ts"),
            "Type 'Decimal' is not assignable to type 'number'.",
        )],
    }]));
    let ctx = common::context(converser.clone(), 3);
    let mut events = ctx.progress.subscribe();
    let pipeline = MappingPipeline::new(ctx, compiler.clone(), ShapeFilterConfig::default());

    let report = pipeline.run(&schemas, &shapes, &BTreeMap::new()).await.unwrap();

    assert!(report.is_clean(), "{:?}", report.failures);
    assert_eq!(report.plans.len(), 6);
    assert_eq!(report.plans.iter().filter(|p| p.is_generated()).count(), 4);
    let names: Vec<String> = report.artifacts.iter().map(|a| a.name()).collect();
    assert_eq!(
        names,
        vec!["CustomerTransformer", "OrderTransformer", "OrderCollector", "OrderItemCollector"]
    );
    assert_eq!(report.artifacts[1].content, FIXED_ORDER);
    assert_eq!(report.artifacts[2].neighbors, vec!["OrderItemCollector"]);
    assert!(report.cycle.is_none());
    assert_eq!(report.failure_history["OrderTransformer"].len(), 1);

    // The casting pass compiled clean, so the overall pass never ran.
    assert_eq!(compiler.invocations().len(), 2);
    assert_eq!(converser.remaining(), 0);
    assert_eq!(report.metrics.total.tally.succeeded, 11);
    assert_eq!(report.metrics.total.tally.attempted, 11);

    let mut last_sequence = None;
    let mut steps = Vec::new();
    let mut plans_produced = 0;
    while let Ok(event) = events.try_recv() {
        if let Some(previous) = last_sequence {
            assert!(event.sequence > previous);
        }
        last_sequence = Some(event.sequence);
        steps.push(event.step);
        if matches!(event.payload, ProgressPayload::PlanProduced { .. }) {
            plans_produced += 1;
        }
    }
    assert_eq!(plans_produced, 6);
    assert!(steps.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(steps.last(), Some(&3));
}

#[tokio::test]
async fn test_global_diagnostics_remain_unresolved() {
    let schemas = common::schemas();
    let shapes = ShapeCatalog::new(vec![TargetShape::new("ICustomer")]);
    let converser = Arc::new(ScriptedConverser::from_actions(vec![
        plan_reply(&[("ICustomer", Some("customers"))]),
        write_reply(common::customer_mappings(), common::CUSTOMER_TRANSFORMER),
    ]));
    let global = CompileOutcome::Failure {
        diagnostics: vec![Diagnostic::new(None, "Cannot find module '@prisma/client'.")],
    };
    let compiler = Arc::new(ScriptedCompiler::new(vec![global.clone(), global]));
    let pipeline = MappingPipeline::new(common::context(converser, 2), compiler.clone(), ShapeFilterConfig::default());

    let report = pipeline.run(&schemas, &shapes, &BTreeMap::new()).await.unwrap();

    assert!(!report.is_clean());
    assert_eq!(report.unresolved.len(), 1);
    assert!(report.failures.is_empty());
    assert_eq!(report.artifacts.len(), 1);
    assert_eq!(compiler.invocations().len(), 2);
}

#[tokio::test]
async fn test_unit_failures_are_reported_not_raised() {
    let schemas = common::schemas();
    let shapes = ShapeCatalog::new(vec![TargetShape::new("ICustomer"), TargetShape::new("IOrder")]);
    let converser = Arc::new(ScriptedConverser::from_actions(vec![
        plan_reply(&[("ICustomer", Some("customers"))]),
        plan_reply(&[("IOrder", Some("payments"))]),
        write_reply(common::customer_mappings(), common::CUSTOMER_TRANSFORMER),
    ]));
    let compiler = Arc::new(ScriptedCompiler::passing());
    let pipeline = MappingPipeline::new(common::context(converser, 1), compiler, ShapeFilterConfig::default());

    let report = pipeline.run(&schemas, &shapes, &BTreeMap::new()).await.unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].unit, "IOrder");
    assert_eq!(report.artifacts.len(), 1);
    assert!(!report.is_clean());
}

#[tokio::test]
async fn test_empty_inputs_fail_before_any_conversation() {
    let converser = Arc::new(ScriptedConverser::default());
    let pipeline = MappingPipeline::new(
        common::context(converser.clone(), 2),
        Arc::new(ScriptedCompiler::passing()),
        ShapeFilterConfig::default(),
    );

    let err = pipeline
        .run(&common::schemas(), &ShapeCatalog::default(), &BTreeMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::PreconditionFailed(_)));
    assert!(converser.requests().is_empty());
}
