//! Tree-sitter scan of generated TypeScript for entry point usage.
//!
//! Neighbors are never declared by the agent. They are discovered after
//! generation by walking the syntax tree for member expressions whose object
//! is a capitalized identifier and which either name an entry point
//! (`CustomerTransformer.anything`) or an entry function (`Product.collect`).
//! Both calls and function values count, so
//! `asyncMap(xs, ItemTransformer.transform)` is a reference too. Strings and
//! comments hold no member expressions.

use std::cell::RefCell;
use std::collections::BTreeSet;
use tree_sitter::{Node, Parser, Tree};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ArtifactKind;

thread_local! {
    static TS_PARSER: RefCell<Option<Parser>> = const { RefCell::new(None) };
}

fn new_parser() -> DomainResult<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
        .map_err(|e| DomainError::ValidationFailed(format!("failed to load TypeScript grammar: {e}")))?;
    Ok(parser)
}

fn parse(content: &str) -> DomainResult<Tree> {
    TS_PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        let mut parser = match slot.take() {
            Some(parser) => parser,
            None => new_parser()?,
        };
        let tree = parser.parse(content, None);
        *slot = Some(parser);
        tree.ok_or_else(|| DomainError::ValidationFailed("failed to parse TypeScript content".to_string()))
    })
}

/// One reference to another artifact's entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryCall {
    /// Entry point name, e.g. `CustomerTransformer`.
    pub target: String,
    /// Called function, e.g. `transform`.
    pub function: String,
    /// 1-based line of the reference.
    pub line: usize,
}

/// Every call or function value that looks like another artifact's entry point.
pub fn scan_entry_calls(content: &str) -> DomainResult<Vec<EntryCall>> {
    let tree = parse(content)?;
    let mut calls = Vec::new();
    let mut cursor = tree.root_node().walk();

    loop {
        let node = cursor.node();

        if node.kind() == "member_expression" {
            if let Some(call) = entry_reference(&node, content) {
                calls.push(call);
            }
        }

        if cursor.goto_first_child() {
            continue;
        }

        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                return Ok(calls);
            }
        }
    }
}

fn entry_reference(node: &Node, content: &str) -> Option<EntryCall> {
    let object = node.child_by_field_name("object")?;
    let property = node.child_by_field_name("property")?;
    if object.kind() != "identifier" {
        return None;
    }

    let target = get_node_text(&object, content);
    let function = get_node_text(&property, content);
    if !target.starts_with(|c: char| c.is_ascii_uppercase()) {
        return None;
    }
    let named_entry = ArtifactKind::ALL
        .iter()
        .any(|kind| target.len() > kind.entry_suffix().len() && target.ends_with(kind.entry_suffix()));
    let entry_function = ArtifactKind::ALL
        .iter()
        .any(|kind| kind.entry_functions().contains(&function.as_str()));
    (named_entry || entry_function).then(|| EntryCall {
        target,
        function,
        line: node.start_position().row + 1,
    })
}

/// Distinct entry point names called from `content`, excluding `self_name`.
pub fn scan_references(content: &str, self_name: &str) -> DomainResult<Vec<String>> {
    let names: BTreeSet<String> = scan_entry_calls(content)?
        .into_iter()
        .map(|call| call.target)
        .filter(|target| target != self_name)
        .collect();
    Ok(names.into_iter().collect())
}

/// Whether `content` declares `name` at the top level.
///
/// Accepts namespaces, classes, functions and `const`/`let` bindings, with
/// or without `export`.
pub fn declares_entry_point(content: &str, name: &str) -> DomainResult<bool> {
    let tree = parse(content)?;
    let root = tree.root_node();
    let mut cursor = root.walk();

    for child in root.named_children(&mut cursor) {
        let declaration = match child.kind() {
            "export_statement" => child.child_by_field_name("declaration"),
            "expression_statement" => child.named_child(0),
            _ => Some(child),
        };
        if let Some(declaration) = declaration {
            if declared_names(&declaration, content).iter().any(|n| n == name) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn declared_names(node: &Node, content: &str) -> Vec<String> {
    match node.kind() {
        "internal_module" | "module" | "class_declaration" | "abstract_class_declaration"
        | "function_declaration" | "generator_function_declaration" => node
            .child_by_field_name("name")
            .map(|n| vec![get_node_text(&n, content)])
            .unwrap_or_default(),
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = node.walk();
            node.named_children(&mut cursor)
                .filter(|c| c.kind() == "variable_declarator")
                .filter_map(|c| c.child_by_field_name("name"))
                .map(|n| get_node_text(&n, content))
                .collect()
        }
        _ => Vec::new(),
    }
}

fn get_node_text(node: &Node, content: &str) -> String {
    content[node.start_byte()..node.end_byte()].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER_TRANSFORMER: &str = r#"
import { Prisma } from "@prisma/client";

export namespace OrderTransformer {
  export function select() {
    return {
      include: {
        customer: CustomerTransformer.select(),
        items: { include: ItemTransformer.select() },
      },
    };
  }

  export async function transform(input: Payload): Promise<IOrder> {
    // ProductTransformer.transform is not used here
    const note = "AuditCollector.collect()";
    return {
      id: input.id,
      customer: await CustomerTransformer.transform(input.customer),
      items: await ArrayUtil.asyncMap(input.items, ItemTransformer.transform),
      self: OrderTransformer.select(),
    };
  }
}
"#;

    #[test]
    fn test_scan_ignores_comments_and_strings() {
        let names = scan_references(ORDER_TRANSFORMER, "OrderTransformer").unwrap();
        assert_eq!(names, vec!["CustomerTransformer", "ItemTransformer"]);
    }

    #[test]
    fn test_scan_entry_calls_records_function_and_line() {
        let calls = scan_entry_calls("const x = ProductCollector.collect({ body });\n").unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].target, "ProductCollector");
        assert_eq!(calls[0].function, "collect");
        assert_eq!(calls[0].line, 1);
    }

    #[test]
    fn test_utility_calls_are_not_entry_points() {
        let content = "const xs = ArrayUtil.asyncMap(items, f); console.log(xs); Math.max(1, 2);";
        assert!(scan_entry_calls(content).unwrap().is_empty());
    }

    #[test]
    fn test_entry_function_on_unsuffixed_receiver() {
        let names = scan_references("await ProductZ.collect({ body });", "OrderCollector").unwrap();
        assert_eq!(names, vec!["ProductZ"]);
    }

    #[test]
    fn test_declares_entry_point() {
        assert!(declares_entry_point(ORDER_TRANSFORMER, "OrderTransformer").unwrap());
        assert!(!declares_entry_point(ORDER_TRANSFORMER, "CustomerTransformer").unwrap());
        assert!(declares_entry_point("export const OrderCollector = { collect };", "OrderCollector").unwrap());
        assert!(declares_entry_point("export class OrderCollector {}", "OrderCollector").unwrap());
    }

    #[test]
    fn test_nested_declaration_is_not_top_level() {
        let content = "export function outer() { const OrderCollector = 1; return OrderCollector; }";
        assert!(!declares_entry_point(content, "OrderCollector").unwrap());
    }

    #[test]
    fn test_function_values_are_references() {
        let content = "const items = await ArrayUtil.asyncMap(input.items, ProductZTransformer.transform);";
        let calls = scan_entry_calls(content).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].target, "ProductZTransformer");
        assert_eq!(calls[0].function, "transform");

        let names = scan_references("const f = Product.collect; f(x);", "OrderCollector").unwrap();
        assert_eq!(names, vec!["Product"]);
    }

    #[test]
    fn test_call_is_reported_once() {
        let calls = scan_entry_calls("CustomerTransformer.transform(a);").unwrap();
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn test_parser_is_reused_across_calls() {
        assert!(declares_entry_point("export namespace A {}", "A").unwrap());
        assert!(declares_entry_point("export namespace B {}", "B").unwrap());
    }
}
