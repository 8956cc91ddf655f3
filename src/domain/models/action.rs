//! Agent actions and the per-round action schema.
//!
//! Every agent reply is one of a small set of discriminated actions: a
//! request for more read-only context of some [`PreliminaryKind`], or the
//! final answer of the conversation. The set of context actions offered
//! shrinks as kinds are satisfied; the schema for each round is built from
//! the remaining set, and a reply naming a kind outside that set fails to
//! parse just like any other undeclared shape.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// Discriminator of the final action in every conversation.
pub const COMPLETE_TAG: &str = "complete";

/// Category of additional read-only context an agent may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PreliminaryKind {
    EntitySchemas,
    TargetShapes,
    PriorArtifacts,
}

impl PreliminaryKind {
    pub const ALL: [PreliminaryKind; 3] = [
        PreliminaryKind::EntitySchemas,
        PreliminaryKind::TargetShapes,
        PreliminaryKind::PriorArtifacts,
    ];

    /// Action discriminator used on the wire.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::EntitySchemas => "getEntitySchemas",
            Self::TargetShapes => "getTargetShapes",
            Self::PriorArtifacts => "getPriorArtifacts",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    fn description(&self) -> &'static str {
        match self {
            Self::EntitySchemas => "Load entity schema definitions by table name.",
            Self::TargetShapes => "Load target shape definitions by shape name.",
            Self::PriorArtifacts => "Load previously generated artifacts by entry point name.",
        }
    }
}

impl fmt::Display for PreliminaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A request for more context of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreliminaryRequest {
    pub kind: PreliminaryKind,
    pub names: Vec<String>,
}

/// The final answer type of a conversation.
pub trait FinalAction: DeserializeOwned + Send + 'static {
    /// One-line description shown to the agent.
    fn description() -> &'static str;

    /// JSON schema `properties` object of the final action (without `type`).
    fn properties() -> Value;

    /// Names of required properties.
    fn required() -> &'static [&'static str];
}

/// One parsed agent reply.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentAction<T> {
    Preliminary(PreliminaryRequest),
    Complete(T),
}

/// Why a reply could not be parsed into any declared action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedReply(pub String);

impl fmt::Display for MalformedReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Actions offered to the agent for a single round.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSchema {
    /// Name of the single function the agent must call.
    pub function_name: String,
    offered: BTreeSet<PreliminaryKind>,
    final_description: &'static str,
    final_properties: Value,
    final_required: Vec<&'static str>,
}

impl ActionSchema {
    pub fn new<T: FinalAction>(function_name: impl Into<String>, offered: BTreeSet<PreliminaryKind>) -> Self {
        Self {
            function_name: function_name.into(),
            offered,
            final_description: T::description(),
            final_properties: T::properties(),
            final_required: T::required().to_vec(),
        }
    }

    pub fn offers(&self, kind: PreliminaryKind) -> bool {
        self.offered.contains(&kind)
    }

    pub fn offered(&self) -> &BTreeSet<PreliminaryKind> {
        &self.offered
    }

    /// Discriminators of every action in this schema, final action last.
    pub fn tags(&self) -> Vec<&'static str> {
        self.offered
            .iter()
            .map(PreliminaryKind::tag)
            .chain(std::iter::once(COMPLETE_TAG))
            .collect()
    }

    /// JSON schema of the function parameters.
    pub fn to_json_schema(&self) -> Value {
        let mut variants: Vec<Value> = self
            .offered
            .iter()
            .map(|kind| {
                json!({
                    "type": "object",
                    "description": kind.description(),
                    "properties": {
                        "type": { "const": kind.tag() },
                        "names": { "type": "array", "items": { "type": "string" }, "minItems": 1 }
                    },
                    "required": ["type", "names"]
                })
            })
            .collect();

        let mut properties = Map::new();
        properties.insert("type".to_string(), json!({ "const": COMPLETE_TAG }));
        if let Value::Object(extra) = &self.final_properties {
            properties.extend(extra.clone());
        }
        let mut required = vec![Value::from("type")];
        required.extend(self.final_required.iter().map(|r| Value::from(*r)));
        variants.push(json!({
            "type": "object",
            "description": self.final_description,
            "properties": properties,
            "required": required
        }));

        json!({
            "type": "object",
            "properties": {
                "thinking": { "type": "string" },
                "request": { "oneOf": variants }
            },
            "required": ["thinking", "request"]
        })
    }

    /// Parse a function-call argument object against this round's schema.
    pub fn parse<T: FinalAction>(&self, value: &Value) -> Result<AgentAction<T>, MalformedReply> {
        let request = value
            .get("request")
            .ok_or_else(|| MalformedReply("missing `request` property".to_string()))?;
        let tag = request
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| MalformedReply("`request.type` must be a string discriminator".to_string()))?;

        if tag == COMPLETE_TAG {
            return serde_json::from_value::<T>(request.clone())
                .map(AgentAction::Complete)
                .map_err(|e| MalformedReply(format!("`{COMPLETE_TAG}` action does not match its schema: {e}")));
        }

        match PreliminaryKind::from_tag(tag) {
            Some(kind) if self.offered.contains(&kind) => {
                let names: Vec<String> = request
                    .get("names")
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(|e| MalformedReply(format!("`{tag}.names` must be a string array: {e}")))?
                    .unwrap_or_default();
                Ok(AgentAction::Preliminary(PreliminaryRequest { kind, names }))
            }
            _ => Err(MalformedReply(format!(
                "`{tag}` is not one of the offered actions [{}]",
                self.tags().join(", ")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Answer {
        value: u32,
    }

    impl FinalAction for Answer {
        fn description() -> &'static str {
            "Submit the answer."
        }

        fn properties() -> Value {
            json!({ "value": { "type": "integer" } })
        }

        fn required() -> &'static [&'static str] {
            &["value"]
        }
    }

    fn schema(kinds: &[PreliminaryKind]) -> ActionSchema {
        ActionSchema::new::<Answer>("process", kinds.iter().copied().collect())
    }

    #[test]
    fn test_parse_complete() {
        let action = schema(&[]).parse::<Answer>(&json!({
            "thinking": "done",
            "request": { "type": "complete", "value": 7 }
        }));
        assert_eq!(action, Ok(AgentAction::Complete(Answer { value: 7 })));
    }

    #[test]
    fn test_parse_offered_preliminary() {
        let action = schema(&[PreliminaryKind::EntitySchemas]).parse::<Answer>(&json!({
            "thinking": "need tables",
            "request": { "type": "getEntitySchemas", "names": ["orders"] }
        }));
        assert_eq!(
            action,
            Ok(AgentAction::Preliminary(PreliminaryRequest {
                kind: PreliminaryKind::EntitySchemas,
                names: vec!["orders".to_string()],
            }))
        );
    }

    #[test]
    fn test_parse_rejects_kind_not_offered() {
        let result = schema(&[PreliminaryKind::TargetShapes]).parse::<Answer>(&json!({
            "thinking": "again",
            "request": { "type": "getEntitySchemas", "names": ["orders"] }
        }));
        let err = result.unwrap_err();
        assert!(err.0.contains("getEntitySchemas"));
        assert!(err.0.contains("[getTargetShapes, complete]"));
    }

    #[test]
    fn test_parse_complete_with_wrong_fields_is_malformed() {
        let result = schema(&[]).parse::<Answer>(&json!({
            "thinking": "",
            "request": { "type": "complete", "value": "seven" }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_json_schema_only_lists_offered_variants() {
        let value = schema(&[PreliminaryKind::TargetShapes]).to_json_schema();
        let variants = value["properties"]["request"]["oneOf"].as_array().unwrap();
        let tags: Vec<&str> = variants
            .iter()
            .map(|v| v["properties"]["type"]["const"].as_str().unwrap())
            .collect();
        assert_eq!(tags, vec!["getTargetShapes", "complete"]);
        assert_eq!(variants[1]["required"], json!(["type", "value"]));
    }
}
