//! Conversation history exchanged with the vendor.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::action::{ActionSchema, PreliminaryKind};
use super::usage::TokenUsage;

/// Speaker of a message, as the vendor sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationMessage {
    System { text: String },
    User { text: String },
    /// Read-only context supplied by the preliminary controller.
    Context { kind: PreliminaryKind, text: String },
    /// A function call the agent made.
    AssistantAction { arguments: Value },
    /// Plain text the agent replied with instead of a function call.
    AssistantText { text: String },
    /// Validation feedback on the agent's previous reply.
    Feedback { text: String },
}

impl ConversationMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self::System { text: text.into() }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::User { text: text.into() }
    }

    pub fn feedback(text: impl Into<String>) -> Self {
        Self::Feedback { text: text.into() }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } | Self::Context { .. } | Self::Feedback { .. } => Role::User,
            Self::AssistantAction { .. } | Self::AssistantText { .. } => Role::Assistant,
        }
    }

    /// Text rendering used by transports without native function-call history.
    pub fn text(&self) -> String {
        match self {
            Self::System { text }
            | Self::User { text }
            | Self::AssistantText { text }
            | Self::Feedback { text } => text.clone(),
            Self::Context { kind, text } => format!("[{}]\n{}", kind.tag(), text),
            Self::AssistantAction { arguments } => arguments.to_string(),
        }
    }
}

/// Everything the vendor needs for one round.
#[derive(Debug, Clone)]
pub struct ConversationRequest {
    pub history: Vec<ConversationMessage>,
    pub schema: ActionSchema,
    /// Stable per batch item, shared by every retry of that item.
    pub cache_key: String,
}

/// What the agent replied with.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    /// Arguments of the enforced function call.
    Action(Value),
    /// Plain text; the agent did not call the function.
    Text(String),
}

/// One vendor round trip result.
#[derive(Debug, Clone, PartialEq)]
pub struct ConverseReply {
    pub outcome: ReplyOutcome,
    pub usage: TokenUsage,
}

impl ConverseReply {
    pub fn action(arguments: Value) -> Self {
        Self {
            outcome: ReplyOutcome::Action(arguments),
            usage: TokenUsage::default(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            outcome: ReplyOutcome::Text(text.into()),
            usage: TokenUsage::default(),
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_roles() {
        assert_eq!(ConversationMessage::feedback("x").role(), Role::User);
        assert_eq!(
            ConversationMessage::AssistantAction { arguments: json!({}) }.role(),
            Role::Assistant
        );
        let context = ConversationMessage::Context {
            kind: PreliminaryKind::EntitySchemas,
            text: "orders".to_string(),
        };
        assert_eq!(context.role(), Role::User);
        assert_eq!(context.text(), "[getEntitySchemas]\norders");
    }
}
