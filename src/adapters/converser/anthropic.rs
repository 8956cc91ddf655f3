//! Anthropic Messages API converser.
//!
//! Exposes the round's action schema as the only tool and forces the model
//! to call it (`tool_choice: any`). Requests are non-streaming.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ConversationMessage, ConversationRequest, ConverseReply, ReplyOutcome, TokenUsage, VendorConfig,
};
use crate::domain::ports::Converser;

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Cache control marker for Anthropic prompt caching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheControl {
    #[serde(rename = "type")]
    pub control_type: String,
}

impl CacheControl {
    pub fn ephemeral() -> Self {
        Self {
            control_type: "ephemeral".to_string(),
        }
    }
}

/// System prompt content block with optional cache_control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

impl SystemContentBlock {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            block_type: "text".to_string(),
            text: content.into(),
            cache_control: None,
        }
    }

    /// Create a text block with ephemeral cache_control.
    pub fn cached_text(content: impl Into<String>) -> Self {
        Self {
            cache_control: Some(CacheControl::ephemeral()),
            ..Self::text(content)
        }
    }
}

/// Content block in a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// A message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
}

/// Tool definition.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolChoice {
    #[serde(rename = "type")]
    pub choice_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestMetadata {
    pub user_id: String,
}

/// Request to the Anthropic Messages API.
#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<Vec<SystemContentBlock>>,
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
    pub tool_choice: ToolChoice,
    pub metadata: RequestMetadata,
}

/// Usage information from the API.
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
}

impl From<Usage> for TokenUsage {
    fn from(usage: Usage) -> Self {
        Self {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cache_read_tokens: usage.cache_read_input_tokens,
            cache_write_tokens: usage.cache_creation_input_tokens,
        }
    }
}

/// Response from the Anthropic Messages API.
#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub id: String,
    pub content: Vec<ContentBlock>,
    pub model: String,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

/// Anthropic API converser.
pub struct AnthropicConverser {
    config: VendorConfig,
    client: Client,
}

impl AnthropicConverser {
    pub fn new(config: VendorConfig) -> DomainResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| DomainError::VendorError(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn api_key(&self) -> Option<String> {
        self.config
            .api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }

    /// Build the Messages API request for one round.
    ///
    /// Agent function calls are replayed as `tool_use` blocks; the user-side
    /// message that follows each one carries the matching `tool_result`.
    fn build_request(&self, request: &ConversationRequest) -> MessagesRequest {
        let mut system = Vec::new();
        let mut messages: Vec<Message> = Vec::new();
        let mut pending_tool_use: Option<String> = None;
        let mut tool_uses = 0usize;

        for message in &request.history {
            match message {
                ConversationMessage::System { text } => {
                    // The first system block is the stable prefix of every round.
                    if system.is_empty() {
                        system.push(SystemContentBlock::cached_text(text));
                    } else {
                        system.push(SystemContentBlock::text(text));
                    }
                }
                ConversationMessage::AssistantAction { arguments } => {
                    tool_uses += 1;
                    let id = format!("toolu_{tool_uses:04}");
                    push_block(
                        &mut messages,
                        MessageRole::Assistant,
                        ContentBlock::ToolUse {
                            id: id.clone(),
                            name: request.schema.function_name.clone(),
                            input: arguments.clone(),
                        },
                    );
                    pending_tool_use = Some(id);
                }
                ConversationMessage::AssistantText { text } => {
                    push_block(&mut messages, MessageRole::Assistant, ContentBlock::Text { text: text.clone() });
                }
                user_side => {
                    let text = user_side.text();
                    let block = match pending_tool_use.take() {
                        Some(tool_use_id) => ContentBlock::ToolResult {
                            is_error: matches!(user_side, ConversationMessage::Feedback { .. }).then_some(true),
                            tool_use_id,
                            content: text,
                        },
                        None => ContentBlock::Text { text },
                    };
                    push_block(&mut messages, MessageRole::User, block);
                }
            }
        }

        if let Some(tool_use_id) = pending_tool_use {
            push_block(
                &mut messages,
                MessageRole::User,
                ContentBlock::ToolResult {
                    tool_use_id,
                    content: "Continue.".to_string(),
                    is_error: None,
                },
            );
        }

        MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            system: (!system.is_empty()).then_some(system),
            messages,
            tools: vec![Tool {
                name: request.schema.function_name.clone(),
                description: format!("Respond with one of [{}].", request.schema.tags().join(", ")),
                input_schema: request.schema.to_json_schema(),
                cache_control: Some(CacheControl::ephemeral()),
            }],
            tool_choice: ToolChoice {
                choice_type: "any".to_string(),
            },
            metadata: RequestMetadata {
                user_id: request.cache_key.clone(),
            },
        }
    }
}

/// Append a block, merging into the previous message when the role repeats.
fn push_block(messages: &mut Vec<Message>, role: MessageRole, block: ContentBlock) {
    match messages.last_mut() {
        Some(last) if last.role == role => last.content.push(block),
        _ => messages.push(Message {
            role,
            content: vec![block],
        }),
    }
}

/// Map an API response to a reply.
fn to_reply(response: MessagesResponse, function_name: &str) -> ConverseReply {
    let usage = TokenUsage::from(response.usage);
    let mut texts = Vec::new();
    for block in response.content {
        match block {
            ContentBlock::ToolUse { name, input, .. } if name == function_name => {
                return ConverseReply {
                    outcome: ReplyOutcome::Action(input),
                    usage,
                };
            }
            ContentBlock::Text { text } => texts.push(text),
            _ => {}
        }
    }
    ConverseReply {
        outcome: ReplyOutcome::Text(texts.join("\n")),
        usage,
    }
}

#[async_trait]
impl Converser for AnthropicConverser {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn converse(&self, request: ConversationRequest) -> DomainResult<ConverseReply> {
        let api_key = self
            .api_key()
            .ok_or_else(|| DomainError::PreconditionFailed("ANTHROPIC_API_KEY not set".to_string()))?;
        let api_request = self.build_request(&request);

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", &api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| DomainError::VendorError(format!("API request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("API error {status}: {body}");
            // Rate limits, overload and server faults are worth another round.
            return Err(if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                DomainError::VendorError(message)
            } else {
                DomainError::ValidationFailed(message)
            });
        }

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| DomainError::VendorError(format!("Failed to parse response: {e}")))?;
        debug!(id = %result.id, model = %result.model, stop_reason = ?result.stop_reason, "Vendor round complete");

        Ok(to_reply(result, &request.schema.function_name))
    }
}
