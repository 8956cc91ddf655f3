//! Converser port - interface for LLM vendor round trips.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ConversationRequest, ConverseReply};

/// One request/response exchange with an LLM vendor.
///
/// Implementations must run in function-call-enforced mode: the agent is
/// offered exactly one function whose parameters are
/// `request.schema.to_json_schema()`. A reply that still comes back as
/// plain text is returned as [`ReplyOutcome::Text`](crate::domain::models::ReplyOutcome)
/// rather than as an error, so the caller can count and answer it.
#[async_trait]
pub trait Converser: Send + Sync {
    /// Converser name, used in logs.
    fn name(&self) -> &'static str;

    /// Run one round of the conversation.
    async fn converse(&self, request: ConversationRequest) -> DomainResult<ConverseReply>;
}
