//! Scripted converser for testing.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ConversationRequest, ConverseReply};
use crate::domain::ports::Converser;

/// Replays a fixed sequence of replies and records every request it receives.
///
/// Once the script is exhausted every further round fails with a vendor error.
#[derive(Debug, Default)]
pub struct ScriptedConverser {
    replies: Mutex<VecDeque<DomainResult<ConverseReply>>>,
    requests: Mutex<Vec<ConversationRequest>>,
}

impl ScriptedConverser {
    pub fn new(replies: Vec<DomainResult<ConverseReply>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Script made only of function-call replies.
    pub fn from_actions(actions: Vec<Value>) -> Self {
        Self::new(actions.into_iter().map(|a| Ok(ConverseReply::action(a))).collect())
    }

    /// Append another reply to the script.
    pub fn push(&self, reply: DomainResult<ConverseReply>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<ConversationRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Converser for ScriptedConverser {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn converse(&self, request: ConversationRequest) -> DomainResult<ConverseReply> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        self.replies
            .lock()
            .map_err(|_| DomainError::VendorError("scripted converser poisoned".to_string()))?
            .pop_front()
            .unwrap_or_else(|| Err(DomainError::VendorError("script exhausted".to_string())))
    }
}
