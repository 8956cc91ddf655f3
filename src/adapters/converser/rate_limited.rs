//! Request-rate limiting for any converser.

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ConversationRequest, ConverseReply, RateLimitConfig};
use crate::domain::ports::Converser;

/// Wraps a converser so that rounds across all conversations share one quota.
pub struct RateLimitedConverser {
    inner: Arc<dyn Converser>,
    limiter: DefaultDirectRateLimiter,
}

impl RateLimitedConverser {
    pub fn new(inner: Arc<dyn Converser>, config: &RateLimitConfig) -> DomainResult<Self> {
        let per_second = NonZeroU32::new(config.requests_per_second)
            .ok_or_else(|| DomainError::ValidationFailed("requests_per_second must be positive".to_string()))?;
        let burst = NonZeroU32::new(config.burst_size)
            .ok_or_else(|| DomainError::ValidationFailed("burst_size must be positive".to_string()))?;

        Ok(Self {
            inner,
            limiter: RateLimiter::direct(Quota::per_second(per_second).allow_burst(burst)),
        })
    }
}

#[async_trait]
impl Converser for RateLimitedConverser {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn converse(&self, request: ConversationRequest) -> DomainResult<ConverseReply> {
        self.limiter.until_ready().await;
        self.inner.converse(request).await
    }
}
