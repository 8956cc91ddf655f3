//! Converser implementations.

pub mod anthropic;
pub mod rate_limited;
pub mod scripted;

pub use anthropic::AnthropicConverser;
pub use rate_limited::RateLimitedConverser;
pub use scripted::ScriptedConverser;
