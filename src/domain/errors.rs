//! Domain errors for the mapsmith orchestration core.

use thiserror::Error;

/// Domain-level errors that can occur while orchestrating agents.
///
/// Structural problems with an agent's answer are not errors: they are
/// [`ValidationIssue`](crate::domain::models::ValidationIssue) values fed back
/// into the conversation. Only the outcomes a caller must react to are here.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A required upstream input is missing; raised before any conversation starts.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Conversation for {operation} `{unit}` did not converge after {trials} trials")]
    ConvergenceFailed {
        operation: String,
        unit: String,
        trials: u32,
    },

    #[error("Entity schema not found: {0}")]
    EntitySchemaNotFound(String),

    #[error("Target shape not found: {0}")]
    TargetShapeNotFound(String),

    #[error("Vendor call failed: {0}")]
    VendorError(String),

    #[error("Vendor round timed out after {0}s")]
    Timeout(u64),

    #[error("Compiler failed: {0}")]
    CompilerError(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl DomainError {
    /// Whether the failure may be retried within a conversation's trial ceiling.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::VendorError(_) | Self::Timeout(_))
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}
