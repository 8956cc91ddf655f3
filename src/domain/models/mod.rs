pub mod action;
pub mod artifact;
pub mod config;
pub mod conversation;
pub mod failure;
pub mod mapping;
pub mod plan;
pub mod progress;
pub mod schema;
pub mod shape;
pub mod usage;

pub use action::{
    ActionSchema, AgentAction, FinalAction, MalformedReply, PreliminaryKind, PreliminaryRequest,
    COMPLETE_TAG,
};
pub use artifact::{ArtifactKind, GeneratedArtifact};
pub use config::{
    CompilerConfig, Config, LoggingConfig, OrchestrationConfig, RateLimitConfig,
    ShapeFilterConfig, VendorConfig,
};
pub use conversation::{
    ConversationMessage, ConversationRequest, ConverseReply, ReplyOutcome, Role,
};
pub use failure::{CompileOutcome, Diagnostic, FailureRecord, SourceFile};
pub use mapping::{render_issues, FieldMappingEntry, MappingKind, ValidationIssue};
pub use plan::{MappingPlan, PlanReference};
pub use progress::{CorrectionPass, ProgressEvent, ProgressPayload};
pub use schema::{BelongsTo, EntitySchema, PlainField, PrimaryField, ReverseRelation, SchemaCatalog};
pub use shape::{ShapeCatalog, ShapeProperty, ShapeType, TargetShape};
pub use usage::{CallTally, OperationKey, Stage, TokenUsage};
