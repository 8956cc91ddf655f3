pub mod agent_context;
pub mod batch;
pub mod correction_orchestrator;
pub mod dependency_resolver;
pub mod mapping_validator;
pub mod metrics;
pub mod neighbor_scan;
pub mod pipeline;
pub mod plan_orchestrator;
pub mod preliminary;
pub mod progress;
pub mod templates;
pub mod write_orchestrator;

pub use agent_context::AgentContext;
pub use batch::{run_bounded, BatchResult, UnitResult};
pub use correction_orchestrator::{CorrectionCompletion, CorrectionOrchestrator, CorrectionReport};
pub use dependency_resolver::DependencyResolver;
pub use mapping_validator::{MappingIssue, RequiredMember};
pub use metrics::{MetricsRecorder, MetricsSummary, OperationMetrics};
pub use pipeline::{MappingPipeline, PipelineReport, UnitFailure};
pub use plan_orchestrator::{PlanCompletion, PlanOrchestrator};
pub use preliminary::{Completed, PreliminaryController, PreliminarySources};
pub use progress::ProgressBus;
pub use write_orchestrator::{WriteCompletion, WriteOrchestrator};
