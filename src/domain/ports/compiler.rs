//! Compiler port - interface for the external type checker.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CompileOutcome, SourceFile};

/// External compiler/validator for generated artifacts.
///
/// Diagnostics are opaque to the orchestration core; they are attributed
/// to files by location and passed back into correction conversations.
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Compile a set of sources together.
    ///
    /// An `Err` means the compiler itself could not run; compile errors in
    /// the sources are reported as [`CompileOutcome::Failure`].
    async fn compile(&self, files: &[SourceFile]) -> DomainResult<CompileOutcome>;
}
