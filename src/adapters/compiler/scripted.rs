//! Scripted compiler for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CompileOutcome, SourceFile};
use crate::domain::ports::Compiler;

/// Returns queued outcomes in order, then succeeds forever.
#[derive(Debug, Default)]
pub struct ScriptedCompiler {
    outcomes: Mutex<VecDeque<CompileOutcome>>,
    invocations: Mutex<Vec<Vec<SourceFile>>>,
}

impl ScriptedCompiler {
    pub fn new(outcomes: Vec<CompileOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// A compiler that accepts everything.
    pub fn passing() -> Self {
        Self::default()
    }

    /// Source sets of every invocation so far.
    pub fn invocations(&self) -> Vec<Vec<SourceFile>> {
        self.invocations.lock().map(|i| i.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Compiler for ScriptedCompiler {
    async fn compile(&self, files: &[SourceFile]) -> DomainResult<CompileOutcome> {
        if let Ok(mut invocations) = self.invocations.lock() {
            invocations.push(files.to_vec());
        }
        let next = self.outcomes.lock().ok().and_then(|mut o| o.pop_front());
        Ok(next.unwrap_or(CompileOutcome::Success))
    }
}
