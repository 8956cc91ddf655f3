//! Compiler diagnostics and failure history.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A source file handed to the external compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub location: String,
    pub content: String,
}

/// One opaque diagnostic reported by the external compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub code: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(file: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            file: file.map(str::to_string),
            line: None,
            column: None,
            code: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{file}")?;
            if let (Some(line), Some(column)) = (self.line, self.column) {
                write!(f, "({line},{column})")?;
            }
            write!(f, ": ")?;
        }
        if let Some(code) = &self.code {
            write!(f, "{code}: ")?;
        }
        f.write_str(&self.message)
    }
}

/// Result of one compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Success,
    Failure { diagnostics: Vec<Diagnostic> },
}

impl CompileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Diagnostics attributed to `location`.
    pub fn diagnostics_for(&self, location: &str) -> Vec<Diagnostic> {
        match self {
            Self::Success => Vec::new(),
            Self::Failure { diagnostics } => diagnostics
                .iter()
                .filter(|d| d.file.as_deref() == Some(location))
                .cloned()
                .collect(),
        }
    }
}

/// Content that failed validation together with what the compiler said.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub artifact_content: String,
    pub diagnostics: Vec<Diagnostic>,
}
