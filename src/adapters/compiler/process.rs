//! External compiler run as a child process.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CompileOutcome, CompilerConfig, Diagnostic, SourceFile};
use crate::domain::ports::Compiler;

/// Writes sources into a working directory and runs the configured command
/// there, e.g. `npx tsc --noEmit --pretty false`.
pub struct ProcessCompiler {
    command: Vec<String>,
    working_dir: PathBuf,
    /// Files written by the previous run, removed when no longer supplied.
    written: Mutex<BTreeSet<PathBuf>>,
}

impl ProcessCompiler {
    pub fn new(config: &CompilerConfig) -> DomainResult<Self> {
        if config.command.is_empty() {
            return Err(DomainError::CompilerError("compiler command is empty".to_string()));
        }
        Ok(Self {
            command: config.command.clone(),
            working_dir: PathBuf::from(&config.working_dir),
            written: Mutex::new(BTreeSet::new()),
        })
    }

    fn resolve(&self, location: &str) -> DomainResult<PathBuf> {
        let relative = Path::new(location);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(DomainError::CompilerError(format!(
                "refusing to write outside the working directory: {location}"
            )));
        }
        Ok(self.working_dir.join(relative))
    }

    async fn write_sources(&self, files: &[SourceFile]) -> DomainResult<()> {
        let mut written = self.written.lock().await;
        let mut current = BTreeSet::new();
        tokio::fs::create_dir_all(&self.working_dir).await?;

        for file in files {
            let path = self.resolve(&file.location)?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, &file.content).await?;
            current.insert(path);
        }

        for stale in written.difference(&current) {
            if let Err(e) = tokio::fs::remove_file(stale).await {
                warn!(path = %stale.display(), error = %e, "Failed to remove stale source");
            }
        }
        *written = current;
        Ok(())
    }
}

/// Parse `file(line,col): error CODE: message` lines.
///
/// Indented lines continue the previous diagnostic's message.
pub fn parse_diagnostics(output: &str) -> Vec<Diagnostic> {
    let mut diagnostics: Vec<Diagnostic> = Vec::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(diagnostic) = parse_diagnostic_line(line) {
            diagnostics.push(diagnostic);
        } else if line.starts_with(' ') {
            if let Some(last) = diagnostics.last_mut() {
                last.message.push('\n');
                last.message.push_str(line.trim());
            }
        }
    }
    diagnostics
}

fn parse_diagnostic_line(line: &str) -> Option<Diagnostic> {
    if let Some((location, rest)) = line.split_once("): error ") {
        let (file, position) = location.rsplit_once('(')?;
        let (row, column) = position.split_once(',')?;
        let (code, message) = rest.split_once(": ")?;
        return Some(Diagnostic {
            file: Some(file.trim().to_string()),
            line: row.trim().parse().ok(),
            column: column.trim().parse().ok(),
            code: Some(code.trim().to_string()),
            message: message.trim().to_string(),
        });
    }

    let rest = line.strip_prefix("error ")?;
    let (code, message) = rest.split_once(": ")?;
    Some(Diagnostic {
        code: Some(code.trim().to_string()),
        ..Diagnostic::new(None, message.trim())
    })
}

#[async_trait]
impl Compiler for ProcessCompiler {
    async fn compile(&self, files: &[SourceFile]) -> DomainResult<CompileOutcome> {
        self.write_sources(files).await?;

        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| DomainError::CompilerError("compiler command is empty".to_string()))?;
        let output = Command::new(program)
            .args(args)
            .current_dir(&self.working_dir)
            .output()
            .await
            .map_err(|e| DomainError::CompilerError(format!("failed to run {program}: {e}")))?;

        if output.status.success() {
            debug!(files = files.len(), "Compilation succeeded");
            return Ok(CompileOutcome::Success);
        }

        let text = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let mut diagnostics = parse_diagnostics(&text);
        if diagnostics.is_empty() {
            diagnostics.push(Diagnostic::new(None, text.trim()));
        }
        debug!(diagnostics = diagnostics.len(), "Compilation failed");
        Ok(CompileOutcome::Failure { diagnostics })
    }
}
