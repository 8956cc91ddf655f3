//! Field mapping entries and the structural issues reported back to agents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a member of an entity schema participates in a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MappingKind {
    Scalar,
    BelongsTo,
    HasOne,
    HasMany,
}

impl MappingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::BelongsTo => "belongsTo",
            Self::HasOne => "hasOne",
            Self::HasMany => "hasMany",
        }
    }
}

impl fmt::Display for MappingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One documented field/relation handling decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMappingEntry {
    pub member: String,
    pub kind: MappingKind,
    /// `None` for collection relations where nullability is meaningless.
    pub nullable: Option<bool>,
    #[serde(default)]
    pub how: String,
}

impl FieldMappingEntry {
    pub fn new(member: impl Into<String>, kind: MappingKind, nullable: Option<bool>) -> Self {
        Self {
            member: member.into(),
            kind,
            nullable,
            how: String::new(),
        }
    }
}

/// A structural problem in an agent's answer, fed back into the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Location inside the submitted action, e.g. `$input.mappings[3].kind`.
    pub path: String,
    pub expected: String,
    pub description: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, expected: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            expected: expected.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (expected {}): {}", self.path, self.expected, self.description)
    }
}

/// Render issues as the feedback message sent to the agent.
pub fn render_issues(issues: &[ValidationIssue]) -> String {
    let mut lines = vec![format!(
        "Your answer was rejected with {} validation issue(s). Fix every one and call the function again.",
        issues.len()
    )];
    for issue in issues {
        lines.push(format!("- {issue}"));
    }
    lines.join("\n")
}
