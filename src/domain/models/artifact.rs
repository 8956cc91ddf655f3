//! Generated artifact domain models.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::plan::MappingPlan;

/// The two paired mapping function families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Storage row -> external payload.
    Transformer,
    /// External payload -> storage write operation.
    Collector,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Transformer, ArtifactKind::Collector];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transformer => "transformer",
            Self::Collector => "collector",
        }
    }

    /// Suffix shared by every entry point of this kind.
    pub fn entry_suffix(&self) -> &'static str {
        match self {
            Self::Transformer => "Transformer",
            Self::Collector => "Collector",
        }
    }

    /// Public functions an entry point of this kind exposes.
    pub fn entry_functions(&self) -> &'static [&'static str] {
        match self {
            Self::Transformer => &["select", "transform"],
            Self::Collector => &["collect"],
        }
    }

    fn directory(&self) -> &'static str {
        match self {
            Self::Transformer => "src/transformers",
            Self::Collector => "src/collectors",
        }
    }

    /// Entry point name for the artifact generated from `shape_name`.
    ///
    /// `IShoppingSale.ISummary` becomes `ShoppingSaleSummaryTransformer`;
    /// collectors drop the trailing `.ICreate` segment, so
    /// `IShoppingSale.ICreate` becomes `ShoppingSaleCollector`.
    pub fn entry_point_name(&self, shape_name: &str) -> String {
        let mut segments: Vec<&str> = shape_name.split('.').collect();
        if *self == Self::Collector && segments.len() > 1 && segments.last() == Some(&"ICreate") {
            segments.pop();
        }

        let mut name = String::new();
        for segment in segments {
            name.push_str(strip_interface_prefix(segment));
        }
        name.push_str(self.entry_suffix());
        name
    }

    /// File location of the artifact generated from `shape_name`.
    pub fn location(&self, shape_name: &str) -> String {
        format!("{}/{}.ts", self.directory(), self.entry_point_name(shape_name))
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn strip_interface_prefix(segment: &str) -> &str {
    let mut chars = segment.chars();
    match (chars.next(), chars.next()) {
        (Some('I'), Some(second)) if second.is_ascii_uppercase() => &segment[1..],
        _ => segment,
    }
}

/// Output of the write and correction orchestrators.
///
/// `neighbors` is derived by scanning `content` for calls into other
/// artifacts' entry points; it is never declared up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub kind: ArtifactKind,
    pub plan: MappingPlan,
    pub neighbors: Vec<String>,
    pub location: String,
    pub content: String,
}

impl GeneratedArtifact {
    pub fn new(plan: MappingPlan, content: String, neighbors: Vec<String>) -> Self {
        Self {
            kind: plan.kind,
            location: plan.kind.location(&plan.target_shape_name),
            plan,
            neighbors,
            content,
        }
    }

    /// Entry point name of this artifact.
    pub fn name(&self) -> String {
        self.kind.entry_point_name(&self.plan.target_shape_name)
    }

    /// Replace the content wholesale, producing a new artifact.
    pub fn with_content(&self, content: String, neighbors: Vec<String>) -> Self {
        Self {
            kind: self.kind,
            plan: self.plan.clone(),
            neighbors,
            location: self.location.clone(),
            content,
        }
    }
}
