//! Token usage and call-outcome counters.
//!
//! Both types only ever grow by addition, so merging counters gathered by
//! parallel conversations is commutative.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

use super::artifact::ArtifactKind;

/// Token counts reported by the vendor for one or more rounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_read_tokens: u64,
    #[serde(default)]
    pub cache_write_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            ..Default::default()
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_read_tokens + self.cache_write_tokens
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
        self.cache_read_tokens += rhs.cache_read_tokens;
        self.cache_write_tokens += rhs.cache_write_tokens;
    }
}

impl Add for TokenUsage {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

/// Outcome tally of agent rounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTally {
    /// Rounds sent to the vendor.
    pub attempted: u64,
    /// Final actions that passed validation.
    pub succeeded: u64,
    /// Plain-text replies where a function call was required.
    pub consented: u64,
    /// Replies rejected by structural validation.
    pub validation_failed: u64,
    /// Replies that matched no declared action shape.
    pub malformed: u64,
}

impl AddAssign for CallTally {
    fn add_assign(&mut self, rhs: Self) {
        self.attempted += rhs.attempted;
        self.succeeded += rhs.succeeded;
        self.consented += rhs.consented;
        self.validation_failed += rhs.validation_failed;
        self.malformed += rhs.malformed;
    }
}

impl Add for CallTally {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

/// Pipeline stage an agent round belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Plan,
    Write,
    CastingCorrection,
    OverallCorrection,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Write => "write",
            Self::CastingCorrection => "correct_casting",
            Self::OverallCorrection => "correct_overall",
        }
    }
}

/// Key of the metrics counter map: which kind of artifact, at which stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationKey {
    pub kind: ArtifactKind,
    pub stage: Stage,
}

impl OperationKey {
    pub fn new(kind: ArtifactKind, stage: Stage) -> Self {
        Self { kind, stage }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind.as_str(), self.stage.as_str())
    }
}
