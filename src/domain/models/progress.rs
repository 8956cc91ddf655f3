//! Typed progress records of the orchestration stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action::PreliminaryKind;
use super::artifact::ArtifactKind;
use super::usage::{CallTally, OperationKey, Stage, TokenUsage};

/// Which correction pass produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionPass {
    /// Narrow pass focused on type/casting errors.
    Casting,
    /// Broad pass over the overall mapping logic.
    Overall,
}

impl CorrectionPass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Casting => "casting",
            Self::Overall => "overall",
        }
    }

    /// Metrics stage the pass is counted under.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Casting => Stage::CastingCorrection,
            Self::Overall => Stage::OverallCorrection,
        }
    }
}

/// Payload of a progress record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressPayload {
    PlanProduced {
        kind: ArtifactKind,
        shape: String,
        entity: Option<String>,
        completed: usize,
        total: usize,
    },
    DraftProduced {
        kind: ArtifactKind,
        name: String,
        location: String,
        completed: usize,
        total: usize,
    },
    CorrectionProduced {
        kind: ArtifactKind,
        pass: CorrectionPass,
        name: String,
        round: u32,
        /// `false` when the agent judged the current content already correct.
        changed: bool,
    },
    PreliminaryRound {
        operation: OperationKey,
        unit: String,
        kind: PreliminaryKind,
        trial: u32,
        /// Keys of this kind already present before the request.
        known: Vec<String>,
        /// Keys supplied by this round.
        requested: Vec<String>,
    },
}

/// One record of the ordered progress stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    /// Pipeline step (iteration) the record belongs to.
    pub step: u32,
    /// Running token usage across the whole run.
    pub usage: TokenUsage,
    /// Running call-outcome tally across the whole run.
    pub tally: CallTally,
    pub payload: ProgressPayload,
}
