// ABOUTME: Stage state marker types for the type state pattern.
// ABOUTME: Zero-sized types enforce valid state transitions at compile time.

use crate::types::StageName;

/// Initial state: stage instantiated with a resolvable artifact.
/// Available actions: `clear_gates()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Pending;

/// Gates cleared: every pre-hook approval has been acknowledged.
/// Available actions: `deploy()`
#[derive(Debug, Clone, Copy, Default)]
pub struct GatesCleared;

/// Deployed: the environment has been materialized from the artifact.
/// Available actions: `validate()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Deployed;

/// Validated: every post-hook check passed.
/// Available actions: `promote()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Validated;

/// Promoted: terminal state, the stage is complete.
/// Available actions: `finish()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Promoted;

/// Phase of the stage currently executing, for run status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePhase {
    GateWait,
    Deploying,
    Validating,
    Promoted,
}

impl std::fmt::Display for StagePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StagePhase::GateWait => "gate-wait",
            StagePhase::Deploying => "deploying",
            StagePhase::Validating => "validating",
            StagePhase::Promoted => "promoted",
        };
        write!(f, "{}", s)
    }
}

/// Observable state of a pipeline run.
///
/// Any deploying, validating, or gate-waiting stage can transition to
/// `Failed`, which is terminal and halts all downstream stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Queued,
    Building,
    Stage { stage: StageName, phase: StagePhase },
    Complete,
    Failed { stage: Option<StageName>, reason: String },
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Queued => write!(f, "queued"),
            RunState::Building => write!(f, "building"),
            RunState::Stage { stage, phase } => write!(f, "{}: {}", stage, phase),
            RunState::Complete => write!(f, "complete"),
            RunState::Failed { stage: Some(stage), reason } => {
                write!(f, "failed at {}: {}", stage, reason)
            }
            RunState::Failed { stage: None, reason } => write!(f, "failed: {}", reason),
        }
    }
}
