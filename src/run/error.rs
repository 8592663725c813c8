// ABOUTME: Error types for pipeline runs.
// ABOUTME: All failures are terminal for the run; recovery is a new trigger.

use chrono::{DateTime, Utc};

use crate::pipeline::DefinitionError;

/// Errors that can occur during a pipeline run.
///
/// There is no automatic retry or rollback: every variant ends the current
/// run and halts downstream stages. Gate timeouts are deliberately not
/// modeled; an unapproved gate is not an error, it is an indefinite wait.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Artifact not produced or published; blocks all dependents.
    #[error("build failed: {0}")]
    BuildFailed(String),

    /// Resource provisioning error; the stage is marked failed.
    #[error("deploy failed for stage {stage}: {reason}")]
    DeployFailed { stage: String, reason: String },

    /// Deployed stage unreachable or incorrect; downstream halted.
    #[error("validation failed for stage {stage}: {reason}")]
    ValidationFailed { stage: String, reason: String },

    /// Promotion step failed (e.g. canary weight reset).
    #[error("promotion failed for stage {stage}: {reason}")]
    PromoteFailed { stage: String, reason: String },

    /// Approval machinery error (not a declined approval).
    #[error("gate error for stage {stage}: {reason}")]
    Gate { stage: String, reason: String },

    /// A stage's artifact was not resolvable when the stage was reached.
    #[error("stage {stage} has no resolvable artifact {artifact}")]
    ArtifactUnresolved { stage: String, artifact: String },

    /// Another process is already driving this pipeline.
    #[error("pipeline locked by {holder} (pid {pid}) since {since}")]
    LockHeld {
        holder: String,
        pid: u32,
        since: DateTime<Utc>,
    },

    #[error("pipeline lock error: {0}")]
    Lock(String),

    #[error("invalid pipeline definition: {0}")]
    Definition(#[from] DefinitionError),
}

impl RunError {
    /// The stage this failure is attributed to, if any.
    pub fn stage(&self) -> Option<&str> {
        match self {
            RunError::DeployFailed { stage, .. }
            | RunError::ValidationFailed { stage, .. }
            | RunError::PromoteFailed { stage, .. }
            | RunError::Gate { stage, .. }
            | RunError::ArtifactUnresolved { stage, .. } => Some(stage),
            _ => None,
        }
    }
}
