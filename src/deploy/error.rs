// ABOUTME: Deployment collaborator error types with SNAFU pattern.
// ABOUTME: Unifies build, publish, deploy, and routing failures.

use snafu::Snafu;

/// Unified error for deployment collaborator operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TargetError {
    #[snafu(display("build step {step} failed: {reason}"))]
    Build { step: String, reason: String },

    #[snafu(display("artifact publish failed for step {step}: {reason}"))]
    Publish { step: String, reason: String },

    #[snafu(display("deploy of environment {environment} failed: {reason}"))]
    Deploy { environment: String, reason: String },

    #[snafu(display("routing update for environment {environment} failed: {reason}"))]
    Route { environment: String, reason: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetErrorKind {
    /// Artifact was not produced.
    BuildFailed,
    /// Artifact was produced but not published.
    PublishFailed,
    /// Resource provisioning failed.
    DeployFailed,
    /// Traffic-weight update failed.
    RouteFailed,
}

impl TargetError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> TargetErrorKind {
        match self {
            TargetError::Build { .. } => TargetErrorKind::BuildFailed,
            TargetError::Publish { .. } => TargetErrorKind::PublishFailed,
            TargetError::Deploy { .. } => TargetErrorKind::DeployFailed,
            TargetError::Route { .. } => TargetErrorKind::RouteFailed,
        }
    }
}
