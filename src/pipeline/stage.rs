// ABOUTME: Stage and approval gate types for the pipeline definition.
// ABOUTME: A stage is one environment's full deployment unit within a run.

use serde::Serialize;

use crate::config::{EnvironmentConfig, ValidationConfig};
use crate::types::StageName;

/// A manual checkpoint blocking pipeline progression.
///
/// Gates have no timeout: an unapproved gate holds the run indefinitely
/// and is never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalGate {
    pub name: StageName,
    /// Human-readable description of the risk of proceeding.
    pub comment: String,
}

/// A named, ordered unit of deployment work.
///
/// dev, prod-canary, and prod are all instances of this one type; they
/// differ only in their environment parameters.
#[derive(Debug, Clone, Serialize)]
pub struct Stage {
    pub name: StageName,

    pub environment: EnvironmentConfig,

    /// Ordered pre-hooks. Every gate must be satisfied before the stage
    /// deploys.
    pub pre: Vec<ApprovalGate>,

    /// Ordered post-hooks. Every validation must succeed for the stage to
    /// be considered complete.
    pub post: Vec<ValidationConfig>,

    /// Units this stage depends on; checked against declaration order.
    pub needs: Vec<StageName>,

    /// Build step whose artifact this stage deploys.
    pub artifact: StageName,
}
