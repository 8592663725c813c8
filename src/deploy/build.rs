// ABOUTME: Artifact builder seam: turn a source snapshot into a published artifact.
// ABOUTME: CommandBuilder runs the configured build commands via the shell.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::types::{ArtifactRef, Revision, StageName};

use super::command::run_shell;
use super::error::TargetError;

/// Input to one build-and-publish step.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub step: StageName,
    pub source_dir: PathBuf,
    pub revision: Revision,
    /// Target registry URI, e.g. `registry.example.com/sample/app`.
    pub registry: String,
    /// Shell commands run in order; the publish must be the final command.
    pub commands: Vec<String>,
    /// Resolved registry credentials and other build environment.
    pub env: HashMap<String, String>,
}

/// Produces a versioned, registry-addressable artifact from source.
///
/// Publishing is atomic: either the returned reference is resolvable in the
/// registry or the step failed and nothing was published.
#[async_trait]
pub trait ArtifactBuilder: Send + Sync {
    async fn build_and_publish(&self, request: &BuildRequest) -> Result<ArtifactRef, TargetError>;
}

/// Runs the configured build commands through the shell.
///
/// The revision and registry are exported as `RELEVO_REVISION` and
/// `RELEVO_REGISTRY` so build scripts can tag and push without duplicating
/// configuration.
#[derive(Debug, Default)]
pub struct CommandBuilder;

impl CommandBuilder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArtifactBuilder for CommandBuilder {
    async fn build_and_publish(&self, request: &BuildRequest) -> Result<ArtifactRef, TargetError> {
        let mut env = request.env.clone();
        env.insert(
            "RELEVO_REVISION".to_string(),
            request.revision.to_string(),
        );
        env.insert("RELEVO_REGISTRY".to_string(), request.registry.clone());
        env.insert("RELEVO_STEP".to_string(), request.step.to_string());

        let last = request.commands.len().saturating_sub(1);
        for (index, command) in request.commands.iter().enumerate() {
            tracing::info!(step = %request.step, "build: {}", command);

            let output = run_shell(command, Some(&request.source_dir), &env)
                .await
                .map_err(|e| TargetError::Build {
                    step: request.step.to_string(),
                    reason: e.to_string(),
                })?;

            if !output.success {
                // The final command is the publish; a failure there means
                // the artifact was built but never became addressable.
                if index == last && request.commands.len() > 1 {
                    return Err(TargetError::Publish {
                        step: request.step.to_string(),
                        reason: output.failure_reason(),
                    });
                }
                return Err(TargetError::Build {
                    step: request.step.to_string(),
                    reason: output.failure_reason(),
                });
            }
        }

        ArtifactRef::tagged(&request.registry, request.revision.clone()).map_err(|e| {
            TargetError::Publish {
                step: request.step.to_string(),
                reason: e.to_string(),
            }
        })
    }
}
