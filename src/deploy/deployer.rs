// ABOUTME: Deployment unit seam: materialize one environment from an artifact.
// ABOUTME: CommandDeployer shells out and reads the endpoint from stdout.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::config::EnvironmentConfig;
use crate::types::{ArtifactRef, DeploymentId};

use super::command::run_shell;
use super::error::TargetError;

/// Everything the deployment unit needs, passed explicitly.
#[derive(Debug, Clone)]
pub struct DeploySpec {
    pub environment: EnvironmentConfig,
    pub artifact: ArtifactRef,
}

/// A deployed resource set and its public entry point.
#[derive(Debug, Clone)]
pub struct DeployedService {
    pub id: DeploymentId,
    /// Public entry point, e.g. `http://dev.example.com:8080`.
    pub endpoint: String,
}

/// Materializes one logical environment from the current artifact.
///
/// Applying the same spec twice must produce no diff; the engine relies on
/// this when a scheduled run re-deploys an unchanged revision.
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn apply(&self, spec: &DeploySpec) -> Result<DeployedService, TargetError>;
}

/// Invokes the configured deploy command with a `RELEVO_*` environment
/// contract. The command prints the service endpoint as its last stdout
/// line.
#[derive(Debug, Clone)]
pub struct CommandDeployer {
    command: String,
}

impl CommandDeployer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl Deployer for CommandDeployer {
    async fn apply(&self, spec: &DeploySpec) -> Result<DeployedService, TargetError> {
        let environment = spec.environment.name.to_string();

        let mut env = HashMap::new();
        env.insert("RELEVO_ENVIRONMENT".to_string(), environment.clone());
        env.insert("RELEVO_ARTIFACT".to_string(), spec.artifact.to_string());
        env.insert(
            "RELEVO_TRAFFIC_WEIGHT".to_string(),
            spec.environment.traffic_weight.to_string(),
        );
        if let Some(account) = &spec.environment.account {
            env.insert("RELEVO_ACCOUNT".to_string(), account.clone());
        }
        if let Some(region) = &spec.environment.region {
            env.insert("RELEVO_REGION".to_string(), region.clone());
        }

        tracing::info!(environment = %environment, artifact = %spec.artifact, "deploying");

        let output = run_shell(&self.command, None, &env)
            .await
            .map_err(|e| TargetError::Deploy {
                environment: environment.clone(),
                reason: e.to_string(),
            })?;

        if !output.success {
            return Err(TargetError::Deploy {
                environment,
                reason: output.failure_reason(),
            });
        }

        let endpoint = output
            .last_line()
            .ok_or_else(|| TargetError::Deploy {
                environment: environment.clone(),
                reason: "deploy command printed no endpoint".to_string(),
            })?
            .to_string();

        Ok(DeployedService {
            id: DeploymentId::new(format!(
                "{}-{}",
                environment,
                spec.artifact.revision().short()
            )),
            endpoint,
        })
    }
}
