// ABOUTME: Routing layer seam for canary traffic weight adjustments.
// ABOUTME: Promotion to full production resets the canary weight through this.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::config::EnvironmentConfig;

use super::command::run_shell;
use super::error::TargetError;

/// Adjusts the fraction of traffic routed to a canary deployment.
#[async_trait]
pub trait Router: Send + Sync {
    async fn set_canary_weight(
        &self,
        environment: &EnvironmentConfig,
        percent: u8,
    ) -> Result<(), TargetError>;
}

/// Invokes the configured routing command with `RELEVO_ENVIRONMENT` and
/// `RELEVO_CANARY_WEIGHT` set.
#[derive(Debug, Clone)]
pub struct CommandRouter {
    command: String,
}

impl CommandRouter {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

/// Stand-in for pipelines with no routing command configured. A promotion
/// that needs a weight change fails loudly instead of silently skipping.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRouter;

#[async_trait]
impl Router for NullRouter {
    async fn set_canary_weight(
        &self,
        environment: &EnvironmentConfig,
        _percent: u8,
    ) -> Result<(), TargetError> {
        Err(TargetError::Route {
            environment: environment.name.to_string(),
            reason: "no routing command configured".to_string(),
        })
    }
}

#[async_trait]
impl Router for CommandRouter {
    async fn set_canary_weight(
        &self,
        environment: &EnvironmentConfig,
        percent: u8,
    ) -> Result<(), TargetError> {
        let name = environment.name.to_string();

        let mut env = HashMap::new();
        env.insert("RELEVO_ENVIRONMENT".to_string(), name.clone());
        env.insert("RELEVO_CANARY_WEIGHT".to_string(), percent.to_string());

        tracing::info!(environment = %name, weight = percent, "updating canary weight");

        let output = run_shell(&self.command, None, &env)
            .await
            .map_err(|e| TargetError::Route {
                environment: name.clone(),
                reason: e.to_string(),
            })?;

        if !output.success {
            return Err(TargetError::Route {
                environment: name,
                reason: output.failure_reason(),
            });
        }

        Ok(())
    }
}
