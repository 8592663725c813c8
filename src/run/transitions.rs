// ABOUTME: State transition methods for stage execution.
// ABOUTME: Each method consumes self and returns the next state on success.

use std::marker::PhantomData;

use crate::deploy::{DeploySpec, DeployedService, Deployer, Router};
use crate::gate::Approver;
use crate::validate::{ValidationRequest, Validator};

use super::error::RunError;
use super::stage_run::StageRun;
use super::state::{Deployed, GatesCleared, Pending, Promoted, Validated};

impl<S> StageRun<S> {
    /// Internal helper to transition to a new state.
    fn transition<T>(self) -> StageRun<T> {
        StageRun {
            stage: self.stage,
            artifact: self.artifact,
            deployed: self.deployed,
            _state: PhantomData,
        }
    }

    /// Internal helper to transition with the deployed service attached.
    fn transition_with_service<T>(self, deployed: DeployedService) -> StageRun<T> {
        StageRun {
            stage: self.stage,
            artifact: self.artifact,
            deployed: Some(deployed),
            _state: PhantomData,
        }
    }
}

// =============================================================================
// Pending -> GatesCleared
// =============================================================================

impl StageRun<Pending> {
    /// Wait for every pre-hook approval gate, in declaration order.
    ///
    /// Gates block indefinitely: this future resolves only when the
    /// external approval signal arrives. There is no timeout and no
    /// automatic retry.
    ///
    /// # Errors
    ///
    /// Returns `RunError::Gate` if the approval machinery itself fails.
    #[must_use = "stage run state must be used"]
    pub async fn clear_gates<A: Approver + ?Sized>(
        self,
        approver: &A,
    ) -> Result<StageRun<GatesCleared>, RunError> {
        for gate in &self.stage.pre {
            approver
                .await_approval(gate)
                .await
                .map_err(|e| RunError::Gate {
                    stage: self.stage.name.to_string(),
                    reason: e.to_string(),
                })?;
        }

        Ok(self.transition())
    }
}

// =============================================================================
// GatesCleared -> Deployed
// =============================================================================

impl StageRun<GatesCleared> {
    /// Materialize the environment from the artifact.
    ///
    /// # Errors
    ///
    /// Returns `RunError::DeployFailed`; the run is terminal and no
    /// rollback is attempted.
    #[must_use = "stage run state must be used"]
    pub async fn deploy<D: Deployer + ?Sized>(
        self,
        deployer: &D,
    ) -> Result<StageRun<Deployed>, RunError> {
        let spec = DeploySpec {
            environment: self.stage.environment.clone(),
            artifact: self.artifact.clone(),
        };

        let deployed = deployer
            .apply(&spec)
            .await
            .map_err(|e| RunError::DeployFailed {
                stage: self.stage.name.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(
            stage = %self.stage.name,
            endpoint = %deployed.endpoint,
            "stage deployed"
        );

        Ok(self.transition_with_service(deployed))
    }
}

// =============================================================================
// Deployed -> Validated
// =============================================================================

impl StageRun<Deployed> {
    /// Run every post-hook validation, in declaration order.
    ///
    /// A stage with no validations transitions immediately; this is the
    /// configured policy for production stages that rely on manual gates.
    ///
    /// # Errors
    ///
    /// Returns `RunError::ValidationFailed`, which fails the run and halts
    /// all downstream stages.
    #[must_use = "stage run state must be used"]
    pub async fn validate<V: Validator + ?Sized>(
        self,
        validator: &V,
    ) -> Result<StageRun<Validated>, RunError> {
        if self.stage.post.is_empty() {
            return Ok(self.transition());
        }

        let endpoint = self
            .deployed
            .as_ref()
            .expect("deployed stage must have a service")
            .endpoint
            .clone();

        for check in &self.stage.post {
            let request = ValidationRequest {
                endpoint: &endpoint,
                stage: &self.stage.name,
                check,
            };

            validator
                .check(&request)
                .await
                .map_err(|e| RunError::ValidationFailed {
                    stage: self.stage.name.to_string(),
                    reason: e.to_string(),
                })?;
        }

        Ok(self.transition())
    }
}

// =============================================================================
// Validated -> Promoted
// =============================================================================

impl StageRun<Validated> {
    /// Complete the stage, resetting the canary traffic weight to zero
    /// when this stage is the terminal production promotion.
    ///
    /// The weight reset and the promotion are one transition: if the reset
    /// fails the stage fails, never leaving a promoted stage with stale
    /// canary routing.
    ///
    /// # Errors
    ///
    /// Returns `RunError::PromoteFailed` if the routing update fails.
    #[must_use = "stage run state must be used"]
    pub async fn promote<R: Router + ?Sized>(
        self,
        router: &R,
    ) -> Result<StageRun<Promoted>, RunError> {
        if self.stage.environment.reset_canary_on_promote {
            router
                .set_canary_weight(&self.stage.environment, 0)
                .await
                .map_err(|e| RunError::PromoteFailed {
                    stage: self.stage.name.to_string(),
                    reason: e.to_string(),
                })?;

            tracing::info!(stage = %self.stage.name, "canary weight reset to 0");
        }

        Ok(self.transition())
    }
}
