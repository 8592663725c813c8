// ABOUTME: Drives one pipeline run: waves first, then stages, in declaration order.
// ABOUTME: Publishes observable run state and produces a report per completed run.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::deploy::{ArtifactBuilder, BuildRequest, Deployer, Router};
use crate::gate::Approver;
use crate::pipeline::{PipelineDefinition, Stage, Unit, Wave};
use crate::types::{ArtifactRef, DeploymentId, Revision, RunId, StageName};
use crate::validate::Validator;

use super::error::RunError;
use super::stage_run::StageRun;
use super::state::{RunState, StagePhase};

/// The external systems a run talks to, behind trait seams so tests can
/// substitute fakes.
#[derive(Clone)]
pub struct Collaborators {
    pub builder: Arc<dyn ArtifactBuilder>,
    pub deployer: Arc<dyn Deployer>,
    pub router: Arc<dyn Router>,
    pub validator: Arc<dyn Validator>,
    pub approver: Arc<dyn Approver>,
}

/// One completed stage within a run report.
#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub stage: StageName,
    pub deployment: DeploymentId,
    pub endpoint: String,
    /// Wall-clock time including any gate wait.
    pub duration: Duration,
}

/// Summary of a finished run, for output and status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub revision: Revision,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageOutcome>,
}

/// Executes pipeline definitions one run at a time.
///
/// The executor holds no run history: each `execute` call is independent,
/// and the only cross-run state is the shared `RunState` it publishes.
pub struct Executor {
    collaborators: Collaborators,
    /// Base registry URI; each build step publishes under `{registry}/{step}`.
    registry: String,
    /// Resolved credentials and other environment for build commands.
    build_env: HashMap<String, String>,
    status: Arc<RwLock<RunState>>,
}

impl Executor {
    pub fn new(
        collaborators: Collaborators,
        registry: impl Into<String>,
        build_env: HashMap<String, String>,
    ) -> Self {
        Self {
            collaborators,
            registry: registry.into(),
            build_env,
            status: Arc::new(RwLock::new(RunState::Queued)),
        }
    }

    /// Handle to the observable run state, shared with status reporting.
    pub fn status(&self) -> Arc<RwLock<RunState>> {
        Arc::clone(&self.status)
    }

    pub fn state(&self) -> RunState {
        self.status.read().clone()
    }

    fn set_state(&self, state: RunState) {
        *self.status.write() = state;
    }

    /// Run the definition front to back for one revision.
    ///
    /// Any failure is terminal: the run state is set to `Failed` with the
    /// offending stage attributed, downstream units never start, and no
    /// rollback is attempted.
    pub async fn execute(
        &self,
        definition: &PipelineDefinition,
        revision: &Revision,
    ) -> Result<RunReport, RunError> {
        let started_at = Utc::now();
        let run_id = RunId::new(format!(
            "{}-{}-{}",
            definition.name(),
            revision.short(),
            started_at.timestamp()
        ));

        tracing::info!(run = %run_id, revision = %revision, "run started");

        match self.drive(definition, revision).await {
            Ok(stages) => {
                self.set_state(RunState::Complete);
                let report = RunReport {
                    run_id,
                    revision: revision.clone(),
                    started_at,
                    finished_at: Utc::now(),
                    stages,
                };
                tracing::info!(run = %report.run_id, "run complete");
                Ok(report)
            }
            Err(e) => {
                let stage = e.stage().and_then(|s| StageName::new(s).ok());
                self.set_state(RunState::Failed {
                    stage,
                    reason: e.to_string(),
                });
                tracing::error!(run = %run_id, "run failed: {}", e);
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        definition: &PipelineDefinition,
        revision: &Revision,
    ) -> Result<Vec<StageOutcome>, RunError> {
        let mut artifacts: HashMap<StageName, ArtifactRef> = HashMap::new();
        let mut outcomes = Vec::new();

        for unit in definition.units() {
            match unit {
                Unit::Wave(wave) => {
                    self.set_state(RunState::Building);
                    self.run_wave(wave, revision, &mut artifacts).await?;
                }
                Unit::Stage(stage) => {
                    let outcome = self.run_stage(stage, &artifacts).await?;
                    outcomes.push(outcome);
                }
            }
        }

        Ok(outcomes)
    }

    /// Build every step in the wave concurrently. One failing step fails
    /// the wave, and the wave failing blocks everything declared after it.
    async fn run_wave(
        &self,
        wave: &Wave,
        revision: &Revision,
        artifacts: &mut HashMap<StageName, ArtifactRef>,
    ) -> Result<(), RunError> {
        let requests: Vec<BuildRequest> = wave
            .steps
            .iter()
            .map(|step| BuildRequest {
                step: step.name.clone(),
                source_dir: step.source_dir.clone(),
                revision: revision.clone(),
                registry: format!("{}/{}", self.registry, step.name),
                commands: step.commands.clone(),
                env: self.build_env.clone(),
            })
            .collect();

        let built = try_join_all(
            requests
                .iter()
                .map(|request| self.collaborators.builder.build_and_publish(request)),
        )
        .await
        .map_err(|e| RunError::BuildFailed(e.to_string()))?;

        for (request, artifact) in requests.iter().zip(built) {
            tracing::info!(step = %request.step, artifact = %artifact, "artifact published");
            artifacts.insert(request.step.clone(), artifact);
        }

        Ok(())
    }

    async fn run_stage(
        &self,
        stage: &Stage,
        artifacts: &HashMap<StageName, ArtifactRef>,
    ) -> Result<StageOutcome, RunError> {
        let artifact = artifacts.get(&stage.artifact).cloned().ok_or_else(|| {
            RunError::ArtifactUnresolved {
                stage: stage.name.to_string(),
                artifact: stage.artifact.to_string(),
            }
        })?;

        let stage_started = std::time::Instant::now();
        let run = StageRun::new(stage.clone(), artifact);

        if !stage.pre.is_empty() {
            self.set_state(RunState::Stage {
                stage: stage.name.clone(),
                phase: StagePhase::GateWait,
            });
        }
        let run = run.clear_gates(self.collaborators.approver.as_ref()).await?;

        self.set_state(RunState::Stage {
            stage: stage.name.clone(),
            phase: StagePhase::Deploying,
        });
        let run = run.deploy(self.collaborators.deployer.as_ref()).await?;

        self.set_state(RunState::Stage {
            stage: stage.name.clone(),
            phase: StagePhase::Validating,
        });
        let run = run.validate(self.collaborators.validator.as_ref()).await?;

        let run = run.promote(self.collaborators.router.as_ref()).await?;
        self.set_state(RunState::Stage {
            stage: stage.name.clone(),
            phase: StagePhase::Promoted,
        });

        let (stage, deployed) = run.finish();

        Ok(StageOutcome {
            stage: stage.name,
            deployment: deployed.id,
            endpoint: deployed.endpoint,
            duration: stage_started.elapsed(),
        })
    }
}
