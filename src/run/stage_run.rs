// ABOUTME: Generic stage execution struct parameterized by state marker.
// ABOUTME: The marker type determines which transitions are available.

use std::marker::PhantomData;

use crate::deploy::DeployedService;
use crate::pipeline::Stage;
use crate::types::{ArtifactRef, StageName};

use super::state::{Deployed, Pending, Promoted, Validated};

/// One stage's execution within a pipeline run, parameterized by its
/// current state.
///
/// Transitions consume `self` and return the next state, so a stage can
/// never be validated before it deploys or promoted before it validates.
#[derive(Debug)]
pub struct StageRun<S> {
    pub(crate) stage: Stage,
    pub(crate) artifact: ArtifactRef,
    pub(crate) deployed: Option<DeployedService>,
    pub(crate) _state: PhantomData<S>,
}

impl StageRun<Pending> {
    /// Instantiate a stage with its resolved artifact.
    pub fn new(stage: Stage, artifact: ArtifactRef) -> Self {
        StageRun {
            stage,
            artifact,
            deployed: None,
            _state: PhantomData,
        }
    }
}

impl<S> StageRun<S> {
    pub fn stage_name(&self) -> &StageName {
        &self.stage.name
    }

    pub fn artifact(&self) -> &ArtifactRef {
        &self.artifact
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }
}

// State-specific accessors for the deployed service.

impl StageRun<Deployed> {
    pub fn endpoint(&self) -> &str {
        &self
            .deployed
            .as_ref()
            .expect("deployed stage must have a service")
            .endpoint
    }
}

impl StageRun<Validated> {
    pub fn endpoint(&self) -> &str {
        &self
            .deployed
            .as_ref()
            .expect("validated stage must have a service")
            .endpoint
    }
}

impl StageRun<Promoted> {
    /// Consume the run and return the stage with its deployed service.
    pub fn finish(self) -> (Stage, DeployedService) {
        let deployed = self
            .deployed
            .expect("promoted stage must have a service");
        (self.stage, deployed)
    }
}
