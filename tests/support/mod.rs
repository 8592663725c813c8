// ABOUTME: Test support utilities.
// ABOUTME: Provides fake collaborators and config fixtures for integration tests.

// Each test binary only uses some of these helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use relevo::config::{EnvironmentConfig, PipelineConfig};
use relevo::deploy::{
    ArtifactBuilder, BuildRequest, DeploySpec, DeployedService, Deployer, Router, TargetError,
};
use relevo::gate::{Approver, GateError};
use relevo::pipeline::ApprovalGate;
use relevo::run::Collaborators;
use relevo::types::{ArtifactRef, DeploymentId};
use relevo::validate::{ValidationError, ValidationRequest, Validator};

/// Records build requests; optionally fails one named step.
#[derive(Default)]
pub struct FakeBuilder {
    pub fail_step: Option<String>,
    pub built: Mutex<Vec<String>>,
}

#[async_trait]
impl ArtifactBuilder for FakeBuilder {
    async fn build_and_publish(&self, request: &BuildRequest) -> Result<ArtifactRef, TargetError> {
        if self.fail_step.as_deref() == Some(request.step.as_str()) {
            return Err(TargetError::Build {
                step: request.step.to_string(),
                reason: "exit status 1".to_string(),
            });
        }
        self.built.lock().push(request.step.to_string());
        ArtifactRef::tagged(&request.registry, request.revision.clone()).map_err(|e| {
            TargetError::Publish {
                step: request.step.to_string(),
                reason: e.to_string(),
            }
        })
    }
}

/// Records deployed environments; optionally fails one.
#[derive(Default)]
pub struct FakeDeployer {
    pub fail_environment: Option<String>,
    pub deployed: Mutex<Vec<String>>,
}

#[async_trait]
impl Deployer for FakeDeployer {
    async fn apply(&self, spec: &DeploySpec) -> Result<DeployedService, TargetError> {
        let environment = spec.environment.name.to_string();
        if self.fail_environment.as_deref() == Some(environment.as_str()) {
            return Err(TargetError::Deploy {
                environment,
                reason: "provisioning failed".to_string(),
            });
        }
        self.deployed.lock().push(environment.clone());
        Ok(DeployedService {
            id: DeploymentId::new(format!(
                "{}-{}",
                environment,
                spec.artifact.revision().short()
            )),
            endpoint: format!("http://{}.test:8080", environment),
        })
    }
}

/// Records canary weight calls.
#[derive(Default)]
pub struct FakeRouter {
    pub fail: bool,
    pub calls: Mutex<Vec<(String, u8)>>,
}

#[async_trait]
impl Router for FakeRouter {
    async fn set_canary_weight(
        &self,
        environment: &EnvironmentConfig,
        percent: u8,
    ) -> Result<(), TargetError> {
        if self.fail {
            return Err(TargetError::Route {
                environment: environment.name.to_string(),
                reason: "routing update rejected".to_string(),
            });
        }
        self.calls
            .lock()
            .push((environment.name.to_string(), percent));
        Ok(())
    }
}

/// Records validated stages; optionally fails one.
#[derive(Default)]
pub struct FakeValidator {
    pub fail_stage: Option<String>,
    pub checked: Mutex<Vec<String>>,
}

#[async_trait]
impl Validator for FakeValidator {
    async fn check(&self, request: &ValidationRequest<'_>) -> Result<(), ValidationError> {
        if self.fail_stage.as_deref() == Some(request.stage.as_str()) {
            return Err(ValidationError::UnexpectedStatus(500));
        }
        self.checked.lock().push(request.stage.to_string());
        Ok(())
    }
}

/// Approves every gate immediately, recording the order.
#[derive(Default)]
pub struct InstantApprover {
    pub approved: Mutex<Vec<String>>,
}

#[async_trait]
impl Approver for InstantApprover {
    async fn await_approval(&self, gate: &ApprovalGate) -> Result<(), GateError> {
        self.approved.lock().push(gate.name.to_string());
        Ok(())
    }
}

/// Bundle of fakes with handles kept for assertions.
#[derive(Default)]
pub struct Fakes {
    pub builder: Arc<FakeBuilder>,
    pub deployer: Arc<FakeDeployer>,
    pub router: Arc<FakeRouter>,
    pub validator: Arc<FakeValidator>,
    pub approver: Arc<InstantApprover>,
}

impl Fakes {
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            builder: self.builder.clone(),
            deployer: self.deployer.clone(),
            router: self.router.clone(),
            validator: self.validator.clone(),
            approver: self.approver.clone(),
        }
    }
}

/// Collaborators with a caller-supplied approver and default fakes
/// elsewhere.
pub fn collaborators_with_approver(
    fakes: &Fakes,
    approver: Arc<dyn Approver>,
) -> Collaborators {
    Collaborators {
        builder: fakes.builder.clone(),
        deployer: fakes.deployer.clone(),
        router: fakes.router.clone(),
        validator: fakes.validator.clone(),
        approver,
    }
}

/// The canonical three-stage promotion chain used across tests.
pub const PROMOTION_YAML: &str = r#"
pipeline: sample-app
registry: registry.test/sample

build:
  steps:
    - name: app-image
      source_dir: .
      commands:
        - docker build -t $RELEVO_REGISTRY:$RELEVO_REVISION .
        - docker push $RELEVO_REGISTRY:$RELEVO_REVISION

deploy:
  command: ./deploy.sh

routing:
  command: ./route.sh

stages:
  - name: dev
    environment:
      name: dev
    validations:
      - path: item
  - name: prod-canary
    environment:
      name: prod-canary
      traffic_weight: 10
    gates:
      - name: canary-cutover
        comment: Sends a fraction of production traffic to the new revision
  - name: prod
    environment:
      name: prod
      reset_canary_on_promote: true
    gates:
      - name: full-promotion
        comment: Promotes the canary revision to all production traffic
"#;

pub fn promotion_config() -> PipelineConfig {
    PipelineConfig::from_yaml(PROMOTION_YAML).expect("fixture config parses")
}
