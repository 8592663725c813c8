// ABOUTME: Tests for stage state transitions.
// ABOUTME: Verifies transition signatures and per-stage hook ordering.

mod support;

use std::sync::Arc;

use relevo::pipeline::synthesize;
use relevo::run::{
    Deployed, GatesCleared, Pending, Promoted, RunError, StageRun, Validated,
};
use relevo::types::{ArtifactRef, Revision};
use support::{Fakes, promotion_config};

fn artifact() -> ArtifactRef {
    let revision = Revision::new("abc123").unwrap();
    ArtifactRef::tagged("registry.test/sample/app-image", revision).unwrap()
}

fn stage_run(stage_name: &str) -> StageRun<Pending> {
    let definition = synthesize(&promotion_config()).unwrap();
    let stage = definition
        .stages()
        .find(|s| s.name.as_str() == stage_name)
        .unwrap()
        .clone();
    StageRun::new(stage, artifact())
}

// =============================================================================
// Transition Type Signature Tests
// =============================================================================

/// Verifies the type signatures of all transition methods compile
/// correctly, so the state machine is wired up at compile time.
#[test]
fn transition_type_signatures_compile() {
    use relevo::deploy::{Deployer, Router};
    use relevo::gate::Approver;
    use relevo::validate::Validator;

    // This function is never called, but it must compile.
    #[allow(dead_code)]
    async fn check_signatures<A, D, V, R>(approver: &A, deployer: &D, validator: &V, router: &R)
    where
        A: Approver,
        D: Deployer,
        V: Validator,
        R: Router,
    {
        let s1: StageRun<Pending> = stage_run("dev");

        // Pending -> GatesCleared
        let s2: Result<StageRun<GatesCleared>, RunError> = s1.clear_gates(approver).await;

        // GatesCleared -> Deployed
        let s3: Result<StageRun<Deployed>, RunError> = s2.unwrap().deploy(deployer).await;

        // Deployed -> Validated
        let s4: Result<StageRun<Validated>, RunError> = s3.unwrap().validate(validator).await;

        // Validated -> Promoted
        let s5: Result<StageRun<Promoted>, RunError> = s4.unwrap().promote(router).await;

        // Promoted - terminal state
        let (_stage, _service) = s5.unwrap().finish();
    }
}

// =============================================================================
// Behavior Tests
// =============================================================================

#[tokio::test]
async fn ungated_stage_clears_gates_immediately() {
    let fakes = Fakes::default();

    let cleared = stage_run("dev")
        .clear_gates(fakes.approver.as_ref())
        .await
        .unwrap();

    assert!(fakes.approver.approved.lock().is_empty());
    assert_eq!(cleared.stage_name().as_str(), "dev");
}

#[tokio::test]
async fn gated_stage_consults_approver_before_deploy() {
    let fakes = Fakes::default();

    let run = stage_run("prod-canary")
        .clear_gates(fakes.approver.as_ref())
        .await
        .unwrap();
    assert_eq!(*fakes.approver.approved.lock(), vec!["canary-cutover"]);
    assert!(fakes.deployer.deployed.lock().is_empty());

    run.deploy(fakes.deployer.as_ref()).await.unwrap();
    assert_eq!(*fakes.deployer.deployed.lock(), vec!["prod-canary"]);
}

#[tokio::test]
async fn deploy_failure_is_attributed_to_stage() {
    let fakes = Fakes {
        deployer: Arc::new(support::FakeDeployer {
            fail_environment: Some("dev".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    };

    let err = stage_run("dev")
        .clear_gates(fakes.approver.as_ref())
        .await
        .unwrap()
        .deploy(fakes.deployer.as_ref())
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::DeployFailed { ref stage, .. } if stage == "dev"));
    assert_eq!(err.stage(), Some("dev"));
}

#[tokio::test]
async fn validation_runs_against_deployed_endpoint() {
    let fakes = Fakes::default();

    let validated = stage_run("dev")
        .clear_gates(fakes.approver.as_ref())
        .await
        .unwrap()
        .deploy(fakes.deployer.as_ref())
        .await
        .unwrap()
        .validate(fakes.validator.as_ref())
        .await
        .unwrap();

    assert_eq!(*fakes.validator.checked.lock(), vec!["dev"]);
    assert_eq!(validated.endpoint(), "http://dev.test:8080");
}

#[tokio::test]
async fn stage_without_validations_skips_validator() {
    let fakes = Fakes::default();

    stage_run("prod-canary")
        .clear_gates(fakes.approver.as_ref())
        .await
        .unwrap()
        .deploy(fakes.deployer.as_ref())
        .await
        .unwrap()
        .validate(fakes.validator.as_ref())
        .await
        .unwrap();

    assert!(fakes.validator.checked.lock().is_empty());
}

#[tokio::test]
async fn failed_validation_fails_stage() {
    let fakes = Fakes {
        validator: Arc::new(support::FakeValidator {
            fail_stage: Some("dev".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    };

    let err = stage_run("dev")
        .clear_gates(fakes.approver.as_ref())
        .await
        .unwrap()
        .deploy(fakes.deployer.as_ref())
        .await
        .unwrap()
        .validate(fakes.validator.as_ref())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RunError::ValidationFailed { ref stage, .. } if stage == "dev"
    ));
}

#[tokio::test]
async fn promote_resets_canary_weight_only_when_flagged() {
    let fakes = Fakes::default();

    // dev does not reset the canary weight.
    stage_run("dev")
        .clear_gates(fakes.approver.as_ref())
        .await
        .unwrap()
        .deploy(fakes.deployer.as_ref())
        .await
        .unwrap()
        .validate(fakes.validator.as_ref())
        .await
        .unwrap()
        .promote(fakes.router.as_ref())
        .await
        .unwrap();
    assert!(fakes.router.calls.lock().is_empty());

    // prod resets it to zero as part of the promotion.
    stage_run("prod")
        .clear_gates(fakes.approver.as_ref())
        .await
        .unwrap()
        .deploy(fakes.deployer.as_ref())
        .await
        .unwrap()
        .validate(fakes.validator.as_ref())
        .await
        .unwrap()
        .promote(fakes.router.as_ref())
        .await
        .unwrap();
    assert_eq!(*fakes.router.calls.lock(), vec![("prod".to_string(), 0)]);
}

#[tokio::test]
async fn failed_weight_reset_fails_promotion() {
    let fakes = Fakes {
        router: Arc::new(support::FakeRouter {
            fail: true,
            ..Default::default()
        }),
        ..Default::default()
    };

    let err = stage_run("prod")
        .clear_gates(fakes.approver.as_ref())
        .await
        .unwrap()
        .deploy(fakes.deployer.as_ref())
        .await
        .unwrap()
        .validate(fakes.validator.as_ref())
        .await
        .unwrap()
        .promote(fakes.router.as_ref())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RunError::PromoteFailed { ref stage, .. } if stage == "prod"
    ));
}
