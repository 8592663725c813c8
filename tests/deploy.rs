// ABOUTME: Integration tests for the shell-command collaborators.
// ABOUTME: Exercises the RELEVO_* environment contract with real shell commands.

use relevo::config::EnvironmentConfig;
use relevo::deploy::{
    ArtifactBuilder, BuildRequest, CommandBuilder, CommandDeployer, CommandRouter, DeploySpec,
    Deployer, NullRouter, Router, TargetErrorKind,
};
use relevo::types::{ArtifactRef, Revision, StageName};
use std::collections::HashMap;
use std::path::PathBuf;

fn build_request(commands: &[&str]) -> BuildRequest {
    BuildRequest {
        step: StageName::new("app-image").unwrap(),
        source_dir: PathBuf::from("."),
        revision: Revision::new("abc123").unwrap(),
        registry: "registry.test/sample/app-image".to_string(),
        commands: commands.iter().map(|c| c.to_string()).collect(),
        env: HashMap::new(),
    }
}

fn environment(name: &str) -> EnvironmentConfig {
    EnvironmentConfig {
        name: StageName::new(name).unwrap(),
        account: Some("111111111111".to_string()),
        region: Some("eu-west-1".to_string()),
        traffic_weight: 10,
        reset_canary_on_promote: false,
    }
}

fn artifact() -> ArtifactRef {
    ArtifactRef::tagged(
        "registry.test/sample/app-image",
        Revision::new("abc123").unwrap(),
    )
    .unwrap()
}

mod builder {
    use super::*;

    #[tokio::test]
    async fn successful_build_returns_tagged_artifact() {
        let request = build_request(&["true", "true"]);
        let artifact = CommandBuilder::new()
            .build_and_publish(&request)
            .await
            .unwrap();

        assert_eq!(
            artifact.to_string(),
            "registry.test/sample/app-image:abc123"
        );
    }

    #[tokio::test]
    async fn build_commands_see_revision_and_registry() {
        let request = build_request(&[
            "test \"$RELEVO_REVISION\" = abc123",
            "test \"$RELEVO_REGISTRY\" = registry.test/sample/app-image",
            "test \"$RELEVO_STEP\" = app-image",
        ]);
        assert!(
            CommandBuilder::new()
                .build_and_publish(&request)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn failing_intermediate_command_is_a_build_error() {
        let request = build_request(&["false", "true"]);
        let err = CommandBuilder::new()
            .build_and_publish(&request)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), TargetErrorKind::BuildFailed);
    }

    #[tokio::test]
    async fn failing_final_command_is_a_publish_error() {
        // The final command is the publish; everything before it built
        // fine, so the failure is classified differently.
        let request = build_request(&["true", "false"]);
        let err = CommandBuilder::new()
            .build_and_publish(&request)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), TargetErrorKind::PublishFailed);
    }

    #[tokio::test]
    async fn extra_credentials_are_passed_through() {
        let mut request = build_request(&["test \"$REGISTRY_PASSWORD\" = hunter2"]);
        request
            .env
            .insert("REGISTRY_PASSWORD".to_string(), "hunter2".to_string());
        assert!(
            CommandBuilder::new()
                .build_and_publish(&request)
                .await
                .is_ok()
        );
    }
}

mod deployer {
    use super::*;

    #[tokio::test]
    async fn endpoint_is_last_stdout_line() {
        let deployer =
            CommandDeployer::new("echo applying; echo http://prod-canary.test:8080".to_string());
        let spec = DeploySpec {
            environment: environment("prod-canary"),
            artifact: artifact(),
        };

        let service = deployer.apply(&spec).await.unwrap();
        assert_eq!(service.endpoint, "http://prod-canary.test:8080");
        assert_eq!(service.id.as_str(), "prod-canary-abc123");
    }

    #[tokio::test]
    async fn deploy_command_sees_environment_contract() {
        let command = concat!(
            "test \"$RELEVO_ENVIRONMENT\" = prod-canary && ",
            "test \"$RELEVO_ARTIFACT\" = registry.test/sample/app-image:abc123 && ",
            "test \"$RELEVO_TRAFFIC_WEIGHT\" = 10 && ",
            "test \"$RELEVO_ACCOUNT\" = 111111111111 && ",
            "test \"$RELEVO_REGION\" = eu-west-1 && ",
            "echo http://prod-canary.test:8080"
        );
        let deployer = CommandDeployer::new(command.to_string());
        let spec = DeploySpec {
            environment: environment("prod-canary"),
            artifact: artifact(),
        };

        assert!(deployer.apply(&spec).await.is_ok());
    }

    #[tokio::test]
    async fn failing_command_is_a_deploy_error() {
        let deployer = CommandDeployer::new("exit 3".to_string());
        let spec = DeploySpec {
            environment: environment("dev"),
            artifact: artifact(),
        };

        let err = deployer.apply(&spec).await.unwrap_err();
        assert_eq!(err.kind(), TargetErrorKind::DeployFailed);
    }

    #[tokio::test]
    async fn missing_endpoint_is_a_deploy_error() {
        let deployer = CommandDeployer::new("true".to_string());
        let spec = DeploySpec {
            environment: environment("dev"),
            artifact: artifact(),
        };

        let err = deployer.apply(&spec).await.unwrap_err();
        assert_eq!(err.kind(), TargetErrorKind::DeployFailed);
    }
}

mod router {
    use super::*;

    #[tokio::test]
    async fn routing_command_sees_weight() {
        let command = concat!(
            "test \"$RELEVO_ENVIRONMENT\" = prod-canary && ",
            "test \"$RELEVO_CANARY_WEIGHT\" = 0"
        );
        let router = CommandRouter::new(command.to_string());

        assert!(
            router
                .set_canary_weight(&environment("prod-canary"), 0)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn failing_command_is_a_route_error() {
        let router = CommandRouter::new("false".to_string());
        let err = router
            .set_canary_weight(&environment("prod-canary"), 50)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), TargetErrorKind::RouteFailed);
    }

    #[tokio::test]
    async fn null_router_always_fails() {
        let err = NullRouter
            .set_canary_weight(&environment("prod"), 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), TargetErrorKind::RouteFailed);
    }
}
