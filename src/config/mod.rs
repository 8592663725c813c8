// ABOUTME: Configuration types and parsing for relevo.yml.
// ABOUTME: Handles YAML parsing, env var indirection, and config discovery.

mod build;
mod deserialize;
mod env_value;
mod environment;
mod trigger;
mod validation;

pub use build::{BuildConfig, BuildStepConfig};
pub use env_value::{EnvValue, resolve_env_map};
pub use environment::EnvironmentConfig;
pub use trigger::TriggerConfig;
pub use validation::ValidationConfig;

use crate::error::{Error, Result};
use crate::types::StageName;
use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use deserialize::{deserialize_stage_name, deserialize_stage_names_option};

pub const CONFIG_FILENAME: &str = "relevo.yml";
pub const CONFIG_FILENAME_ALT: &str = "relevo.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".relevo/config.yml";

/// Default directory for run locks and approval markers, relative to the
/// project directory.
pub const DEFAULT_STATE_DIR: &str = ".relevo/state";

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(deserialize_with = "deserialize_stage_name")]
    pub pipeline: StageName,

    /// Target registry URI for build artifacts, e.g.
    /// `registry.example.com/sample/app`.
    pub registry: String,

    pub build: BuildConfig,

    pub deploy: DeployCommandConfig,

    #[serde(default)]
    pub routing: Option<RoutingConfig>,

    #[serde(deserialize_with = "deserialize_stages")]
    pub stages: NonEmpty<StageConfig>,

    #[serde(default)]
    pub triggers: TriggerConfig,

    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

/// The deployment unit command, shared by every stage.
///
/// The command receives its environment configuration through `RELEVO_*`
/// variables and prints the deployed service endpoint on its last line.
/// One parametrized deployment unit covers dev, canary, and prod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployCommandConfig {
    pub command: String,
}

/// The routing-layer command used to adjust canary traffic weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    #[serde(deserialize_with = "deserialize_stage_name")]
    pub name: StageName,

    pub environment: EnvironmentConfig,

    /// Ordered pre-hooks: approval gates that must be satisfied before the
    /// stage deploys.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gates: Vec<GateConfig>,

    /// Ordered post-hooks: validations that must succeed for the stage to
    /// be considered complete.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validations: Vec<ValidationConfig>,

    /// Units this stage depends on. Defaults to every build wave plus the
    /// immediately preceding stage.
    #[serde(
        default,
        deserialize_with = "deserialize_stage_names_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub needs: Option<Vec<StageName>>,

    /// Build step whose artifact this stage deploys. Defaults to the sole
    /// build step when only one is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

/// A named manual checkpoint with a human-readable risk description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(deserialize_with = "deserialize_stage_name")]
    pub name: StageName,

    pub comment: String,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_DIR)
}

impl PipelineConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        Self::load(&Self::discover_path(dir)?)
    }

    /// Locate the configuration file in a directory without parsing it.
    pub fn discover_path(dir: &Path) -> Result<PathBuf> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in candidates {
            if path.exists() {
                return Ok(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Find a configured gate by name across all stages.
    pub fn find_gate(&self, name: &str) -> Option<&GateConfig> {
        self.stages
            .iter()
            .flat_map(|s| s.gates.iter())
            .find(|g| g.name.as_str() == name)
    }

    /// Template with the default dev -> canary -> prod promotion chain:
    /// dev auto-validates, canary and prod sit behind manual gates, and
    /// prod promotion resets the canary weight.
    pub fn template() -> Self {
        let name = |s: &str| StageName::new(s).expect("template names are valid");

        let dev = StageConfig {
            name: name("dev"),
            environment: EnvironmentConfig {
                name: name("dev"),
                account: None,
                region: None,
                traffic_weight: 100,
                reset_canary_on_promote: false,
            },
            gates: vec![],
            validations: vec![ValidationConfig {
                path: "item".to_string(),
                api_key: Some(EnvValue::FromEnv {
                    var: "RELEVO_API_KEY".to_string(),
                    default: None,
                }),
                timeout: std::time::Duration::from_secs(30),
                interval: std::time::Duration::from_secs(5),
                retries: 3,
            }],
            needs: None,
            artifact: None,
        };

        let canary = StageConfig {
            name: name("prod-canary"),
            environment: EnvironmentConfig {
                name: name("prod-canary"),
                account: None,
                region: None,
                traffic_weight: 10,
                reset_canary_on_promote: false,
            },
            gates: vec![GateConfig {
                name: name("canary-cutover"),
                comment: "Sends a fraction of production traffic to the new revision".to_string(),
            }],
            validations: vec![],
            needs: None,
            artifact: None,
        };

        let prod = StageConfig {
            name: name("prod"),
            environment: EnvironmentConfig {
                name: name("prod"),
                account: None,
                region: None,
                traffic_weight: 100,
                reset_canary_on_promote: true,
            },
            gates: vec![GateConfig {
                name: name("full-promotion"),
                comment: "Promotes the canary revision to all production traffic".to_string(),
            }],
            validations: vec![],
            needs: None,
            artifact: None,
        };

        PipelineConfig {
            pipeline: name("my-pipeline"),
            registry: "registry.example.com/my-app".to_string(),
            build: BuildConfig {
                steps: vec![BuildStepConfig {
                    name: name("app-image"),
                    source_dir: PathBuf::from("."),
                    commands: vec![
                        "docker build -t $RELEVO_REGISTRY:$RELEVO_REVISION .".to_string(),
                        "docker push $RELEVO_REGISTRY:$RELEVO_REVISION".to_string(),
                    ],
                }],
                credentials: std::collections::HashMap::new(),
            },
            deploy: DeployCommandConfig {
                command: "./deploy.sh".to_string(),
            },
            routing: Some(RoutingConfig {
                command: "./set-canary-weight.sh".to_string(),
            }),
            stages: NonEmpty::from((dev, vec![canary, prod])),
            triggers: TriggerConfig::default(),
            state_dir: default_state_dir(),
        }
    }
}

pub fn init_config(dir: &Path, pipeline: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut config = PipelineConfig::template();

    if let Some(p) = pipeline {
        config.pipeline = StageName::new(p).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    }

    let yaml = generate_template_yaml(&config);
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(config: &PipelineConfig) -> String {
    format!(
        r#"pipeline: {pipeline}
registry: {registry}

build:
  steps:
    - name: app-image
      source_dir: .
      commands:
        - docker build -t $RELEVO_REGISTRY:$RELEVO_REVISION .
        - docker push $RELEVO_REGISTRY:$RELEVO_REVISION
  credentials:
    REGISTRY_PASSWORD:
      env: REGISTRY_PASSWORD

deploy:
  command: ./deploy.sh

routing:
  command: ./set-canary-weight.sh

# dev auto-validates; canary and prod sit behind manual approval gates.
stages:
  - name: dev
    environment:
      name: dev
    validations:
      - path: item
        api_key:
          env: RELEVO_API_KEY
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

triggers:
  on_push: true
  schedule: 7days
"#,
        pipeline = config.pipeline,
        registry = config.registry,
    )
}

fn deserialize_stages<'de, D>(deserializer: D) -> std::result::Result<NonEmpty<StageConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<StageConfig> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(values)
        .ok_or_else(|| serde::de::Error::custom("at least one stage is required"))
}
