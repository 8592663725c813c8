// ABOUTME: Build wave configuration: steps, source dirs, registry credentials.
// ABOUTME: Each step produces one registry-addressable artifact.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::types::StageName;

use super::deserialize::deserialize_stage_name;
use super::env_value::EnvValue;

/// Configuration of the build wave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Build steps; all steps of the wave may run concurrently.
    pub steps: Vec<BuildStepConfig>,

    /// Registry login credentials, exported into the build environment.
    /// Use the `env` form so secrets never land in the config file.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub credentials: HashMap<String, EnvValue>,
}

/// One build-and-publish unit.
///
/// Commands run in order inside the step; publishing must be the final
/// command so a failed build never leaves a partial artifact behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStepConfig {
    #[serde(deserialize_with = "deserialize_stage_name")]
    pub name: StageName,

    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    pub commands: Vec<String>,
}

fn default_source_dir() -> PathBuf {
    PathBuf::from(".")
}
