// ABOUTME: Post-deploy validation configuration.
// ABOUTME: Defines the synthetic HTTP check parameters with sensible defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::env_value::EnvValue;

/// A synthetic request issued against a freshly deployed stage.
///
/// The check hits `{endpoint}/{stage}/{path}` and expects a 2xx response.
/// Failure marks the stage failed and halts downstream progression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_resource_path")]
    pub path: String,

    /// API key sent in the `x-api-key` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<EnvValue>,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_resource_path() -> String {
    "item".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_retries() -> u32 {
    3
}
