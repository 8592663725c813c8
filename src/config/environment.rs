// ABOUTME: Environment configuration for a deployment stage.
// ABOUTME: One parametrized struct covers dev, canary, and prod targets.

use serde::{Deserialize, Serialize};

use crate::types::StageName;

use super::deserialize::deserialize_stage_name;

/// The target environment of one stage.
///
/// dev, canary, and prod differ only in these parameters, never in
/// topology. Every component that needs environment information receives
/// this struct explicitly; there is no ambient context to look it up from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(deserialize_with = "deserialize_stage_name")]
    pub name: StageName,

    /// Target account identifier, passed through to the deployer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    /// Target region, passed through to the deployer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Fraction of traffic routed to this deployment, in percent.
    #[serde(default = "default_traffic_weight")]
    pub traffic_weight: u8,

    /// Promotion of this stage resets the canary traffic weight to zero.
    /// Set on the terminal production stage only.
    #[serde(default)]
    pub reset_canary_on_promote: bool,
}

fn default_traffic_weight() -> u8 {
    100
}
