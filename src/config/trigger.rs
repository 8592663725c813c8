// ABOUTME: Trigger configuration for pipeline runs.
// ABOUTME: Source pushes and a fixed-period schedule both start runs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When the pipeline runs.
///
/// The schedule fires independently of code change so base images stay
/// fresh; it re-executes the same definition with the latest merged source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default = "default_on_push")]
    pub on_push: bool,

    #[serde(default = "default_schedule", with = "humantime_serde")]
    pub schedule: Duration,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            on_push: default_on_push(),
            schedule: default_schedule(),
        }
    }
}

fn default_on_push() -> bool {
    true
}

fn default_schedule() -> Duration {
    // Weekly, 7 days.
    Duration::from_secs(7 * 24 * 60 * 60)
}
