// ABOUTME: Build wave types: parallel build-and-publish steps.
// ABOUTME: A wave is a sequencing barrier for everything declared after it.

use serde::Serialize;
use std::path::PathBuf;

use crate::types::StageName;

/// One build-and-publish unit within a wave.
#[derive(Debug, Clone, Serialize)]
pub struct BuildStep {
    pub name: StageName,
    pub source_dir: PathBuf,
    /// Shell commands run in order; the publish must come last so a failed
    /// build never leaves a partial artifact.
    pub commands: Vec<String>,
}

/// A parallelizable build unit.
///
/// Steps within the wave may run concurrently, but no stage depending on
/// any of the wave's artifacts starts before the whole wave completes.
#[derive(Debug, Clone, Serialize)]
pub struct Wave {
    pub name: StageName,
    pub steps: Vec<BuildStep>,
}

impl Wave {
    /// Names of the artifacts this wave produces (one per step).
    pub fn produces(&self) -> impl Iterator<Item = &StageName> {
        self.steps.iter().map(|s| &s.name)
    }
}
