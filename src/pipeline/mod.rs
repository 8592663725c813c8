// ABOUTME: Pipeline definition assembly: waves, stages, gates, dependency graph.
// ABOUTME: Definitions are immutable; each run re-synthesizes one from config.

mod definition;
mod graph;
mod stage;
mod wave;

pub use definition::{DefinitionBuilder, DefinitionError, PipelineDefinition, Unit};
pub use graph::DependencyGraph;
pub use stage::{ApprovalGate, Stage};
pub use wave::{BuildStep, Wave};

use crate::config::PipelineConfig;
use crate::types::StageName;

/// Name of the synthesized build wave.
pub const BUILD_WAVE: &str = "build";

/// Synthesize a pipeline definition from configuration.
///
/// The definition is the sole source of truth for a run and is re-derived
/// on every trigger, so a config change takes effect on the next run
/// without any persisted pipeline state.
pub fn synthesize(config: &PipelineConfig) -> Result<PipelineDefinition, DefinitionError> {
    let wave_name = StageName::new(BUILD_WAVE).expect("build wave name is a valid label");

    let steps: Vec<BuildStep> = config
        .build
        .steps
        .iter()
        .map(|s| BuildStep {
            name: s.name.clone(),
            source_dir: s.source_dir.clone(),
            commands: s.commands.clone(),
        })
        .collect();

    let sole_artifact = match steps.as_slice() {
        [only] => Some(only.name.clone()),
        _ => None,
    };

    let mut builder = PipelineDefinition::builder(config.pipeline.clone()).add_wave(Wave {
        name: wave_name.clone(),
        steps,
    })?;

    let mut previous: Option<StageName> = None;
    for stage_config in config.stages.iter() {
        let artifact = match (&stage_config.artifact, &sole_artifact) {
            (Some(name), _) => StageName::new(name).map_err(|_| {
                DefinitionError::UnknownArtifact {
                    stage: stage_config.name.to_string(),
                    artifact: name.clone(),
                }
            })?,
            (None, Some(sole)) => sole.clone(),
            (None, None) => {
                return Err(DefinitionError::AmbiguousArtifact {
                    stage: stage_config.name.to_string(),
                });
            }
        };

        // Default dependency edges: the build wave plus the preceding
        // stage, giving the strict dev -> canary -> prod promotion chain.
        let needs = match &stage_config.needs {
            Some(explicit) => explicit.clone(),
            None => {
                let mut needs = vec![wave_name.clone()];
                if let Some(prev) = &previous {
                    needs.push(prev.clone());
                }
                needs
            }
        };

        let stage = Stage {
            name: stage_config.name.clone(),
            environment: stage_config.environment.clone(),
            pre: stage_config
                .gates
                .iter()
                .map(|g| ApprovalGate {
                    name: g.name.clone(),
                    comment: g.comment.clone(),
                })
                .collect(),
            post: stage_config.validations.clone(),
            needs,
            artifact,
        };

        previous = Some(stage.name.clone());
        builder = builder.add_stage(stage)?;
    }

    builder.build()
}
