// ABOUTME: Immutable pipeline definition and its builder.
// ABOUTME: Execution order is declaration order, validated against the graph.

use serde::Serialize;
use thiserror::Error;

use crate::types::StageName;

use super::graph::DependencyGraph;
use super::stage::Stage;
use super::wave::Wave;

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("duplicate unit name: {0}")]
    DuplicateName(String),

    #[error("duplicate build step name: {0}")]
    DuplicateStep(String),

    #[error("pipeline definition has no units")]
    Empty,

    #[error("unit {unit} depends on unknown unit {dependency}")]
    UnknownDependency { unit: String, dependency: String },

    #[error("unit {unit} is declared before its dependency {dependency}")]
    DeclaredBeforeDependency { unit: String, dependency: String },

    #[error("stage {stage} consumes unknown artifact {artifact}")]
    UnknownArtifact { stage: String, artifact: String },

    #[error("stage {stage} must name one of the build artifacts explicitly")]
    AmbiguousArtifact { stage: String },

    #[error("stage {stage} has invalid traffic weight {weight} (must be 0-100)")]
    InvalidTrafficWeight { stage: String, weight: u8 },
}

/// One entry in the declaration-ordered unit list.
#[derive(Debug, Clone, Serialize)]
pub enum Unit {
    Wave(Wave),
    Stage(Stage),
}

impl Unit {
    pub fn name(&self) -> &StageName {
        match self {
            Unit::Wave(w) => &w.name,
            Unit::Stage(s) => &s.name,
        }
    }

    /// Declared dependency edges. Waves consume only the source snapshot.
    pub fn needs(&self) -> &[StageName] {
        match self {
            Unit::Wave(_) => &[],
            Unit::Stage(s) => &s.needs,
        }
    }
}

/// An ordered, immutable sequence of waves and stages.
///
/// Created once at synthesis time; a new run re-synthesizes a new
/// definition rather than mutating this one.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineDefinition {
    name: StageName,
    units: Vec<Unit>,
}

impl PipelineDefinition {
    pub fn builder(name: StageName) -> DefinitionBuilder {
        DefinitionBuilder {
            name,
            units: Vec::new(),
        }
    }

    pub fn name(&self) -> &StageName {
        &self.name
    }

    /// Units in execution order, which equals declaration order.
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.units.iter().filter_map(|u| match u {
            Unit::Stage(s) => Some(s),
            Unit::Wave(_) => None,
        })
    }

    pub fn waves(&self) -> impl Iterator<Item = &Wave> {
        self.units.iter().filter_map(|u| match u {
            Unit::Wave(w) => Some(w),
            Unit::Stage(_) => None,
        })
    }

    /// Stable identity of this definition, used for self-mutation
    /// detection between runs. Two definitions with the same structure
    /// produce the same fingerprint.
    pub fn fingerprint(&self) -> String {
        // Every field serializes infallibly; an empty fallback would make
        // distinct definitions compare equal.
        serde_json::to_string(self).expect("pipeline definition serializes to JSON")
    }
}

/// Appends waves and stages in declaration order, rejecting collisions
/// eagerly and validating the dependency graph at `build()`.
#[derive(Debug)]
pub struct DefinitionBuilder {
    name: StageName,
    units: Vec<Unit>,
}

impl DefinitionBuilder {
    /// Append a build wave.
    pub fn add_wave(mut self, wave: Wave) -> Result<Self, DefinitionError> {
        self.check_collision(&wave.name)?;

        let mut seen = std::collections::HashSet::new();
        for existing in self.units.iter().filter_map(|u| match u {
            Unit::Wave(w) => Some(w),
            Unit::Stage(_) => None,
        }) {
            seen.extend(existing.produces());
        }
        for step in wave.produces() {
            if !seen.insert(step) {
                return Err(DefinitionError::DuplicateStep(step.to_string()));
            }
        }

        self.units.push(Unit::Wave(wave));
        Ok(self)
    }

    /// Append a stage with its ordered gating hooks.
    pub fn add_stage(mut self, stage: Stage) -> Result<Self, DefinitionError> {
        self.check_collision(&stage.name)?;

        if stage.environment.traffic_weight > 100 {
            return Err(DefinitionError::InvalidTrafficWeight {
                stage: stage.name.to_string(),
                weight: stage.environment.traffic_weight,
            });
        }

        self.units.push(Unit::Stage(stage));
        Ok(self)
    }

    /// Validate the declared order against the dependency graph and seal
    /// the definition.
    pub fn build(self) -> Result<PipelineDefinition, DefinitionError> {
        if self.units.is_empty() {
            return Err(DefinitionError::Empty);
        }

        DependencyGraph::build(&self.units)?;

        Ok(PipelineDefinition {
            name: self.name,
            units: self.units,
        })
    }

    fn check_collision(&self, name: &StageName) -> Result<(), DefinitionError> {
        if self.units.iter().any(|u| u.name() == name) {
            return Err(DefinitionError::DuplicateName(name.to_string()));
        }
        Ok(())
    }
}
