// ABOUTME: Explicit dependency graph over pipeline units.
// ABOUTME: Validates that declaration order is a valid topological order.

use std::collections::HashMap;

use crate::types::StageName;

use super::definition::{DefinitionError, Unit};

/// Dependency edges between pipeline units.
///
/// Each unit declares its inputs (`needs`, artifact consumption) instead of
/// wiring edges through construction side effects. Because stages execute
/// strictly in declaration order, validation reduces to checking that every
/// dependency is declared before its consumer; cycles are impossible in an
/// order that passes this check.
#[derive(Debug)]
pub struct DependencyGraph {
    /// (consumer, producer) pairs, in consumer declaration order.
    edges: Vec<(StageName, StageName)>,
}

impl DependencyGraph {
    pub fn build(units: &[Unit]) -> Result<Self, DefinitionError> {
        let mut positions = HashMap::new();
        for (index, unit) in units.iter().enumerate() {
            positions.insert(unit.name().clone(), index);
        }

        // Artifact producers: step name -> wave position.
        let mut artifacts: HashMap<&StageName, usize> = HashMap::new();
        for (index, unit) in units.iter().enumerate() {
            if let Unit::Wave(wave) = unit {
                for step in wave.produces() {
                    artifacts.insert(step, index);
                }
            }
        }

        let mut edges = Vec::new();
        for (index, unit) in units.iter().enumerate() {
            for need in unit.needs() {
                match positions.get(need) {
                    None => {
                        return Err(DefinitionError::UnknownDependency {
                            unit: unit.name().to_string(),
                            dependency: need.to_string(),
                        });
                    }
                    Some(&producer) if producer >= index => {
                        return Err(DefinitionError::DeclaredBeforeDependency {
                            unit: unit.name().to_string(),
                            dependency: need.to_string(),
                        });
                    }
                    Some(_) => edges.push((unit.name().clone(), need.clone())),
                }
            }

            // An artifact reference must be resolvable before the
            // consuming stage executes: its producing wave must be
            // declared earlier.
            if let Unit::Stage(stage) = unit {
                match artifacts.get(&stage.artifact) {
                    Some(&producer) if producer < index => {}
                    _ => {
                        return Err(DefinitionError::UnknownArtifact {
                            stage: stage.name.to_string(),
                            artifact: stage.artifact.to_string(),
                        });
                    }
                }
            }
        }

        Ok(Self { edges })
    }

    /// All (consumer, producer) edges.
    pub fn edges(&self) -> &[(StageName, StageName)] {
        &self.edges
    }
}
