// ABOUTME: Application-wide error types for relevo.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("unknown approval gate: {0}")]
    UnknownGate(String),

    #[error(transparent)]
    Gate(#[from] crate::gate::GateError),

    #[error(transparent)]
    Trigger(#[from] crate::trigger::TriggerError),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid revision: {0}")]
    Revision(#[from] crate::types::RevisionError),

    #[error("pipeline definition error: {0}")]
    Definition(#[from] crate::pipeline::DefinitionError),

    #[error("pipeline run failed: {0}")]
    Run(#[from] crate::run::RunError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
