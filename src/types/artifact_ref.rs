// ABOUTME: Registry-addressable artifact reference parsing and validation.
// ABOUTME: Handles formats like registry.example.com/app:revision@digest.

use std::fmt;
use thiserror::Error;

use super::revision::{Revision, RevisionError};

#[derive(Debug, Error)]
pub enum ParseArtifactRefError {
    #[error("artifact reference cannot be empty")]
    Empty,

    #[error("invalid character in artifact reference: {0}")]
    InvalidChar(char),

    #[error("artifact reference is missing a revision tag: {0}")]
    MissingRevision(String),

    #[error("invalid revision tag: {0}")]
    BadRevision(#[from] RevisionError),
}

/// A versioned, registry-addressable build output.
///
/// Unlike a plain image reference, an artifact reference always carries the
/// source revision as its tag: a stage must be able to tell exactly which
/// snapshot of the source it is deploying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    registry: Option<String>,
    repository: String,
    revision: Revision,
    digest: Option<String>,
}

impl ArtifactRef {
    /// Build a reference for a freshly published artifact.
    pub fn tagged(registry_uri: &str, revision: Revision) -> Result<Self, ParseArtifactRefError> {
        let (registry, repository) = Self::split_registry(registry_uri)?;
        Ok(Self {
            registry,
            repository,
            revision,
            digest: None,
        })
    }

    pub fn parse(input: &str) -> Result<Self, ParseArtifactRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseArtifactRefError::Empty);
        }

        for c in input.chars() {
            if !c.is_ascii_alphanumeric()
                && c != '/'
                && c != ':'
                && c != '.'
                && c != '-'
                && c != '_'
                && c != '@'
            {
                return Err(ParseArtifactRefError::InvalidChar(c));
            }
        }

        // Split off digest if present
        let (without_digest, digest) = match input.split_once('@') {
            Some((before, after)) => (before, Some(after.to_string())),
            None => (input, None),
        };

        // The revision tag is mandatory. A colon inside the registry host
        // (a port) is recognised by the slash in the remainder.
        let (without_tag, revision) = match without_digest.rsplit_once(':') {
            Some((before, after)) if !after.contains('/') => {
                (before, Revision::new(after)?)
            }
            _ => {
                return Err(ParseArtifactRefError::MissingRevision(input.to_string()));
            }
        };

        let (registry, repository) = Self::split_registry(without_tag)?;

        Ok(Self {
            registry,
            repository,
            revision,
            digest,
        })
    }

    fn split_registry(input: &str) -> Result<(Option<String>, String), ParseArtifactRefError> {
        if input.is_empty() {
            return Err(ParseArtifactRefError::Empty);
        }

        // A registry is present if the first component contains a dot or
        // colon, or is "localhost"
        match input.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                Ok((Some(first.to_string()), rest.to_string()))
            }
            _ => Ok((None, input.to_string())),
        }
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref registry) = self.registry {
            write!(f, "{}/", registry)?;
        }
        write!(f, "{}:{}", self.repository, self.revision)?;
        if let Some(ref digest) = self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

impl serde::Serialize for ArtifactRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
