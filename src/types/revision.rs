// ABOUTME: Source revision identifier validation.
// ABOUTME: Revisions become artifact tags, so the character set is restricted.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RevisionError {
    #[error("revision cannot be empty")]
    Empty,

    #[error("revision exceeds maximum length of 64 characters")]
    TooLong,

    #[error("revision must start with an alphanumeric character")]
    BadLeadingChar,

    #[error("invalid character in revision: '{0}'")]
    InvalidChar(char),
}

/// A source revision identifier (commit hash, tag, or similar).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    pub fn new(value: &str) -> Result<Self, RevisionError> {
        if value.is_empty() {
            return Err(RevisionError::Empty);
        }

        if value.len() > 64 {
            return Err(RevisionError::TooLong);
        }

        let first = value.chars().next().unwrap_or('-');
        if !first.is_ascii_alphanumeric() {
            return Err(RevisionError::BadLeadingChar);
        }

        for c in value.chars() {
            if !c.is_ascii_alphanumeric() && c != '-' && c != '_' && c != '.' {
                return Err(RevisionError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for run IDs and log lines.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(12)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for Revision {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}
