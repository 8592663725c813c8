// ABOUTME: DNS-label-compatible name validation for pipeline units.
// ABOUTME: Stages, waves, gates, and environments share RFC 1123 label rules.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageNameError {
    #[error("name cannot be empty")]
    Empty,

    #[error("name exceeds maximum length of 63 characters")]
    TooLong,

    #[error("name cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("name cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("name must be lowercase")]
    NotLowercase,

    #[error("invalid character in name: '{0}'")]
    InvalidChar(char),
}

/// A validated name for a pipeline unit (stage, wave, gate, or environment).
///
/// Names become registry tags, marker file names, and endpoint path segments,
/// so they follow RFC 1123 label requirements.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StageName(String);

impl StageName {
    pub fn new(value: &str) -> Result<Self, StageNameError> {
        if value.is_empty() {
            return Err(StageNameError::Empty);
        }

        if value.len() > 63 {
            return Err(StageNameError::TooLong);
        }

        if value.starts_with('-') {
            return Err(StageNameError::StartsWithHyphen);
        }

        if value.ends_with('-') {
            return Err(StageNameError::EndsWithHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(StageNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(StageNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for StageName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}
