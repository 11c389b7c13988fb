//! Query validation.
//!
//! The validator is the only entry point that defends against malformed
//! input; everything behind it trusts that it receives a non-empty query.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Why a query was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    /// The query parameter is absent.
    Missing,
    /// The query parameter is present but not a single string.
    WrongType,
    /// The query is empty after trimming.
    Empty,
}

impl ValidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationReason::Missing => "missing",
            ValidationReason::WrongType => "wrong_type",
            ValidationReason::Empty => "empty",
        }
    }
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected query.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[error("invalid query: {reason}")]
pub struct ValidationError {
    pub reason: ValidationReason,
}

impl ValidationError {
    pub fn new(reason: ValidationReason) -> Self {
        Self { reason }
    }
}

/// Stateless validator for incoming search queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryValidator;

impl QueryValidator {
    /// Create a new validator.
    pub fn new() -> Self {
        QueryValidator
    }

    /// Validate an arbitrary deserialized value.
    ///
    /// Returns the trimmed query on success.
    pub fn validate(&self, raw: Option<&Value>) -> Result<String, ValidationError> {
        match raw {
            None | Some(Value::Null) => Err(ValidationError::new(ValidationReason::Missing)),
            Some(Value::String(s)) => self.validate_str(Some(s)),
            Some(_) => Err(ValidationError::new(ValidationReason::WrongType)),
        }
    }

    /// Validate an optional string parameter.
    pub fn validate_str(&self, raw: Option<&str>) -> Result<String, ValidationError> {
        let raw = raw.ok_or(ValidationError::new(ValidationReason::Missing))?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::new(ValidationReason::Empty));
        }
        Ok(trimmed.to_string())
    }

    /// Validate every value supplied for a repeated parameter.
    ///
    /// Exactly one value is accepted; repeating the parameter makes it a list,
    /// which is the wrong type.
    pub fn validate_values<S: AsRef<str>>(&self, values: &[S]) -> Result<String, ValidationError> {
        match values {
            [] => Err(ValidationError::new(ValidationReason::Missing)),
            [single] => self.validate_str(Some(single.as_ref())),
            _ => Err(ValidationError::new(ValidationReason::WrongType)),
        }
    }
}
