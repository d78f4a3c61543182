//! Input policy applied to every mutating registry call.

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Limits on verify/transfer inputs. Configurable through the `[policy]`
/// table of `sustain.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryPolicy {
    pub min_certification_level: u32,
    pub max_certification_level: u32,
    /// Maximum length, in characters, of `name` and `organization`.
    pub max_text_length: usize,
    /// Maximum length, in characters, of account identifiers.
    pub max_identifier_length: usize,
}

impl Default for RegistryPolicy {
    fn default() -> Self {
        Self {
            min_certification_level: 1,
            max_certification_level: 5,
            max_text_length: 100,
            max_identifier_length: 128,
        }
    }
}

impl RegistryPolicy {
    /// Reject inverted or empty ranges before the policy is put to use.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_certification_level > self.max_certification_level {
            return Err(format!(
                "min_certification_level ({}) exceeds max_certification_level ({})",
                self.min_certification_level, self.max_certification_level
            ));
        }
        if self.max_text_length == 0 || self.max_identifier_length == 0 {
            return Err("length limits must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn check_level(&self, level: u32) -> Result<(), RegistryError> {
        if level < self.min_certification_level || level > self.max_certification_level {
            return Err(RegistryError::InvalidCertificationLevel {
                level,
                min: self.min_certification_level,
                max: self.max_certification_level,
            });
        }
        Ok(())
    }

    /// Display strings: non-blank, bounded, no control characters.
    pub fn check_text(&self, field: &'static str, value: &str) -> Result<(), RegistryError> {
        if value.trim().is_empty() {
            return Err(invalid(field, "must not be empty"));
        }
        let len = value.chars().count();
        if len > self.max_text_length {
            return Err(invalid(
                field,
                format!("is {} characters (max {})", len, self.max_text_length),
            ));
        }
        if value.chars().any(char::is_control) {
            return Err(invalid(field, "must not contain control characters"));
        }
        Ok(())
    }

    /// Account identifiers: non-empty, bounded, no whitespace or control
    /// characters.
    pub fn check_identifier(&self, field: &'static str, value: &str) -> Result<(), RegistryError> {
        if value.is_empty() {
            return Err(invalid(field, "must not be empty"));
        }
        let len = value.chars().count();
        if len > self.max_identifier_length {
            return Err(invalid(
                field,
                format!("is {} characters (max {})", len, self.max_identifier_length),
            ));
        }
        if value
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(invalid(
                field,
                "must not contain whitespace or control characters",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> RegistryError {
    RegistryError::InvalidInput {
        field,
        reason: reason.into(),
    }
}
