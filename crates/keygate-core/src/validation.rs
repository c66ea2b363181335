//! Field-level validation for typed request payloads.
//!
//! Every request type implements [`Validate`] by hand; there is no runtime
//! type inspection. Failures are collected, not short-circuited, so a caller
//! sees every rejected field at once.

use serde::Serialize;

/// Minimum accepted password length, in characters.
pub const PASSWORD_MIN_CHARS: usize = 8;
/// Maximum accepted password length, in characters.
pub const PASSWORD_MAX_CHARS: usize = 72;

/// A single rejected field and the rule it broke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub rule: &'static str,
}

impl FieldError {
    pub fn new(field: &'static str, rule: &'static str) -> Self {
        Self { field, rule }
    }
}

/// Implemented by every request payload accepted by the core services.
pub trait Validate {
    /// Returns every field that fails its rules; empty when the payload is valid.
    fn field_errors(&self) -> Vec<FieldError>;

    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let errors = self.field_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Accumulates field failures while a payload is checked.
#[derive(Debug, Default)]
pub struct FieldChecks {
    errors: Vec<FieldError>,
}

impl FieldChecks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, field: &'static str, value: &str) -> Self {
        if value.trim().is_empty() {
            self.errors.push(FieldError::new(field, "required"));
        }
        self
    }

    /// E.164: a leading `+`, then 7 to 15 digits with no leading zero.
    pub fn e164(mut self, field: &'static str, value: &str) -> Self {
        if value.is_empty() {
            self.errors.push(FieldError::new(field, "required"));
        } else if !is_e164(value) {
            self.errors.push(FieldError::new(field, "e164"));
        }
        self
    }

    pub fn length(mut self, field: &'static str, value: &str, min: usize, max: usize) -> Self {
        let chars = value.chars().count();
        if chars == 0 {
            self.errors.push(FieldError::new(field, "required"));
        } else if chars < min {
            self.errors.push(FieldError::new(field, "min"));
        } else if chars > max {
            self.errors.push(FieldError::new(field, "max"));
        }
        self
    }

    pub fn password(self, field: &'static str, value: &str) -> Self {
        self.length(field, value, PASSWORD_MIN_CHARS, PASSWORD_MAX_CHARS)
    }

    pub fn finish(self) -> Vec<FieldError> {
        self.errors
    }
}

pub fn is_e164(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('+') else {
        return false;
    };
    (7..=15).contains(&digits.len())
        && digits.bytes().all(|b| b.is_ascii_digit())
        && !digits.starts_with('0')
}
