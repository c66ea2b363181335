//! Typed request payloads accepted by the core services.
//!
//! `Debug` is implemented by hand on every payload that carries a plaintext
//! secret so that logging a request can never leak it.

use std::fmt;

use serde::Deserialize;

use crate::validation::{FieldChecks, FieldError, Validate};

const REDACTED: &str = "<redacted>";

#[derive(Clone, Deserialize)]
pub struct RegisterRequest {
    pub mobile_number: String,
    pub country_code: String,
    pub password: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("mobile_number", &self.mobile_number)
            .field("country_code", &self.country_code)
            .field("password", &REDACTED)
            .finish()
    }
}

impl Validate for RegisterRequest {
    fn field_errors(&self) -> Vec<FieldError> {
        FieldChecks::new()
            .e164("mobile_number", &self.mobile_number)
            .required("country_code", &self.country_code)
            .password("password", &self.password)
            .finish()
    }
}

#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    pub mobile_number: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("mobile_number", &self.mobile_number)
            .field("password", &REDACTED)
            .finish()
    }
}

impl Validate for LoginRequest {
    // No length rules at login: a password set under
    // older rules must still be accepted at login.
    fn field_errors(&self) -> Vec<FieldError> {
        FieldChecks::new()
            .e164("mobile_number", &self.mobile_number)
            .required("password", &self.password)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordRecoveryRequest {
    pub mobile_number: String,
}

impl Validate for PasswordRecoveryRequest {
    fn field_errors(&self) -> Vec<FieldError> {
        FieldChecks::new()
            .e164("mobile_number", &self.mobile_number)
            .finish()
    }
}

#[derive(Clone, Deserialize)]
pub struct ResetPasswordRequest {
    /// The reset ticket delivered out of band.
    pub token: String,
    pub new_password: String,
}

impl fmt::Debug for ResetPasswordRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetPasswordRequest")
            .field("token", &REDACTED)
            .field("new_password", &REDACTED)
            .finish()
    }
}

impl Validate for ResetPasswordRequest {
    fn field_errors(&self) -> Vec<FieldError> {
        FieldChecks::new()
            .required("token", &self.token)
            .password("new_password", &self.new_password)
            .finish()
    }
}
