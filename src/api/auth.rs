//! Purpose: Sign-in, sign-up and access-code reset endpoints.
//! Exports: `AuthApi`, `LoginRequest`, `RegisterRequest`, `RegisterData`,
//!   `RequestCodeResetRequest`, `CodeResetRequest`.
//! Role: Builds auth resources; writing the session is left to the caller.
//! Invariants: Form constructors validate before any request exists.
#![allow(clippy::result_large_err)]

use super::envelope::{Envelope, NoData};
use super::validation::{
    parse_code, require_non_empty, require_username, validate_age, validate_email,
};
use crate::core::error::Error;
use crate::core::pipeline::{Pipeline, Resource};
use crate::core::session::SessionIdentity;
use crate::core::transport::ApiRequest;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub code: u32,
}

impl LoginRequest {
    pub fn from_form(username: &str, code: &str) -> Result<Self, Error> {
        Ok(Self {
            username: require_username(username)?,
            code: parse_code(code)?,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub location: String,
    pub age: u32,
    pub gender: String,
}

impl RegisterRequest {
    pub fn from_form(
        email: &str,
        username: &str,
        location: &str,
        age: u32,
        gender: &str,
    ) -> Result<Self, Error> {
        Ok(Self {
            email: validate_email(email)?,
            username: require_username(username)?,
            location: location.trim().to_string(),
            age: validate_age(age)?,
            gender: gender.trim().to_string(),
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RegisterData {
    pub id: String,
    pub username: String,
    pub location: String,
    pub age: i32,
    pub gender: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RequestCodeResetRequest {
    pub username: String,
    pub email: String,
}

impl RequestCodeResetRequest {
    pub fn from_form(username: &str, email: &str) -> Result<Self, Error> {
        Ok(Self {
            username: require_username(username)?,
            email: validate_email(email)?,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CodeResetRequest {
    pub new_code: u32,
    pub old_code: u32,
    pub reset_token: String,
}

impl CodeResetRequest {
    pub fn from_form(new_code: &str, old_code: &str, reset_token: &str) -> Result<Self, Error> {
        Ok(Self {
            new_code: parse_code(new_code)?,
            old_code: parse_code(old_code)?,
            reset_token: require_non_empty("Reset token", reset_token)?,
        })
    }
}

#[derive(Clone)]
pub struct AuthApi {
    pipeline: Pipeline,
}

impl AuthApi {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    pub fn sign_in(&self, request: &LoginRequest) -> Resource<Envelope<SessionIdentity>> {
        self.post(&["user", "sign-in"], request)
    }

    pub fn sign_up(&self, request: &RegisterRequest) -> Resource<Envelope<RegisterData>> {
        self.post(&["user", "sign-up"], request)
    }

    pub fn request_code_reset(
        &self,
        request: &RequestCodeResetRequest,
    ) -> Resource<Envelope<NoData>> {
        self.post(&["user", "request-code-reset-token"], request)
    }

    pub fn reset_code(&self, request: &CodeResetRequest) -> Resource<Envelope<NoData>> {
        self.post(&["user", "code-reset"], request)
    }

    fn post<B: Serialize, T>(&self, segments: &[&str], body: &B) -> Resource<T> {
        self.pipeline
            .try_resource(ApiRequest::post(segments).with_json(body))
    }
}
