//! Purpose: Lifecycle states emitted by every remote operation.
//! Exports: `ResourceState`, `Failure`, `FailureKind`, fallback message constants.
//! Role: The only vocabulary consumers use to react to network calls.
//! Invariants: A state is exactly one of Idle/Loading/Success/Failure; no flag combos.
//! Invariants: Failure messages are non-empty and safe to show to users.

use crate::core::error::Error;
use std::fmt;

pub const MSG_BAD_REQUEST: &str = "Bad request";
pub const MSG_UNPROCESSABLE: &str = "Unprocessable entity";
pub const MSG_UNAUTHORIZED: &str = "Unauthorized: Check API key or token";
pub const MSG_FORBIDDEN: &str = "Forbidden: Access denied, Insufficient permissions";
pub const MSG_NOT_FOUND: &str = "Not Found: Resource unavailable";
pub const MSG_SERVER: &str = "Server Error: Try again later";
pub const MSG_GENERIC: &str = "Error: Something went wrong";
pub const MSG_PIPELINE: &str = "Something went wrong in flow";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureKind {
    /// No response was received (connect, timeout, i/o, request construction).
    Transport,
    BadRequest,
    Unprocessable,
    Unauthorized,
    Forbidden,
    NotFound,
    Server,
    /// 2xx whose body was absent or did not match the expected schema.
    Decode,
    /// Any other status code.
    Status(u16),
    /// A local step around the round trip failed (e.g. persisting the session).
    Local,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Failure {
    kind: FailureKind,
    message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            MSG_PIPELINE.to_string()
        } else {
            message
        };
        Self { kind, message }
    }

    pub fn transport(err: &Error) -> Self {
        Self::new(FailureKind::Transport, err.describe())
    }

    pub fn local(err: &Error) -> Self {
        Self::new(FailureKind::Local, err.describe())
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> Option<u16> {
        match self.kind {
            FailureKind::BadRequest => Some(400),
            FailureKind::Unauthorized => Some(401),
            FailureKind::Forbidden => Some(403),
            FailureKind::NotFound => Some(404),
            FailureKind::Unprocessable => Some(422),
            FailureKind::Server => Some(500),
            FailureKind::Status(code) => Some(code),
            FailureKind::Transport | FailureKind::Decode | FailureKind::Local => None,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Failure {}

#[derive(Clone, Debug, PartialEq)]
pub enum ResourceState<T> {
    Idle,
    Loading,
    Success(T),
    Failure(Failure),
}

impl<T> ResourceState<T> {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Failure(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failure(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResourceState<U> {
        match self {
            Self::Idle => ResourceState::Idle,
            Self::Loading => ResourceState::Loading,
            Self::Success(value) => ResourceState::Success(f(value)),
            Self::Failure(failure) => ResourceState::Failure(failure),
        }
    }

    pub fn into_result(self) -> Option<Result<T, Failure>> {
        match self {
            Self::Success(value) => Some(Ok(value)),
            Self::Failure(failure) => Some(Err(failure)),
            Self::Idle | Self::Loading => None,
        }
    }
}

impl<T> From<Result<T, Failure>> for ResourceState<T> {
    fn from(result: Result<T, Failure>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(failure) => Self::Failure(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    #[test]
    fn empty_message_falls_back_to_pipeline_text() {
        let failure = Failure::new(FailureKind::Transport, "  ");
        assert_eq!(failure.message(), MSG_PIPELINE);
    }

    #[test]
    fn transport_failure_uses_error_description() {
        let err = Error::new(ErrorKind::Io).with_message("request failed");
        let failure = Failure::transport(&err);
        assert_eq!(failure.kind(), FailureKind::Transport);
        assert_eq!(failure.message(), "Io: request failed");
        assert_eq!(failure.status(), None);
    }

    #[test]
    fn terminal_states_are_recognized() {
        assert!(!ResourceState::<u8>::Idle.is_terminal());
        assert!(!ResourceState::<u8>::Loading.is_terminal());
        assert!(ResourceState::Success(1u8).is_terminal());
        let failed: ResourceState<u8> =
            ResourceState::Failure(Failure::new(FailureKind::NotFound, MSG_NOT_FOUND));
        assert!(failed.is_terminal());
        assert_eq!(failed.failure().and_then(Failure::status), Some(404));
    }

    #[test]
    fn map_preserves_lifecycle_position() {
        let state = ResourceState::Success(2u32).map(|value| value * 10);
        assert_eq!(state.success(), Some(&20));
        let loading: ResourceState<u32> = ResourceState::<u32>::Loading.map(|value| value + 1);
        assert!(loading.is_loading());
    }
}
