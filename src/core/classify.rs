//! Purpose: Translate HTTP status codes and error bodies into `Failure` values.
//! Exports: `classify_status`, `extract_error_message`, `ErrorBody`.
//! Role: Single translation point from raw responses to user-facing failures.
//! Invariants: Status mapping is total and deterministic.
//! Invariants: Error bodies are parsed against explicit schemas, in a fixed order.

use crate::core::state::{
    Failure, FailureKind, MSG_BAD_REQUEST, MSG_FORBIDDEN, MSG_GENERIC, MSG_NOT_FOUND,
    MSG_SERVER, MSG_UNAUTHORIZED, MSG_UNPROCESSABLE,
};
use serde::Deserialize;
use serde::de::IgnoredAny;

/// Result of looking for a structured message in a 400/422 body.
#[derive(Debug, Eq, PartialEq)]
pub enum ErrorBody {
    Extracted(String),
    /// Valid JSON, but neither known `detail` shape.
    NoDetail,
    /// Not JSON at all.
    Unreadable(String),
}

// {"detail": {"message": "...", "status_code": 400, "success": false}}
#[derive(Deserialize)]
struct DetailObjectBody {
    detail: DetailObject,
}

#[derive(Deserialize)]
struct DetailObject {
    message: String,
}

// {"detail": [{"msg": "...", ...}, ...]}
#[derive(Deserialize)]
struct DetailListBody {
    detail: Vec<DetailItem>,
}

#[derive(Deserialize)]
struct DetailItem {
    #[serde(default)]
    msg: Option<String>,
}

pub fn extract_error_message(body: &str) -> ErrorBody {
    if let Ok(parsed) = serde_json::from_str::<DetailObjectBody>(body) {
        if !parsed.detail.message.trim().is_empty() {
            return ErrorBody::Extracted(parsed.detail.message);
        }
    }
    if let Ok(parsed) = serde_json::from_str::<DetailListBody>(body) {
        let first = parsed
            .detail
            .into_iter()
            .filter_map(|item| item.msg)
            .find(|msg| !msg.trim().is_empty());
        if let Some(msg) = first {
            return ErrorBody::Extracted(msg);
        }
    }
    match serde_json::from_str::<IgnoredAny>(body) {
        Ok(_) => ErrorBody::NoDetail,
        Err(err) => ErrorBody::Unreadable(err.to_string()),
    }
}

pub fn classify_status(status: u16, body: &str) -> Failure {
    match status {
        400 => with_detail(FailureKind::BadRequest, status, body, MSG_BAD_REQUEST),
        422 => with_detail(FailureKind::Unprocessable, status, body, MSG_UNPROCESSABLE),
        401 => Failure::new(FailureKind::Unauthorized, MSG_UNAUTHORIZED),
        403 => Failure::new(FailureKind::Forbidden, MSG_FORBIDDEN),
        404 => Failure::new(FailureKind::NotFound, MSG_NOT_FOUND),
        500 => Failure::new(FailureKind::Server, MSG_SERVER),
        other => Failure::new(FailureKind::Status(other), MSG_GENERIC),
    }
}

fn with_detail(kind: FailureKind, status: u16, body: &str, fallback: &str) -> Failure {
    match extract_error_message(body) {
        ErrorBody::Extracted(message) => Failure::new(kind, message),
        ErrorBody::NoDetail => Failure::new(kind, fallback),
        ErrorBody::Unreadable(reason) => {
            tracing::warn!(status, %reason, "error body is not json; using fallback message");
            Failure::new(kind, fallback)
        }
    }
}
