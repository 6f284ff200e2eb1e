//! Purpose: Uniform response envelope shared by every storefront endpoint.
//! Exports: `Envelope`, `NoData`.
//! Role: Payload type decoded by the resource pipeline on 2xx responses.
//! Invariants: `data` is required unless the payload type is an `Option`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub message: String,
    pub status_code: u16,
    pub success: bool,
    pub data: T,
}

/// Payload of endpoints that answer with `null` or no `data` field.
pub type NoData = Option<Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_data_decodes_as_none() {
        let body = r#"{"message":"Reset token sent","status_code":200,"success":true}"#;
        let envelope: Envelope<NoData> = serde_json::from_str(body).expect("decode");
        assert_eq!(envelope.data, None);
        assert!(envelope.success);
    }

    #[test]
    fn required_data_must_be_present() {
        let body = r#"{"message":"ok","status_code":200,"success":true}"#;
        assert!(serde_json::from_str::<Envelope<Vec<String>>>(body).is_err());
    }
}
