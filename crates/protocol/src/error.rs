//! Normalized API error body.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The uniform error shape produced from non-2xx REST responses.
///
/// The gateway returns gRPC-style status bodies
/// (`{"code": 16, "message": "...", "details": [...]}`); responses that do
/// not parse as this shape are normalized into one with the raw body as the
/// message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiErrorBody {
    /// Build an error body from a response that did not carry a parseable
    /// status payload.
    pub fn opaque(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            details: None,
        }
    }
}

impl std::fmt::Display for ApiErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {code})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_grpc_status_shape() {
        let body: ApiErrorBody =
            serde_json::from_str(r#"{"code":16,"message":"token expired","details":[]}"#).unwrap();
        assert_eq!(body.code, Some(16));
        assert_eq!(body.message, "token expired");
        assert_eq!(body.to_string(), "token expired (code 16)");
    }

    #[test]
    fn opaque_bodies_have_no_code() {
        let body = ApiErrorBody::opaque("502 Bad Gateway");
        assert_eq!(body.to_string(), "502 Bad Gateway");
    }
}
