//! WebSocket wire protocol.
//!
//! Every frame in both directions is a JSON text message with the shape
//! `{"type": string, "data": any}`. The `type` string selects the payload;
//! the payloads the client cares about are typed below.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event-type strings recognized on the wire.
pub mod event_type {
    /// Client → server, carries the bearer token after the transport opens.
    pub const AUTH_REQUEST: &str = "AUTH_REQUEST";
    /// Server → client, acknowledges authentication.
    pub const AUTH_SUCCESS: &str = "AUTH_SUCCESS";
    /// Server → client, authentication was rejected.
    pub const AUTH_ERROR: &str = "AUTH_ERROR";
    /// Client → server, subscribes the session to a set of channels.
    pub const SUBSCRIBE_CHANNELS: &str = "SUBSCRIBE_CHANNELS";
    /// Server → client, a new message was posted to a subscribed channel.
    pub const MESSAGE_CREATE: &str = "MESSAGE_CREATE";
}

/// The `{type, data}` envelope wrapping every WebSocket frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Event-type string, see [`event_type`].
    #[serde(rename = "type")]
    pub event_type: String,
    /// Opaque payload; shape depends on `event_type`.
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }
}

/// Payload of an [`AUTH_REQUEST`](event_type::AUTH_REQUEST) frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    pub token: String,
}

/// Payload of an [`AUTH_SUCCESS`](event_type::AUTH_SUCCESS) frame.
///
/// The server has been observed sending both `user_id` and `userId`
/// spellings; accept either.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSuccess {
    #[serde(alias = "userId")]
    pub user_id: String,
}

/// Payload of an [`AUTH_ERROR`](event_type::AUTH_ERROR) frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthError {
    pub message: String,
}

/// Payload of a [`SUBSCRIBE_CHANNELS`](event_type::SUBSCRIBE_CHANNELS) frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeChannels {
    pub user_id: String,
    pub channel_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_round_trips_type_field() {
        let envelope = Envelope::new(event_type::AUTH_REQUEST, json!({"token": "tok"}));
        let text = serde_json::to_string(&envelope).unwrap();
        assert!(text.contains(r#""type":"AUTH_REQUEST""#));

        let parsed: Envelope = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.event_type, event_type::AUTH_REQUEST);
        assert_eq!(parsed.data["token"], "tok");
    }

    #[test]
    fn envelope_tolerates_missing_data() {
        let parsed: Envelope = serde_json::from_str(r#"{"type":"PING"}"#).unwrap();
        assert_eq!(parsed.event_type, "PING");
        assert!(parsed.data.is_null());
    }

    #[test]
    fn auth_success_accepts_both_user_id_spellings() {
        let snake: AuthSuccess = serde_json::from_value(json!({"user_id": "u1"})).unwrap();
        let camel: AuthSuccess = serde_json::from_value(json!({"userId": "u2"})).unwrap();
        assert_eq!(snake.user_id, "u1");
        assert_eq!(camel.user_id, "u2");
    }
}
