//! Wire envelope for delegate connections.
//!
//! Every frame is a JSON object with a `type` tag. `request_id` pairs a
//! `request` with its eventual `response`; nothing else orders frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity carried on `notification` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// All messages on a delegate connection, both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// Client → gateway, exactly once, first frame: identity assertion.
    Auth { token: String },

    /// Liveness probe. Sent by the gateway on an interval; a client may
    /// also probe the gateway.
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
    },

    /// Liveness answer. `server_time` (unix millis) is set on
    /// gateway-originated pongs.
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        server_time: Option<u64>,
    },

    /// Gateway → client: execute this logical call.
    Request {
        request_id: String,
        endpoint: String,
        params: Vec<(String, String)>,
    },

    /// Client → gateway: outcome of a delegated call.
    Response {
        request_id: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Protocol-level failure notice.
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<u16>,
    },

    /// Gateway → client, fire-and-forget.
    Notification {
        message: String,
        level: NotificationLevel,
    },
}

impl WireMessage {
    /// Serialize to the JSON text carried in one frame.
    pub fn to_json(&self) -> String {
        // The envelope contains only serializable fields; this cannot fail.
        serde_json::to_string(self).expect("wire message serializes")
    }

    /// Parse one frame's JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_roundtrip_preserves_param_order() {
        let msg = WireMessage::Request {
            request_id: "7".into(),
            endpoint: "feed".into(),
            params: vec![("count".into(), "10".into()), ("start".into(), "0".into())],
        };
        let parsed = WireMessage::from_json(&msg.to_json()).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn tagged_envelope_shape() {
        let json = WireMessage::Auth { token: "tok-1".into() }.to_json();
        assert_eq!(json, r#"{"type":"auth","token":"tok-1"}"#);

        let json = WireMessage::Ping { id: None }.to_json();
        assert_eq!(json, r#"{"type":"ping"}"#);
    }

    #[test]
    fn response_parses_with_optional_fields_absent() {
        let parsed =
            WireMessage::from_json(r#"{"type":"response","request_id":"3","success":false}"#)
                .unwrap();
        match parsed {
            WireMessage::Response { request_id, success, payload, error } => {
                assert_eq!(request_id, "3");
                assert!(!success);
                assert!(payload.is_none());
                assert!(error.is_none());
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(WireMessage::from_json(r#"{"type":"frobnicate"}"#).is_err());
    }

    #[test]
    fn notification_levels_serialize_lowercase() {
        let json = WireMessage::Notification {
            message: "session expiring".into(),
            level: NotificationLevel::Warning,
        }
        .to_json();
        assert!(json.contains(r#""level":"warning""#));
    }
}
