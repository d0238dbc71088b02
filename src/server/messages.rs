//! Wire messages. One JSON object per line in each direction.
//!
//! Requests carry a `type` tag, a free-form `content` string (action name,
//! destination, chat text) and a `data` object for structured parameters.
//! Responses carry a `type` tag, human-readable `content` and a `data`
//! payload mirroring the service result.

use log::error;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::game::errors::{ErrorKind, GameError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Authenticate,
    Status,
    Chat,
    World,
    Location,
    Player,
    Travel,
    Exercise,
    Collect,
    Perform,
    FinalQuest,
    Inventory,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRequest {
    #[serde(rename = "type")]
    pub kind: RequestType,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub data: Value,
}

impl ClientRequest {
    pub fn new(kind: RequestType, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            data: Value::Null,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn data_u64(&self, key: &str) -> Option<u64> {
        self.data.get(key).and_then(Value::as_u64)
    }

    pub fn data_f64(&self, key: &str) -> Option<f64> {
        self.data.get(key).and_then(Value::as_f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Connected,
    AuthSuccess,
    AuthFailed,
    Response,
    Error,
    Status,
    WorldState,
    WorldGenerating,
    LocationState,
    PlayerState,
    ExerciseState,
    ExerciseComplete,
    SegmentCollected,
    PerformanceResult,
    GameComplete,
    InventoryUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub content: String,
    #[serde(default)]
    pub data: Value,
}

impl ServerMessage {
    pub fn new<T: Serialize>(kind: MessageType, content: impl Into<String>, data: &T) -> Self {
        let data = serde_json::to_value(data).unwrap_or_else(|e| {
            error!("failed to encode {:?} payload: {}", kind, e);
            Value::Null
        });
        Self {
            kind,
            content: content.into(),
            data,
        }
    }

    pub fn connected() -> Self {
        Self::new(
            MessageType::Connected,
            "Connected to Balladeer. Please authenticate.",
            &json!({ "status": "awaiting_auth" }),
        )
    }

    pub fn auth_failed(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(MessageType::AuthFailed, reason.clone(), &json!({ "error": reason }))
    }

    /// Error response with a machine-checkable `code`.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            MessageType::Error,
            message.clone(),
            &json!({ "error": message, "code": kind.code() }),
        )
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::error(ErrorKind::InvalidInput, message)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, MessageType::Error | MessageType::AuthFailed)
    }

    /// The `code` of an error response.
    pub fn error_code(&self) -> Option<&str> {
        self.data.get("code").and_then(Value::as_str)
    }
}

impl From<&GameError> for ServerMessage {
    fn from(err: &GameError) -> Self {
        let mut msg = ServerMessage::error(err.kind(), err.to_string());
        if let (Some(remaining), Value::Object(map)) = (err.remaining_seconds(), &mut msg.data) {
            map.insert("remaining_seconds".into(), json!(remaining));
        }
        msg
    }
}

/// Encode one outgoing line, newline included.
pub fn encode_line(msg: &ServerMessage) -> String {
    match serde_json::to_string(msg) {
        Ok(mut line) => {
            line.push('\n');
            line
        }
        Err(e) => {
            error!("failed to encode response: {}", e);
            "{\"type\":\"error\",\"content\":\"internal error\",\"data\":{\"error\":\"internal error\",\"code\":\"storage\"}}\n".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_request_types_still_parse() {
        let req: ClientRequest = serde_json::from_str(r#"{"type":"dance"}"#).expect("parse");
        assert_eq!(req.kind, RequestType::Unknown);
        assert_eq!(req.content, "");

        let req: ClientRequest =
            serde_json::from_str(r#"{"type":"collect","data":{"segment_id":7}}"#).expect("parse");
        assert_eq!(req.kind, RequestType::Collect);
        assert_eq!(req.data_u64("segment_id"), Some(7));
        assert_eq!(req.data_str("segment_id"), None);
    }

    #[test]
    fn not_yet_complete_carries_remaining_seconds() {
        let msg = ServerMessage::from(&GameError::ExerciseNotYetComplete {
            remaining_seconds: 42.0,
        });
        assert_eq!(msg.kind, MessageType::Error);
        assert_eq!(msg.error_code(), Some("invalid_state"));
        assert_eq!(msg.data["remaining_seconds"], 42.0);

        let msg = ServerMessage::from(&GameError::PlayerNotFound("p".into()));
        assert_eq!(msg.error_code(), Some("not_found"));
        assert!(msg.data.get("remaining_seconds").is_none());
    }

    #[test]
    fn lines_end_with_newline() {
        let line = encode_line(&ServerMessage::connected());
        assert!(line.ends_with('\n'));
        let back: ServerMessage = serde_json::from_str(line.trim_end()).expect("parse");
        assert_eq!(back.kind, MessageType::Connected);
    }
}
