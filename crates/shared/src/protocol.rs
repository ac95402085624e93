use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{domain::ComponentKey, error::ApiError};

/// One emission as seen by the rendering/control layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<ComponentKey>,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    pub emitted_at: DateTime<Utc>,
}

/// Allow-listed view of a component, keyed by its identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<ComponentKey>,
    pub kind: String,
    pub state: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ControlMessage {
    Snapshot(ComponentSnapshot),
    Event(EventEnvelope),
    Error(ApiError),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn control_messages_are_tagged() {
        let message = ControlMessage::Error(ApiError::new(ErrorCode::InvalidArgument, "bad"));
        let encoded = serde_json::to_value(&message).expect("encode");
        assert_eq!(
            encoded,
            json!({"type": "error", "payload": {"code": "invalid_argument", "message": "bad"}})
        );
    }

    #[test]
    fn snapshot_key_is_a_plain_number() {
        let snapshot = ComponentSnapshot {
            key: Some(ComponentKey(3)),
            kind: "Component".into(),
            state: json!({"name": "x"}),
        };
        let encoded = serde_json::to_value(&snapshot).expect("encode");
        assert_eq!(encoded["key"], json!(3));

        let decoded: ComponentSnapshot = serde_json::from_value(encoded).expect("decode");
        assert_eq!(decoded.key, Some(ComponentKey(3)));
    }
}
