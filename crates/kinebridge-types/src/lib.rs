use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// One operation of the rosbridge JSON protocol that this backend emits.
///
/// Serialises with an `"op"` tag, e.g.
/// `{"op":"subscribe","topic":"/sensor_data"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BusOp {
    /// Ask the bus to stream every message on `topic` to this connection.
    Subscribe { topic: String },
    /// Publish `msg` on `topic`.
    Publish { topic: String, msg: Value },
    /// Invoke a remote service with the given arguments.
    CallService { service: String, args: Value },
}

impl BusOp {
    pub fn subscribe(topic: impl Into<String>) -> Self {
        BusOp::Subscribe {
            topic: topic.into(),
        }
    }

    pub fn publish(topic: impl Into<String>, msg: Value) -> Self {
        BusOp::Publish {
            topic: topic.into(),
            msg,
        }
    }

    pub fn call_service(service: impl Into<String>, args: Value) -> Self {
        BusOp::CallService {
            service: service.into(),
            args,
        }
    }

    /// Encode as the JSON text frame sent to the bus.
    pub fn to_frame(&self) -> Result<String, BridgeError> {
        serde_json::to_string(self).map_err(|e| BridgeError::Encode(e.to_string()))
    }
}

/// Wrapper sent to log-stream clients: `{"log": <bus message>}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEnvelope {
    pub log: Value,
}

impl LogEnvelope {
    pub fn wrap(message: Value) -> Self {
        Self { log: message }
    }
}

/// Errors raised while talking to the bus or relaying to a client.
///
/// Every variant is local to one client session; none of them affect other
/// connections.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bus connection to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    #[error("Bus connection closed")]
    Closed,

    #[error("Malformed bus payload: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Bus transport error: {0}")]
    Transport(String),

    #[error("Client send failed: {0}")]
    ClientSend(String),
}

impl BridgeError {
    /// `true` for the closed-connection signal, which some relays treat as
    /// normal termination.
    pub fn is_closed(&self) -> bool {
        matches!(self, BridgeError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscribe_serialises_with_op_tag() {
        let frame = BusOp::subscribe("/sensor_data").to_frame().unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value, json!({"op": "subscribe", "topic": "/sensor_data"}));
    }

    #[test]
    fn publish_carries_msg_object() {
        let op = BusOp::publish(
            "/flexbe/command/transition",
            json!({"outcome": 1, "target": "walk"}),
        );
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["op"], "publish");
        assert_eq!(value["topic"], "/flexbe/command/transition");
        assert_eq!(value["msg"]["target"], "walk");
    }

    #[test]
    fn call_service_uses_snake_case_op() {
        let op = BusOp::call_service("/ik/set_name_and_path", json!({"name": "a", "path": "b"}));
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["op"], "call_service");
        assert_eq!(value["service"], "/ik/set_name_and_path");
        assert_eq!(value["args"]["path"], "b");
    }

    #[test]
    fn log_envelope_wraps_exactly_once() {
        let env = LogEnvelope::wrap(json!({"foo": "bar"}));
        let text = serde_json::to_string(&env).unwrap();
        assert_eq!(text, r#"{"log":{"foo":"bar"}}"#);
    }

    #[test]
    fn bridge_error_display() {
        let err = BridgeError::Connect {
            url: "ws://robot:9090".to_string(),
            reason: "refused".to_string(),
        };
        assert!(err.to_string().contains("ws://robot:9090"));
        assert!(BridgeError::Closed.is_closed());
        assert!(!BridgeError::Decode("x".into()).is_closed());
    }
}
