//! Line-delimited JSON messages exchanged with mpv's `--input-ipc-server` socket.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::PlayerError;

/// One outgoing command line.
#[derive(Serialize, Debug, Clone)]
pub struct MpvRequest {
    pub command: Vec<Value>,
    pub request_id: u64,
}

impl MpvRequest {
    /// Serializes the request followed by the newline mpv expects.
    pub fn to_line(&self) -> Result<String, PlayerError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Short name used in logs and errors, e.g. `set_property pause`.
    pub fn describe(&self) -> String {
        describe_command(&self.command)
    }
}

pub fn describe_command(command: &[Value]) -> String {
    command
        .iter()
        .take(2)
        .map(|part| match part {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Deserialize, Debug)]
struct RawMessage {
    #[serde(default)]
    request_id: Option<u64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// A parsed inbound line: either the reply to a request or an asynchronous event.
#[derive(Debug, Clone, PartialEq)]
pub enum MpvMessage {
    Reply {
        request_id: u64,
        result: Result<Value, String>,
    },
    PropertyChange {
        name: String,
        value: Value,
    },
    Event {
        event: String,
    },
}

impl MpvMessage {
    pub fn parse(line: &str) -> Result<Self, PlayerError> {
        let raw: RawMessage = serde_json::from_str(line)?;

        if let Some(request_id) = raw.request_id {
            let result = match raw.error.as_deref() {
                Some("success") | None => Ok(raw.data.unwrap_or(Value::Null)),
                Some(reason) => Err(reason.to_string()),
            };
            return Ok(MpvMessage::Reply { request_id, result });
        }

        match raw.event {
            Some(event) if event == "property-change" => {
                let name = raw
                    .name
                    .ok_or_else(|| PlayerError::Protocol("property-change without name".to_string()))?;
                Ok(MpvMessage::PropertyChange {
                    name,
                    value: raw.data.unwrap_or(Value::Null),
                })
            }
            Some(event) => Ok(MpvMessage::Event { event }),
            None => Err(PlayerError::Protocol(format!("unrecognized message: {}", line))),
        }
    }
}

/// Reads an mpv track-id property. mpv reports a disabled track as `false` or `"no"`.
pub fn track_id_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
