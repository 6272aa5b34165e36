//! Realtime protocol message types
//!
//! The push channel speaks the Phoenix channel protocol as JSON text
//! frames: `{"topic", "event", "payload", "ref"}`. Row changes arrive as
//! `postgres_changes` events.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::{Task, TaskId};
use crate::store::ChangeEvent;

/// Topic used for heartbeats
pub const PHOENIX_TOPIC: &str = "phoenix";

/// A single protocol frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub msg_ref: Option<String>,
}

impl Frame {
    /// Join a table's change topic
    pub fn join(
        topic: &str,
        schema: &str,
        table: &str,
        access_token: &str,
        msg_ref: &str,
    ) -> Self {
        Frame {
            topic: topic.to_string(),
            event: "phx_join".to_string(),
            payload: json!({
                "config": {
                    "broadcast": { "self": false },
                    "presence": { "key": "" },
                    "postgres_changes": [
                        { "event": "*", "schema": schema, "table": table }
                    ]
                },
                "access_token": access_token
            }),
            msg_ref: Some(msg_ref.to_string()),
        }
    }

    /// Leave a topic
    pub fn leave(topic: &str, msg_ref: &str) -> Self {
        Frame {
            topic: topic.to_string(),
            event: "phx_leave".to_string(),
            payload: json!({}),
            msg_ref: Some(msg_ref.to_string()),
        }
    }

    /// Keep-alive frame
    pub fn heartbeat(msg_ref: &str) -> Self {
        Frame {
            topic: PHOENIX_TOPIC.to_string(),
            event: "heartbeat".to_string(),
            payload: json!({}),
            msg_ref: Some(msg_ref.to_string()),
        }
    }

    /// Encode to a JSON text frame
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Frames the client acts on
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Reply to a client frame (join, heartbeat, leave)
    Reply {
        msg_ref: Option<String>,
        ok: bool,
        response: Value,
    },
    /// A row changed
    Change(ChangeEvent),
    /// The channel crashed on the server
    ChannelError,
    /// The server closed the channel
    ChannelClosed,
    /// Anything else (presence, system notices)
    Other(String),
}

#[derive(Deserialize)]
struct ChangePayload {
    data: ChangeData,
}

#[derive(Deserialize)]
struct ChangeData {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
}

#[derive(Deserialize)]
struct RecordKey {
    id: TaskId,
}

impl ServerEvent {
    /// Decode a text frame
    pub fn decode(text: &str) -> serde_json::Result<Self> {
        let frame: Frame = serde_json::from_str(text)?;

        Ok(match frame.event.as_str() {
            "phx_reply" => ServerEvent::Reply {
                ok: frame.payload.get("status").and_then(Value::as_str) == Some("ok"),
                response: frame.payload.get("response").cloned().unwrap_or(Value::Null),
                msg_ref: frame.msg_ref,
            },
            "postgres_changes" => {
                let payload: ChangePayload = serde_json::from_value(frame.payload)?;
                match decode_change(payload.data)? {
                    Some(change) => ServerEvent::Change(change),
                    None => ServerEvent::Other("postgres_changes".to_string()),
                }
            }
            "phx_error" => ServerEvent::ChannelError,
            "phx_close" => ServerEvent::ChannelClosed,
            other => ServerEvent::Other(other.to_string()),
        })
    }
}

fn decode_change(data: ChangeData) -> serde_json::Result<Option<ChangeEvent>> {
    let change = match data.kind.as_str() {
        "INSERT" => data
            .record
            .map(serde_json::from_value::<Task>)
            .transpose()?
            .map(ChangeEvent::Insert),
        "UPDATE" => data
            .record
            .map(serde_json::from_value::<Task>)
            .transpose()?
            .map(ChangeEvent::Update),
        "DELETE" => data
            .old_record
            .map(serde_json::from_value::<RecordKey>)
            .transpose()?
            .map(|key| ChangeEvent::Delete(key.id)),
        _ => None,
    };
    Ok(change)
}
