//! The WS wire protocol: `{"type": <cmd>, "id": <uuid>, ...payload}` in,
//! `response.ok`/`response.error`/unsolicited broadcasts out (spec.md §6).

use kernel_core::{KernelEvent, WireError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A decoded client frame. `payload` holds every field besides `type`/`id`,
/// re-parsed per command inside the dispatcher rather than modeled as one
/// giant enum — command payload shapes don't share a family.
#[derive(Debug, Clone, Deserialize)]
pub struct KernelCommand {
    #[serde(rename = "type")]
    pub command_type: String,
    pub id: String,
    #[serde(flatten)]
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseOk {
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    pub id: String,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseError {
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    pub id: String,
    pub error: WireError,
}

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastFrame {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    #[serde(rename = "__eventId")]
    pub event_id: u64,
    pub data: Value,
}

pub fn response_ok(id: String, data: Value) -> ResponseOk {
    ResponseOk { frame_type: "response.ok", id, data }
}

pub fn response_error(id: String, error: WireError) -> ResponseError {
    ResponseError { frame_type: "response.error", id, error }
}

/// Re-derives the broadcast frame from a bus event: `KernelEvent` is
/// `#[serde(tag = "type", content = "data")]`, so serializing it and
/// lifting out `data` gives exactly the payload clients expect next to
/// the curated dotted wire name.
pub fn broadcast_frame(event_id: u64, event: &KernelEvent) -> BroadcastFrame {
    let data = serde_json::to_value(event)
        .ok()
        .and_then(|v| v.get("data").cloned())
        .unwrap_or(Value::Null);
    BroadcastFrame { event_type: event.wire_name(), event_id, data }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_core::Pid;

    #[test]
    fn command_frame_decodes_type_and_id_and_flattens_the_rest() {
        let raw = r#"{"type": "process.spawn", "id": "abc-1", "goal": "write a file"}"#;
        let command: KernelCommand = serde_json::from_str(raw).unwrap();
        assert_eq!(command.command_type, "process.spawn");
        assert_eq!(command.id, "abc-1");
        assert_eq!(command.payload["goal"], Value::String("write a file".to_string()));
    }

    #[test]
    fn response_ok_carries_the_request_id() {
        let ok = response_ok("abc-1".to_string(), serde_json::json!({ "pid": 7 }));
        let encoded = serde_json::to_value(&ok).unwrap();
        assert_eq!(encoded["type"], "response.ok");
        assert_eq!(encoded["id"], "abc-1");
        assert_eq!(encoded["data"]["pid"], 7);
    }

    #[test]
    fn broadcast_frame_lifts_the_event_payload_out_of_its_tag_envelope() {
        let event = KernelEvent::ProcessExit { pid: Pid(9), exit_code: 0 };
        let frame = broadcast_frame(42, &event);
        assert_eq!(frame.event_type, "process.exit");
        assert_eq!(frame.event_id, 42);
        assert_eq!(frame.data["pid"], 9);
        assert_eq!(frame.data["exit_code"], 0);
    }
}
