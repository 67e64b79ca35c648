//! Wire schema for the capture/render boundary
//!
//! Commands travel as `{ "name": ..., "args": [...] }` and are answered with
//! `{ "data": ... }` or `{ "error": "..." }`. Events are pushed as
//! `{ "type": ..., "data": ... }`. Everything is validated here, at the edge;
//! nothing past this module handles untyped JSON.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BridgeError;
use crate::tracking::FacialFeatureFrame;

/// A command invocation as it crosses the link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// The answer to a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandReply {
    Error { error: String },
    Data { data: Value },
}

impl CommandReply {
    pub fn data<T: Serialize>(payload: &T) -> Self {
        match serde_json::to_value(payload) {
            Ok(data) => Self::Data { data },
            Err(e) => Self::error(format!("Failed to encode reply: {}", e)),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Error { error } => serde_json::json!({ "error": error }),
            Self::Data { data } => serde_json::json!({ "data": data }),
        }
    }
}

/// Unsolicited event pushed from the capture side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BridgeEvent {
    #[serde(rename = "faceTracking")]
    FaceTracking(FacialFeatureFrame),
}

impl BridgeEvent {
    /// Decode an event, returning `None` for unknown types or bad payloads
    pub fn decode(text: &str) -> Option<Self> {
        match serde_json::from_str::<Self>(text) {
            Ok(BridgeEvent::FaceTracking(frame)) if !frame.is_in_range() => {
                tracing::trace!("Dropping event with non-finite or out-of-range values");
                None
            }
            Ok(event) => Some(event),
            Err(e) => {
                tracing::trace!("Dropping unrecognized bridge event: {}", e);
                None
            }
        }
    }

    pub fn encode(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

/// Anything that can travel over the link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BridgeMessage {
    Command(CommandRequest),
    Event(BridgeEvent),
}

/// The fixed command surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartFaceTracking,
    StopFaceTracking,
    IsFaceTrackingAvailable,
    GetFaceTrackingStatus,
}

impl Command {
    pub const ALL: [Command; 4] = [
        Self::StartFaceTracking,
        Self::StopFaceTracking,
        Self::IsFaceTrackingAvailable,
        Self::GetFaceTrackingStatus,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::StartFaceTracking => "StartFaceTracking",
            Self::StopFaceTracking => "StopFaceTracking",
            Self::IsFaceTrackingAvailable => "IsFaceTrackingAvailable",
            Self::GetFaceTrackingStatus => "GetFaceTrackingStatus",
        }
    }

    /// Validate a request against the command table. None of the commands
    /// take arguments.
    pub fn from_request(request: &CommandRequest) -> Result<Self, String> {
        let command = Self::ALL
            .into_iter()
            .find(|c| c.name() == request.name)
            .ok_or_else(|| format!("Unknown command: '{}'", request.name))?;

        if !request.args.is_empty() {
            return Err(format!(
                "Command '{}' takes no arguments, got {}",
                request.name,
                request.args.len()
            ));
        }

        Ok(command)
    }

    pub fn to_request(&self) -> CommandRequest {
        CommandRequest {
            name: self.name().to_string(),
            args: Vec::new(),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// `StartFaceTracking` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// `StopFaceTracking` payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StopResponse {}

/// `IsFaceTrackingAvailable` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub available: bool,
}

/// `GetFaceTrackingStatus` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub is_tracking: bool,
}

/// Validate a raw reply and decode its payload.
///
/// A reply whose `error` field (top level, or inside `data`) is a string is
/// a logical failure even though the transport succeeded.
pub fn decode_reply<T: DeserializeOwned>(command: Command, reply: Value) -> Result<T, BridgeError> {
    let format_error = |message: String| BridgeError::DataFormat {
        command: command.name().to_string(),
        message,
    };

    let Value::Object(mut fields) = reply else {
        return Err(format_error("reply is not an object".to_string()));
    };

    if let Some(Value::String(message)) = fields.get("error") {
        return Err(BridgeError::Rejected {
            command: command.name().to_string(),
            message: message.clone(),
        });
    }

    let data = fields
        .remove("data")
        .ok_or_else(|| format_error("reply has neither 'data' nor 'error'".to_string()))?;

    if let Some(Value::String(message)) = data.get("error") {
        return Err(BridgeError::Rejected {
            command: command.name().to_string(),
            message: message.clone(),
        });
    }

    serde_json::from_value(data).map_err(|e| format_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_table() {
        for command in Command::ALL {
            let parsed = Command::from_request(&command.to_request()).unwrap();
            assert_eq!(parsed, command);
        }
    }

    #[test]
    fn test_unknown_command_rejected() {
        let req = CommandRequest {
            name: "SelfDestruct".into(),
            args: vec![],
        };
        assert!(Command::from_request(&req).unwrap_err().contains("Unknown command"));
    }

    #[test]
    fn test_unexpected_args_rejected() {
        let req = CommandRequest {
            name: "StopFaceTracking".into(),
            args: vec![json!(1)],
        };
        assert!(Command::from_request(&req).is_err());
    }

    #[test]
    fn test_request_without_args_field() {
        let req: CommandRequest = serde_json::from_value(json!({ "name": "GetFaceTrackingStatus" })).unwrap();
        assert_eq!(Command::from_request(&req).unwrap(), Command::GetFaceTrackingStatus);
    }

    #[test]
    fn test_decode_status_reply() {
        let reply = json!({ "data": { "isTracking": true } });
        let status: StatusResponse = decode_reply(Command::GetFaceTrackingStatus, reply).unwrap();
        assert!(status.is_tracking);
    }

    #[test]
    fn test_top_level_error_is_rejection() {
        let reply = json!({ "error": "no camera" });
        let err = decode_reply::<StatusResponse>(Command::GetFaceTrackingStatus, reply).unwrap_err();
        assert!(matches!(err, BridgeError::Rejected { .. }));
    }

    #[test]
    fn test_error_inside_data_is_rejection() {
        let reply = json!({ "data": { "success": false, "error": "Camera permission denied" } });
        let err = decode_reply::<StartResponse>(Command::StartFaceTracking, reply).unwrap_err();
        assert_eq!(
            err,
            BridgeError::Rejected {
                command: "StartFaceTracking".into(),
                message: "Camera permission denied".into()
            }
        );
    }

    #[test]
    fn test_null_error_is_not_rejection() {
        let reply = json!({ "data": { "success": true, "error": null } });
        let start: StartResponse = decode_reply(Command::StartFaceTracking, reply).unwrap();
        assert!(start.success);
    }

    #[test]
    fn test_schema_mismatch_is_data_format() {
        let reply = json!({ "data": { "available": "yes" } });
        let err = decode_reply::<AvailabilityResponse>(Command::IsFaceTrackingAvailable, reply).unwrap_err();
        assert!(matches!(err, BridgeError::DataFormat { .. }));

        let err = decode_reply::<StopResponse>(Command::StopFaceTracking, json!([1, 2])).unwrap_err();
        assert!(matches!(err, BridgeError::DataFormat { .. }));
    }

    #[test]
    fn test_event_wire_shape() {
        let event = BridgeEvent::FaceTracking(FacialFeatureFrame::neutral());
        let value: Value = serde_json::from_str(&event.encode().unwrap()).unwrap();
        assert_eq!(value["type"], "faceTracking");
        assert_eq!(value["data"]["eyeOpenL"], 1.0);
    }

    #[test]
    fn test_event_decode_drops_garbage() {
        assert!(BridgeEvent::decode("{not json").is_none());
        assert!(BridgeEvent::decode(r#"{"type":"unknown","data":{}}"#).is_none());
        assert!(BridgeEvent::decode(r#"{"type":"faceTracking","data":{"mouthOpen":1}}"#).is_none());
        assert!(BridgeEvent::decode(r#"{"type":"faceTracking"}"#).is_none());
    }

    #[test]
    fn test_event_decode_drops_out_of_range_values() {
        let frame = |key: &str, value: f32| {
            let mut data = serde_json::to_value(FacialFeatureFrame::neutral()).unwrap();
            data[key] = json!(value);
            json!({ "type": "faceTracking", "data": data }).to_string()
        };

        assert!(BridgeEvent::decode(&frame("eyeOpenL", 7.0)).is_none());
        assert!(BridgeEvent::decode(&frame("mouthOpen", 5.0)).is_none());
        assert!(BridgeEvent::decode(&frame("mouthOpen", -0.1)).is_none());
        assert!(BridgeEvent::decode(&frame("eyeBallX", 40.0)).is_none());
        assert!(BridgeEvent::decode(&frame("browR", -1.5)).is_none());

        // Bounds are inclusive and angles are not range checked
        assert!(BridgeEvent::decode(&frame("eyeBallY", -1.0)).is_some());
        assert!(BridgeEvent::decode(&frame("mouthOpen", 1.0)).is_some());
        assert!(BridgeEvent::decode(&frame("angleX", 75.0)).is_some());
    }

    #[test]
    fn test_message_discriminates_commands_and_events() {
        let cmd: BridgeMessage = serde_json::from_value(json!({ "name": "StopFaceTracking", "args": [] })).unwrap();
        assert!(matches!(cmd, BridgeMessage::Command(_)));

        let frame = serde_json::to_value(FacialFeatureFrame::neutral()).unwrap();
        let event: BridgeMessage = serde_json::from_value(json!({ "type": "faceTracking", "data": frame })).unwrap();
        assert!(matches!(event, BridgeMessage::Event(BridgeEvent::FaceTracking(_))));
    }
}
