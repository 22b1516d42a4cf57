//! Wire frames.
//!
//! Inbound text is decoded in two steps: parse as JSON, then validate the
//! required fields for the frame's `type`. Outbound frames are a closed
//! tagged enum serialized with `type` as the discriminator.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::FrameError;

/// `message` frame type.
pub const TYPE_MESSAGE: &str = "message";
/// `connect_patient` frame type.
pub const TYPE_CONNECT_PATIENT: &str = "connect_patient";

/// Error text sent when a message could not be routed to its receiver.
pub const ERR_DELIVERY: &str = "Could not deliver message";
/// Error text sent when an inbound frame is not valid JSON.
pub const ERR_INVALID_FORMAT: &str = "Invalid message format";
/// Error text sent when a pairing request names an unavailable patient.
pub const ERR_PAIRING: &str = "Could not connect to patient";

/// A validated inbound frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundFrame {
    /// Relay `content` to the paired peer `receiver_id`.
    Message {
        /// Peer's raw account id.
        receiver_id: i64,
        /// Non-empty text payload.
        content: String,
    },
    /// Responder asks to pair with a seeker.
    ConnectPatient {
        /// Seeker's raw account id.
        patient_id: i64,
    },
}

impl InboundFrame {
    /// The frame's wire `type`.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Message { .. } => TYPE_MESSAGE,
            Self::ConnectPatient { .. } => TYPE_CONNECT_PATIENT,
        }
    }
}

/// Decode one inbound text frame.
///
/// Ids must be JSON integers and `content` a non-empty string; anything else
/// counts as a missing field.
pub fn decode_inbound(text: &str) -> Result<InboundFrame, FrameError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(obj) = value else {
        return Err(FrameError::Malformed(format!(
            "expected an object, got {}",
            json_kind(&value)
        )));
    };

    match obj.get("type").and_then(Value::as_str) {
        Some(TYPE_MESSAGE) => {
            let receiver_id = int_field(&obj, TYPE_MESSAGE, "receiver_id")?;
            let content = obj
                .get("content")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .ok_or(FrameError::MissingField {
                    frame_type: TYPE_MESSAGE,
                    field: "content",
                })?;
            Ok(InboundFrame::Message {
                receiver_id,
                content: content.to_owned(),
            })
        }
        Some(TYPE_CONNECT_PATIENT) => Ok(InboundFrame::ConnectPatient {
            patient_id: int_field(&obj, TYPE_CONNECT_PATIENT, "patient_id")?,
        }),
        Some(other) => Err(FrameError::UnknownType(other.to_owned())),
        None => Err(FrameError::UnknownType(String::new())),
    }
}

fn int_field(
    obj: &Map<String, Value>,
    frame_type: &'static str,
    field: &'static str,
) -> Result<i64, FrameError> {
    obj.get(field)
        .and_then(Value::as_i64)
        .ok_or(FrameError::MissingField { frame_type, field })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A frame sent to a participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// A seeker became reachable. Sent to every responder.
    NewPatient {
        /// The seeker's id.
        patient_id: i64,
    },
    /// A pairing was created. Carries the counterpart's id only.
    SessionStarted {
        /// Set on the seeker's copy.
        #[serde(skip_serializing_if = "Option::is_none")]
        psychologist_id: Option<i64>,
        /// Set on the responder's copy.
        #[serde(skip_serializing_if = "Option::is_none")]
        patient_id: Option<i64>,
    },
    /// A relayed message.
    Message {
        /// The sender's id.
        sender_id: i64,
        /// The text payload.
        content: String,
        /// Whether the sender is a responder.
        is_psychologist: bool,
    },
    /// An error report for the recipient's last frame.
    Error {
        /// Human-readable description.
        message: String,
    },
}

impl OutboundFrame {
    /// `session_started` for the seeker side.
    #[must_use]
    pub const fn session_started_for_seeker(psychologist_id: i64) -> Self {
        Self::SessionStarted {
            psychologist_id: Some(psychologist_id),
            patient_id: None,
        }
    }

    /// `session_started` for the responder side.
    #[must_use]
    pub const fn session_started_for_responder(patient_id: i64) -> Self {
        Self::SessionStarted {
            psychologist_id: None,
            patient_id: Some(patient_id),
        }
    }

    /// An `error` frame.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Wire `type` of this frame, for logs and metrics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::NewPatient { .. } => "new_patient",
            Self::SessionStarted { .. } => "session_started",
            Self::Message { .. } => "message",
            Self::Error { .. } => "error",
        }
    }

    /// Serialize to JSON text.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
