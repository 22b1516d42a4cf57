//! Frame decoding errors.

use thiserror::Error;

/// Why an inbound text frame produced no action.
///
/// Only [`FrameError::Malformed`] is reported back to the sender. The other
/// variants describe well-formed input that is dropped silently.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Not a JSON object.
    #[error("malformed frame: {0}")]
    Malformed(String),
    /// A known frame type without one of its required fields.
    #[error("{frame_type} frame missing field {field}")]
    MissingField {
        /// The frame's `type`.
        frame_type: &'static str,
        /// The absent or invalid field.
        field: &'static str,
    },
    /// A `type` this server does not handle (or no `type` at all).
    #[error("unknown frame type: {0}")]
    UnknownType(String),
    /// A frame type the sender's role may not use.
    #[error("{0} frame not permitted for this role")]
    NotPermitted(&'static str),
}

impl FrameError {
    /// Whether the sender should receive an `error` frame.
    #[must_use]
    pub const fn is_reportable(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

impl From<serde_json::Error> for FrameError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
