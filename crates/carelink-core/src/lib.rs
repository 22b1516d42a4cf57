//! # carelink-core
//!
//! Shared vocabulary for the carelink pairing server:
//!
//! - **Participant ids**: `SeekerId`, `ResponderId` as integer newtypes so a
//!   patient id can never be passed where a psychologist id is expected
//! - **Connection ids**: `ConnectionId`, one per physical socket
//! - **Identity**: what the identity provider vouches for, and the
//!   `Participant` a connection becomes once authorized
//! - **Frames**: closed inbound/outbound frame types with explicit
//!   required-field validation
//! - **Errors**: `FrameError` via `thiserror`

#![deny(unsafe_code)]

pub mod errors;
pub mod frames;
pub mod identity;
pub mod ids;

pub use errors::FrameError;
pub use frames::{InboundFrame, OutboundFrame, decode_inbound};
pub use identity::{Identity, Participant, Role};
pub use ids::{ConnectionId, ResponderId, SeekerId};
