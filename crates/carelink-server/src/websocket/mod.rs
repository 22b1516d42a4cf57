//! WebSocket connection handling.
//!
//! - [`connection`]: per-connection outbound handle
//! - [`dispatch`]: inbound frame handling
//! - [`heartbeat`]: liveness monitoring
//! - [`session`]: lifecycle of one socket from upgrade to cleanup

pub mod connection;
pub mod dispatch;
pub mod heartbeat;
pub mod session;
