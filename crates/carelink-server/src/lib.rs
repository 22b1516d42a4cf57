//! # carelink-server
//!
//! Axum HTTP + WebSocket server pairing patients with psychologists.
//!
//! - [`registry`]: who is connected and who is paired with whom
//! - [`router`]: message forwarding across pairings
//! - [`websocket`]: per-socket session lifecycle
//! - [`server`]: routes, connection cap, listen and shutdown
//! - [`metrics`]: Prometheus recorder and metric names

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod router;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::ServerError;
pub use registry::{RegistrySnapshot, SessionRegistry};
pub use router::MessageRouter;
pub use server::CarelinkServer;
pub use websocket::connection::ConnectionHandle;
