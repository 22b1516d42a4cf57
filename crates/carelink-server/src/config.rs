//! Server configuration.

use std::time::Duration;

use carelink_auth::AccessPolicy;
use carelink_settings::CarelinkSettings;
use serde::{Deserialize, Serialize};

use crate::websocket::heartbeat::HeartbeatConfig;

/// Configuration for the carelink server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Outbound frames buffered per connection.
    pub send_queue_capacity: usize,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Silence in seconds before a connection is dropped.
    pub heartbeat_timeout_secs: u64,
    /// Allowed CORS origins; `"*"` allows any.
    pub cors_origins: Vec<String>,
    /// Seconds to wait for sessions during shutdown.
    pub shutdown_timeout_secs: u64,
    /// Refuse inactive accounts.
    pub require_active: bool,
}

impl ServerConfig {
    /// Ping cadence and timeout.
    ///
    /// The interval is at least one second and the timeout at least one
    /// interval, since a zero period would stall the ping timer.
    pub fn heartbeat(&self) -> HeartbeatConfig {
        let interval_secs = self.heartbeat_interval_secs.max(1);
        HeartbeatConfig {
            interval: Duration::from_secs(interval_secs),
            timeout: Duration::from_secs(self.heartbeat_timeout_secs.max(interval_secs)),
        }
    }

    /// Per-connection send queue size, at least 1.
    pub fn send_queue_capacity(&self) -> usize {
        self.send_queue_capacity.max(1)
    }

    /// Account-state policy for resolved identities.
    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy {
            require_active: self.require_active,
        }
    }

    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 1000,
            send_queue_capacity: 256,
            max_message_size: 64 * 1024,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            cors_origins: vec!["*".into()],
            shutdown_timeout_secs: 10,
            require_active: true,
        }
    }
}

impl From<&CarelinkSettings> for ServerConfig {
    fn from(settings: &CarelinkSettings) -> Self {
        let s = &settings.server;
        Self {
            host: s.host.clone(),
            port: s.port,
            max_connections: s.max_connections,
            send_queue_capacity: s.send_queue_capacity,
            max_message_size: s.max_message_size,
            heartbeat_interval_secs: s.heartbeat_interval_secs,
            heartbeat_timeout_secs: s.heartbeat_timeout_secs,
            cors_origins: s.cors_origins.clone(),
            shutdown_timeout_secs: s.shutdown_timeout_secs,
            require_active: settings.auth.require_active,
        }
    }
}
