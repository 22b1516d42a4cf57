//! Heartbeat liveness monitoring.
//!
//! The writer task sends the pings; this loop only watches the alive flag
//! that inbound pongs (and any other inbound frame) set.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use super::connection::ConnectionHandle;

/// Ping cadence and the silence tolerated before a connection is dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Time between pings and liveness checks.
    pub interval: Duration,
    /// Silence after which the connection is considered dead.
    pub timeout: Duration,
}

impl HeartbeatConfig {
    /// Consecutive silent intervals tolerated (at least 1).
    pub fn max_missed(&self) -> u32 {
        let interval = self.interval.as_millis().max(1);
        u32::try_from(self.timeout.as_millis() / interval)
            .unwrap_or(u32::MAX)
            .max(1)
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(90),
        }
    }
}

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The peer stopped responding within the timeout window.
    TimedOut,
    /// The connection was closed for another reason.
    Closed,
}

/// Watch a connection until it times out or is closed.
///
/// On timeout the handle is closed, which ends the session's read loop and
/// runs the normal cleanup path.
pub async fn run_heartbeat(
    connection: Arc<ConnectionHandle>,
    config: HeartbeatConfig,
) -> HeartbeatResult {
    let mut check_interval = time::interval(config.interval);
    // The first tick fires immediately
    let _ = check_interval.tick().await;
    let max_missed = config.max_missed();
    let mut missed: u32 = 0;

    loop {
        tokio::select! {
            _ = check_interval.tick() => {
                if connection.check_alive() {
                    missed = 0;
                } else {
                    missed += 1;
                    if missed >= max_missed {
                        connection.close();
                        return HeartbeatResult::TimedOut;
                    }
                }
            }
            () = connection.closed() => {
                return HeartbeatResult::Closed;
            }
        }
    }
}
