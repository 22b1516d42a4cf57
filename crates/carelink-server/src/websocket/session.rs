//! WebSocket session lifecycle: authenticate, register, route, clean up.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use carelink_auth::{AccessPolicy, AuthError, IdentityResolver, authorize};
use carelink_core::frames::ERR_INVALID_FORMAT;
use carelink_core::{ConnectionId, OutboundFrame, Participant, Role};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, field, info, instrument, warn};

use super::connection::ConnectionHandle;
use super::dispatch::handle_text;
use super::heartbeat::{HeartbeatConfig, HeartbeatResult, run_heartbeat};
use crate::metrics::{
    AUTH_REJECTIONS_TOTAL, WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE,
    WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};
use crate::registry::SessionRegistry;
use crate::router::MessageRouter;

/// How long the writer gets to flush after the read loop ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Everything a session needs beyond its socket.
pub struct SessionContext {
    /// Router over the shared registry.
    pub router: MessageRouter,
    /// Credential verifier.
    pub resolver: Arc<dyn IdentityResolver>,
    /// Account-state policy.
    pub policy: AccessPolicy,
    /// Outbound frames buffered per connection.
    pub send_queue_capacity: usize,
    /// Ping cadence and timeout.
    pub heartbeat: HeartbeatConfig,
    /// Cancelled when the server shuts down.
    pub shutdown: CancellationToken,
}

impl SessionContext {
    fn registry(&self) -> &Arc<SessionRegistry> {
        self.router.registry()
    }
}

/// Removes the participant's registry entry when the session ends, however
/// it ends.
struct DeregisterGuard {
    registry: Arc<SessionRegistry>,
    participant: Participant,
    conn_id: ConnectionId,
}

impl Drop for DeregisterGuard {
    fn drop(&mut self) {
        let _ = self.registry.deregister(self.participant, &self.conn_id);
    }
}

/// Resolve and authorize the connection's credential.
async fn authenticate(
    ctx: &SessionContext,
    role: Role,
    credential: Option<&str>,
) -> Result<Participant, AuthError> {
    let credential = credential
        .filter(|c| !c.is_empty())
        .ok_or(AuthError::MissingCredential)?;
    let identity = ctx.resolver.resolve(credential).await?;
    authorize(&identity, role, ctx.policy)
}

/// Run a WebSocket session for a connection on the `role` endpoint.
///
/// 1. Verifies `credential`; on failure closes with 1008 and returns
/// 2. Registers the participant (announcing new seekers to responders)
/// 3. Dispatches inbound frames and forwards outbound ones via the send queue
/// 4. Pings periodically and drops connections that stop answering
/// 5. Deregisters on exit, whatever the cause
#[instrument(skip_all, fields(role = %role, conn_id = field::Empty, participant = field::Empty))]
pub async fn run_ws_session(
    mut ws: WebSocket,
    role: Role,
    credential: Option<String>,
    ctx: Arc<SessionContext>,
) {
    let conn_id = ConnectionId::new();
    let _ = Span::current().record("conn_id", field::display(&conn_id));

    let participant = match authenticate(&ctx, role, credential.as_deref()).await {
        Ok(p) => p,
        Err(e) => {
            counter!(AUTH_REJECTIONS_TOTAL, "reason" => e.code()).increment(1);
            warn!(error = %e, "rejecting connection");
            let close = CloseFrame {
                code: close_code::POLICY,
                reason: e.close_reason().into(),
            };
            let _ = ws.send(Message::Close(Some(close))).await;
            return;
        }
    };
    let _ = Span::current().record("participant", field::display(participant));

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(ctx.send_queue_capacity);
    let handle = Arc::new(ConnectionHandle::new(conn_id.clone(), send_tx));
    let (mut ws_tx, mut ws_rx) = ws.split();

    let connection_start = Instant::now();
    info!("participant connected");
    counter!(WS_CONNECTIONS_TOTAL, "role" => role.as_str()).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    // Outbound forwarder with periodic Ping frames.
    let writer_conn = handle.clone();
    let ping_every = ctx.heartbeat.interval;
    let writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(ping_every);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                biased;
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(Message::Ping(Vec::<u8>::new().into())).await.is_err() {
                        break;
                    }
                }
                () = writer_conn.closed() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        writer_conn.close();
    });

    ctx.registry().register(participant, handle.clone());
    let guard = DeregisterGuard {
        registry: ctx.registry().clone(),
        participant,
        conn_id,
    };

    let heartbeat = tokio::spawn(run_heartbeat(handle.clone(), ctx.heartbeat));

    loop {
        let msg = tokio::select! {
            biased;
            () = handle.closed() => {
                debug!("connection closed locally");
                break;
            }
            () = ctx.shutdown.cancelled() => {
                info!("server shutting down, closing session");
                break;
            }
            msg = ws_rx.next() => msg,
        };

        let reply = match msg {
            Some(Ok(Message::Text(text))) => {
                handle.mark_alive();
                handle_text(&ctx.router, participant, text.as_str())
            }
            Some(Ok(Message::Binary(data))) => {
                handle.mark_alive();
                if let Ok(text) = std::str::from_utf8(&data) {
                    handle_text(&ctx.router, participant, text)
                } else {
                    debug!(len = data.len(), "received non-UTF8 binary frame");
                    Some(OutboundFrame::error(ERR_INVALID_FORMAT))
                }
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                handle.mark_alive();
                None
            }
            Some(Ok(Message::Close(_))) => {
                info!("client sent close frame");
                break;
            }
            Some(Err(e)) => {
                debug!(error = %e, "transport error");
                break;
            }
            None => break,
        };

        if let Some(reply) = reply {
            if !handle.send(&reply) {
                debug!("failed to enqueue reply (queue full or closed)");
            }
        }
    }

    // Clean up
    drop(guard);
    handle.close();
    if matches!(heartbeat.await, Ok(HeartbeatResult::TimedOut)) {
        info!("heartbeat timed out");
    }
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        debug!("writer did not finish in time");
    }

    info!(dropped = handle.drop_count(), "participant disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL, "role" => role.as_str()).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS, "role" => role.as_str())
        .record(connection_start.elapsed().as_secs_f64());
}
