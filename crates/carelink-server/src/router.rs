//! Message routing across established pairings.

use std::sync::Arc;

use carelink_core::{OutboundFrame, Participant, ResponderId, SeekerId};
use metrics::counter;
use tracing::{debug, warn};

use crate::metrics::ROUTING_FAILURES_TOTAL;
use crate::registry::SessionRegistry;

/// Forwards messages between paired participants.
#[derive(Clone)]
pub struct MessageRouter {
    registry: Arc<SessionRegistry>,
}

impl MessageRouter {
    /// Route through `registry`.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this router reads.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Deliver `content` from `sender` to its paired peer `peer_id`.
    ///
    /// Returns `true` only when the frame was queued for the peer. An
    /// unpaired or absent peer, or a full peer queue, is a `false`.
    pub fn route_message(&self, sender: Participant, peer_id: i64, content: &str) -> bool {
        let Some(peer) = self.registry.resolve_peer_handle(sender, peer_id) else {
            counter!(ROUTING_FAILURES_TOTAL, "reason" => "not_paired").increment(1);
            debug!(%sender, peer_id, "no pairing with peer, message not routed");
            return false;
        };

        let frame = OutboundFrame::Message {
            sender_id: sender.raw_id(),
            content: content.to_owned(),
            is_psychologist: sender.role().is_psychologist(),
        };
        if peer.send(&frame) {
            true
        } else {
            counter!(ROUTING_FAILURES_TOTAL, "reason" => "queue_full").increment(1);
            warn!(%sender, peer_id, conn_id = %peer.id, "peer send queue unavailable, message dropped");
            false
        }
    }

    /// A responder asks to pair with a seeker.
    pub fn request_pairing(&self, responder: ResponderId, seeker: SeekerId) -> bool {
        let paired = self.registry.create_pairing(seeker, responder);
        if !paired {
            counter!(ROUTING_FAILURES_TOTAL, "reason" => "pairing_refused").increment(1);
        }
        paired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::ConnectionHandle;
    use carelink_core::ConnectionId;
    use tokio::sync::mpsc;

    fn handle(capacity: usize) -> (Arc<ConnectionHandle>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Arc::new(ConnectionHandle::new(ConnectionId::new(), tx)), rx)
    }

    fn drain(rx: &mut mpsc::Receiver<Arc<String>>) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(serde_json::from_str(&msg).unwrap());
        }
        out
    }

    struct Fixture {
        router: MessageRouter,
        seeker_rx: mpsc::Receiver<Arc<String>>,
        responder_rx: mpsc::Receiver<Arc<String>>,
    }

    fn paired(seeker_capacity: usize) -> Fixture {
        let registry = Arc::new(SessionRegistry::new());
        let router = MessageRouter::new(registry.clone());
        let (seeker, seeker_rx) = handle(seeker_capacity);
        let (responder, responder_rx) = handle(16);
        registry.register_responder(ResponderId::new(2), responder);
        let _ = registry.register_seeker(SeekerId::new(1), seeker);
        assert!(router.request_pairing(ResponderId::new(2), SeekerId::new(1)));
        let mut f = Fixture {
            router,
            seeker_rx,
            responder_rx,
        };
        let _ = drain(&mut f.seeker_rx);
        let _ = drain(&mut f.responder_rx);
        f
    }

    #[test]
    fn seeker_to_responder() {
        let mut f = paired(16);
        assert!(f.router.route_message(Participant::Seeker(SeekerId::new(1)), 2, "hola"));
        assert_eq!(
            drain(&mut f.responder_rx),
            vec![serde_json::json!({
                "type": "message", "sender_id": 1, "content": "hola", "is_psychologist": false
            })]
        );
        assert!(drain(&mut f.seeker_rx).is_empty());
    }

    #[test]
    fn responder_to_seeker() {
        let mut f = paired(16);
        assert!(f.router.route_message(Participant::Responder(ResponderId::new(2)), 1, "hi"));
        let frames = drain(&mut f.seeker_rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["sender_id"], 2);
        assert_eq!(frames[0]["is_psychologist"], true);
    }

    #[test]
    fn unpaired_route_fails_quietly() {
        let registry = Arc::new(SessionRegistry::new());
        let router = MessageRouter::new(registry.clone());
        let (responder, mut responder_rx) = handle(16);
        registry.register_responder(ResponderId::new(2), responder);
        let _ = registry.register_seeker(SeekerId::new(1), handle(16).0);
        let _ = drain(&mut responder_rx);

        assert!(!router.route_message(Participant::Seeker(SeekerId::new(1)), 2, "hola"));
        assert!(drain(&mut responder_rx).is_empty());
        assert!(!router.route_message(Participant::Seeker(SeekerId::new(1)), 99, "hola"));
    }

    #[test]
    fn full_peer_queue_is_a_failure() {
        let f = paired(1);
        let responder = Participant::Responder(ResponderId::new(2));
        assert!(f.router.route_message(responder, 1, "one"));
        assert!(!f.router.route_message(responder, 1, "two"));
    }

    #[test]
    fn pairing_refused_for_absent_seeker() {
        let registry = Arc::new(SessionRegistry::new());
        let router = MessageRouter::new(registry.clone());
        registry.register_responder(ResponderId::new(2), handle(16).0);
        assert!(!router.request_pairing(ResponderId::new(2), SeekerId::new(7)));
        assert!(!router.registry().is_paired(SeekerId::new(7), ResponderId::new(2)));
    }
}
