//! Inbound frame dispatch.

use carelink_core::frames::{ERR_DELIVERY, ERR_INVALID_FORMAT, ERR_PAIRING};
use carelink_core::{FrameError, InboundFrame, OutboundFrame, Participant, SeekerId, decode_inbound};
use metrics::counter;
use tracing::debug;

use crate::metrics::FRAMES_RECEIVED_TOTAL;
use crate::router::MessageRouter;

/// Handle one inbound text frame from `sender`.
///
/// Returns the frame to send back to the sender, if any. Undecodable input
/// and failed deliveries produce an `error` frame; frames with an unknown
/// type, missing fields, or not allowed for the sender's role are dropped.
pub fn handle_text(router: &MessageRouter, sender: Participant, text: &str) -> Option<OutboundFrame> {
    let frame = match decode_inbound(text) {
        Ok(frame) => frame,
        Err(e) => {
            counter!(FRAMES_RECEIVED_TOTAL, "type" => "invalid").increment(1);
            if e.is_reportable() {
                debug!(%sender, error = %e, "malformed frame");
                return Some(OutboundFrame::error(ERR_INVALID_FORMAT));
            }
            debug!(%sender, error = %e, "ignoring frame");
            return None;
        }
    };
    counter!(FRAMES_RECEIVED_TOTAL, "type" => frame.type_name()).increment(1);

    match frame {
        InboundFrame::Message {
            receiver_id,
            content,
        } => (!router.route_message(sender, receiver_id, &content))
            .then(|| OutboundFrame::error(ERR_DELIVERY)),
        InboundFrame::ConnectPatient { patient_id } => match sender {
            Participant::Responder(responder) => (!router
                .request_pairing(responder, SeekerId::new(patient_id)))
            .then(|| OutboundFrame::error(ERR_PAIRING)),
            Participant::Seeker(_) => {
                let e = FrameError::NotPermitted("connect_patient");
                debug!(%sender, error = %e, "ignoring frame");
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::registry::SessionRegistry;
    use crate::websocket::connection::ConnectionHandle;
    use assert_matches::assert_matches;
    use carelink_core::{ConnectionId, ResponderId};
    use tokio::sync::mpsc;

    struct Fixture {
        router: MessageRouter,
        seeker_rx: mpsc::Receiver<Arc<String>>,
        responder_rx: mpsc::Receiver<Arc<String>>,
    }

    const SEEKER: Participant = Participant::Seeker(SeekerId::new(1));
    const RESPONDER: Participant = Participant::Responder(ResponderId::new(2));

    fn fixture() -> Fixture {
        let registry = Arc::new(SessionRegistry::new());
        let (stx, seeker_rx) = mpsc::channel(16);
        let (rtx, responder_rx) = mpsc::channel(16);
        registry.register_responder(
            ResponderId::new(2),
            Arc::new(ConnectionHandle::new(ConnectionId::new(), rtx)),
        );
        let _ = registry.register_seeker(
            SeekerId::new(1),
            Arc::new(ConnectionHandle::new(ConnectionId::new(), stx)),
        );
        let mut f = Fixture {
            router: MessageRouter::new(registry),
            seeker_rx,
            responder_rx,
        };
        // new_patient
        let _ = f.responder_rx.try_recv();
        f
    }

    fn error_message(frame: Option<OutboundFrame>) -> String {
        assert_matches!(frame, Some(OutboundFrame::Error { message }) => message)
    }

    #[test]
    fn malformed_json_reports_error() {
        let f = fixture();
        assert_eq!(
            error_message(handle_text(&f.router, SEEKER, "{not json")),
            ERR_INVALID_FORMAT
        );
        assert_eq!(
            error_message(handle_text(&f.router, SEEKER, "[1,2,3]")),
            ERR_INVALID_FORMAT
        );
    }

    #[test]
    fn unknown_type_and_missing_fields_are_ignored() {
        let f = fixture();
        assert!(handle_text(&f.router, SEEKER, r#"{"type":"typing"}"#).is_none());
        assert!(handle_text(&f.router, SEEKER, r#"{"type":"message","receiver_id":2}"#).is_none());
        assert!(handle_text(&f.router, RESPONDER, r#"{"type":"connect_patient"}"#).is_none());
    }

    #[test]
    fn unpaired_message_reports_delivery_error() {
        let mut f = fixture();
        let reply = handle_text(
            &f.router,
            SEEKER,
            r#"{"type":"message","receiver_id":2,"content":"hola"}"#,
        );
        assert_eq!(error_message(reply), ERR_DELIVERY);
        assert!(f.responder_rx.try_recv().is_err());
    }

    #[test]
    fn connect_patient_pairs_and_message_flows() {
        let mut f = fixture();
        assert!(handle_text(&f.router, RESPONDER, r#"{"type":"connect_patient","patient_id":1}"#).is_none());
        assert!(f.seeker_rx.try_recv().is_ok());
        assert!(f.responder_rx.try_recv().is_ok());

        assert!(
            handle_text(
                &f.router,
                SEEKER,
                r#"{"type":"message","receiver_id":2,"content":"hola"}"#
            )
            .is_none()
        );
        let msg = f.responder_rx.try_recv().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed["content"], "hola");
    }

    #[test]
    fn connect_unknown_patient_reports_pairing_error() {
        let f = fixture();
        let reply = handle_text(&f.router, RESPONDER, r#"{"type":"connect_patient","patient_id":9}"#);
        assert_eq!(error_message(reply), ERR_PAIRING);
    }

    #[test]
    fn seeker_cannot_request_pairing() {
        let mut f = fixture();
        assert!(handle_text(&f.router, SEEKER, r#"{"type":"connect_patient","patient_id":1}"#).is_none());
        assert!(f.seeker_rx.try_recv().is_err());
        assert!(!f.router.registry().is_paired(SeekerId::new(1), ResponderId::new(2)));
    }
}
