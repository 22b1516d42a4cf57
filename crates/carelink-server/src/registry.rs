//! Live participants and the pairings between them.
//!
//! One `RwLock` guards the seeker map, the responder map and the pairing
//! set together, so compound lookups see a consistent view. Notifications
//! are enqueued after the lock is released.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use carelink_core::{ConnectionId, OutboundFrame, Participant, ResponderId, SeekerId};
use metrics::{counter, gauge};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::metrics::{DELIVERY_DROPS_TOTAL, PAIRINGS_CREATED_TOTAL, RESPONDERS_ACTIVE, SEEKERS_ACTIVE};
use crate::websocket::connection::ConnectionHandle;

#[derive(Default)]
struct RegistryState {
    seekers: HashMap<SeekerId, Arc<ConnectionHandle>>,
    responders: HashMap<ResponderId, Arc<ConnectionHandle>>,
    pairings: HashSet<(SeekerId, ResponderId)>,
}

impl RegistryState {
    #[allow(clippy::cast_precision_loss)]
    fn publish_counts(&self) {
        gauge!(SEEKERS_ACTIVE).set(self.seekers.len() as f64);
        gauge!(RESPONDERS_ACTIVE).set(self.responders.len() as f64);
    }
}

/// Point-in-time counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    /// Registered seekers.
    pub seekers: usize,
    /// Registered responders.
    pub responders: usize,
    /// Established pairings.
    pub pairings: usize,
}

/// Registry of reachable participants and their pairings.
#[derive(Default)]
pub struct SessionRegistry {
    state: RwLock<RegistryState>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a seeker's handle and announce it to every
    /// registered responder.
    ///
    /// A replaced handle is not closed here. Returns how many responders
    /// were notified.
    pub fn register_seeker(&self, id: SeekerId, handle: Arc<ConnectionHandle>) -> usize {
        let conn_id = handle.id.clone();
        let (superseded, responders) = {
            let mut state = self.state.write();
            let superseded = state.seekers.insert(id, handle);
            let responders: Vec<_> = state.responders.values().cloned().collect();
            state.publish_counts();
            (superseded, responders)
        };

        if let Some(old) = superseded {
            info!(seeker_id = %id, old_conn = %old.id, new_conn = %conn_id, "seeker connection superseded");
        }
        info!(seeker_id = %id, conn_id = %conn_id, "seeker registered");

        let frame = OutboundFrame::NewPatient {
            patient_id: id.get(),
        };
        let json = match frame.to_json() {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(seeker_id = %id, error = %e, "failed to serialize new_patient");
                return 0;
            }
        };

        let mut notified = 0;
        for responder in responders {
            if responder.send_raw(json.clone()) {
                notified += 1;
            } else {
                counter!(DELIVERY_DROPS_TOTAL, "frame" => "new_patient").increment(1);
                warn!(seeker_id = %id, conn_id = %responder.id, "failed to notify responder of new seeker");
            }
        }
        notified
    }

    /// Register (or replace) a responder's handle. No announcement.
    pub fn register_responder(&self, id: ResponderId, handle: Arc<ConnectionHandle>) {
        let conn_id = handle.id.clone();
        let superseded = {
            let mut state = self.state.write();
            let superseded = state.responders.insert(id, handle);
            state.publish_counts();
            superseded
        };

        if let Some(old) = superseded {
            info!(responder_id = %id, old_conn = %old.id, new_conn = %conn_id, "responder connection superseded");
        }
        info!(responder_id = %id, conn_id = %conn_id, "responder registered");
    }

    /// Register `handle` under the participant's role.
    pub fn register(&self, participant: Participant, handle: Arc<ConnectionHandle>) {
        match participant {
            Participant::Seeker(id) => {
                let _ = self.register_seeker(id, handle);
            }
            Participant::Responder(id) => self.register_responder(id, handle),
        }
    }

    /// Remove every pairing that names a seeker, and its entry if `conn_id`
    /// is still the current connection for `id`.
    ///
    /// A superseded connection leaves the newer entry in place. Returns
    /// whether the entry was removed.
    pub fn deregister_seeker(&self, id: SeekerId, conn_id: &ConnectionId) -> bool {
        let (removed_entry, removed_pairings) = {
            let mut state = self.state.write();
            let current = state.seekers.get(&id).is_some_and(|h| h.id == *conn_id);
            if current {
                let _ = state.seekers.remove(&id);
            }
            let before = state.pairings.len();
            state.pairings.retain(|(s, _)| *s != id);
            let removed = before - state.pairings.len();
            state.publish_counts();
            (current, removed)
        };
        if removed_entry {
            info!(seeker_id = %id, conn_id = %conn_id, removed_pairings, "seeker deregistered");
        } else {
            debug!(seeker_id = %id, conn_id = %conn_id, removed_pairings, "stale or absent seeker, entry kept");
        }
        removed_entry
    }

    /// Remove every pairing that names a responder, and its entry under the
    /// same current-connection rule as [`deregister_seeker`](Self::deregister_seeker).
    pub fn deregister_responder(&self, id: ResponderId, conn_id: &ConnectionId) -> bool {
        let (removed_entry, removed_pairings) = {
            let mut state = self.state.write();
            let current = state.responders.get(&id).is_some_and(|h| h.id == *conn_id);
            if current {
                let _ = state.responders.remove(&id);
            }
            let before = state.pairings.len();
            state.pairings.retain(|(_, r)| *r != id);
            let removed = before - state.pairings.len();
            state.publish_counts();
            (current, removed)
        };
        if removed_entry {
            info!(responder_id = %id, conn_id = %conn_id, removed_pairings, "responder deregistered");
        } else {
            debug!(responder_id = %id, conn_id = %conn_id, removed_pairings, "stale or absent responder, entry kept");
        }
        removed_entry
    }

    /// Deregister under the participant's role.
    pub fn deregister(&self, participant: Participant, conn_id: &ConnectionId) -> bool {
        match participant {
            Participant::Seeker(id) => self.deregister_seeker(id, conn_id),
            Participant::Responder(id) => self.deregister_responder(id, conn_id),
        }
    }

    /// Pair a seeker with a responder and tell both sides.
    ///
    /// Fails (no pairing, no notification) unless both are registered.
    /// Pairing an already-paired couple notifies again.
    pub fn create_pairing(&self, seeker: SeekerId, responder: ResponderId) -> bool {
        let handles = {
            let mut state = self.state.write();
            let seeker_handle = state.seekers.get(&seeker).cloned();
            let responder_handle = state.responders.get(&responder).cloned();
            match (seeker_handle, responder_handle) {
                (Some(s), Some(r)) => {
                    let _ = state.pairings.insert((seeker, responder));
                    state.publish_counts();
                    Some((s, r))
                }
                _ => None,
            }
        };

        let Some((seeker_handle, responder_handle)) = handles else {
            debug!(seeker_id = %seeker, responder_id = %responder, "pairing refused, participant not registered");
            return false;
        };

        counter!(PAIRINGS_CREATED_TOTAL).increment(1);
        info!(seeker_id = %seeker, responder_id = %responder, "pairing created");

        if !seeker_handle.send(&OutboundFrame::session_started_for_seeker(responder.get())) {
            counter!(DELIVERY_DROPS_TOTAL, "frame" => "session_started").increment(1);
            warn!(seeker_id = %seeker, "failed to notify seeker of session start");
        }
        if !responder_handle.send(&OutboundFrame::session_started_for_responder(seeker.get())) {
            counter!(DELIVERY_DROPS_TOTAL, "frame" => "session_started").increment(1);
            warn!(responder_id = %responder, "failed to notify responder of session start");
        }
        true
    }

    /// Whether the pairing exists.
    pub fn is_paired(&self, seeker: SeekerId, responder: ResponderId) -> bool {
        self.state.read().pairings.contains(&(seeker, responder))
    }

    /// The peer's current handle, if `sender` and `peer_id` are paired and
    /// the peer is still registered.
    ///
    /// A seeker's peer is a responder and vice versa.
    pub fn resolve_peer_handle(
        &self,
        sender: Participant,
        peer_id: i64,
    ) -> Option<Arc<ConnectionHandle>> {
        let state = self.state.read();
        match sender {
            Participant::Seeker(seeker) => {
                let responder = ResponderId::new(peer_id);
                if state.pairings.contains(&(seeker, responder)) {
                    state.responders.get(&responder).cloned()
                } else {
                    None
                }
            }
            Participant::Responder(responder) => {
                let seeker = SeekerId::new(peer_id);
                if state.pairings.contains(&(seeker, responder)) {
                    state.seekers.get(&seeker).cloned()
                } else {
                    None
                }
            }
        }
    }

    /// Whether a seeker is registered.
    pub fn contains_seeker(&self, id: SeekerId) -> bool {
        self.state.read().seekers.contains_key(&id)
    }

    /// Whether a responder is registered.
    pub fn contains_responder(&self, id: ResponderId) -> bool {
        self.state.read().responders.contains_key(&id)
    }

    /// Current handle for a seeker.
    pub fn seeker_handle(&self, id: SeekerId) -> Option<Arc<ConnectionHandle>> {
        self.state.read().seekers.get(&id).cloned()
    }

    /// Current handle for a responder.
    pub fn responder_handle(&self, id: ResponderId) -> Option<Arc<ConnectionHandle>> {
        self.state.read().responders.get(&id).cloned()
    }

    /// Counts of seekers, responders and pairings.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.state.read();
        RegistrySnapshot {
            seekers: state.seekers.len(),
            responders: state.responders.len(),
            pairings: state.pairings.len(),
        }
    }
}
