//! Session registry
//!
//! Peer-id keyed map of active negotiation sessions. Mutated from both the
//! receive loop and engine callback tasks, so every operation is one short
//! lock-held critical section with no blocking calls inside.

use crate::webrtc::engine::MediaSession;
use log::debug;
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Identifier the signaling server assigns to each peer.
pub type PeerId = u64;

/// The core's record of one in-progress or active negotiation.
pub struct PeerSession {
    pub peer_id: PeerId,
    /// Handle into the external media-negotiation engine. Stays alive for
    /// as long as the registry entry or any in-flight callback holds it.
    pub media: Arc<dyn MediaSession>,
    pub created_at: Instant,
}

impl PeerSession {
    pub fn new(peer_id: PeerId, media: Arc<dyn MediaSession>) -> Arc<Self> {
        Arc::new(Self {
            peer_id,
            media,
            created_at: Instant::now(),
        })
    }

    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}

/// Registry of active sessions, at most one per peer id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<PeerId, Arc<PeerSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, peer: PeerId) -> Option<Arc<PeerSession>> {
        self.sessions.lock().get(&peer).cloned()
    }

    pub fn contains(&self, peer: PeerId) -> bool {
        self.sessions.lock().contains_key(&peer)
    }

    /// Insert a session for `peer` unless one already exists. Returns the
    /// live session and whether this call created it; a racing insert keeps
    /// the existing entry so one peer never has two sessions.
    pub fn get_or_insert(
        &self,
        peer: PeerId,
        media: Arc<dyn MediaSession>,
    ) -> (Arc<PeerSession>, bool) {
        let mut sessions = self.sessions.lock();
        match sessions.entry(peer) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let session = PeerSession::new(peer, media);
                entry.insert(session.clone());
                (session, true)
            }
        }
    }

    /// Remove the session for `peer`, dropping the registry's reference to
    /// the engine handle.
    pub fn remove(&self, peer: PeerId) -> Option<Arc<PeerSession>> {
        let removed = self.sessions.lock().remove(&peer);
        if let Some(session) = &removed {
            debug!(
                "Session for consumer {} removed after {:?}",
                peer,
                session.age()
            );
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    pub fn clear(&self) {
        self.sessions.lock().clear();
    }
}
