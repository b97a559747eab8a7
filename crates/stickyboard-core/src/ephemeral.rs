//! Ephemeral presence channel.
//!
//! Cursors, presence and live drag positions are high-frequency and
//! worthless after the fact, so they bypass the document store entirely.
//! Nothing published here is ever persisted; a client that vanishes takes
//! its entries with it.

use crate::model::{CursorEntry, NoteId, PresenceEntry, UserId};
use kurbo::Point;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// Events drained from the ephemeral channel.
#[derive(Debug, Clone)]
pub enum EphemeralEvent {
    /// Full roster of participants currently on the board.
    Presence(Vec<PresenceEntry>),
    /// A peer's cursor moved.
    Cursor(CursorEntry),
    /// A peer is dragging a note; position is live, not yet persisted.
    NotePosition {
        note: NoteId,
        position: Point,
        author: UserId,
    },
    /// A peer left (or its connection dropped); forget its cursor.
    PeerLeft(UserId),
}

/// Fire-and-forget transport for presence, cursors and live note motion.
///
/// Publishing never blocks and never fails loudly; a lost ephemeral update
/// is superseded by the next one within tens of milliseconds.
pub trait EphemeralStore {
    /// Join the channel under `user`/`name` and appear in peers' rosters.
    fn announce(&mut self, user: UserId, name: &str);

    fn set_cursor(&mut self, position: Point);

    /// Broadcast a live note position during a local drag.
    fn publish_note_position(&mut self, note: NoteId, position: Point);

    /// Remove this client's presence and cursor entries. Called on clean
    /// teardown; backends also invoke it when the connection drops.
    fn remove_own(&mut self);

    fn poll(&mut self) -> Vec<EphemeralEvent>;
}

pub(crate) fn epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

// ----------------------------------------------------------------------------
// In-memory backend
// ----------------------------------------------------------------------------

type PeerQueue = Arc<Mutex<Vec<EphemeralEvent>>>;

#[derive(Default)]
struct HubInner {
    /// Peer queues keyed by handle id; entries are removed when the
    /// owning handle drops, so slots never outlive their client.
    peers: HashMap<u64, PeerQueue>,
    presence: HashMap<UserId, PresenceEntry>,
    next_peer: u64,
}

impl HubInner {
    /// Deliver to every peer except the sender, like a relay broadcast.
    fn broadcast(&self, from: u64, event: EphemeralEvent) {
        for (&id, queue) in &self.peers {
            if id == from {
                continue;
            }
            if let Ok(mut queue) = queue.lock() {
                queue.push(event.clone());
            }
        }
    }

    fn roster(&self) -> Vec<PresenceEntry> {
        let mut entries: Vec<PresenceEntry> = self.presence.values().cloned().collect();
        entries.sort_by_key(|e| e.user_id);
        entries
    }
}

/// Shared in-memory ephemeral hub for tests and offline use. Hand out one
/// [`MemoryEphemeral`] per simulated client.
#[derive(Clone, Default)]
pub struct MemoryEphemeralHub {
    inner: Arc<RwLock<HubInner>>,
}

impl MemoryEphemeralHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(&self) -> MemoryEphemeral {
        let queue: PeerQueue = Arc::new(Mutex::new(Vec::new()));
        let id = match self.inner.write() {
            Ok(mut inner) => {
                let id = inner.next_peer;
                inner.next_peer += 1;
                inner.peers.insert(id, queue.clone());
                id
            }
            Err(_) => u64::MAX,
        };
        MemoryEphemeral {
            hub: self.inner.clone(),
            queue,
            id,
            user: None,
        }
    }
}

/// A client handle onto a [`MemoryEphemeralHub`].
pub struct MemoryEphemeral {
    hub: Arc<RwLock<HubInner>>,
    queue: PeerQueue,
    id: u64,
    user: Option<UserId>,
}

impl MemoryEphemeral {
    fn with_inner(&self, f: impl FnOnce(&mut HubInner)) {
        if let Ok(mut inner) = self.hub.write() {
            f(&mut inner);
        }
    }

}

impl EphemeralStore for MemoryEphemeral {
    fn announce(&mut self, user: UserId, name: &str) {
        self.user = Some(user);
        self.with_inner(|inner| {
            inner.presence.insert(
                user,
                PresenceEntry {
                    user_id: user,
                    name: name.to_string(),
                    last_active_ms: epoch_ms(),
                },
            );
            let roster = inner.roster();
            // The joiner also needs the current roster.
            for queue in inner.peers.values() {
                if let Ok(mut queue) = queue.lock() {
                    queue.push(EphemeralEvent::Presence(roster.clone()));
                }
            }
        });
    }

    fn set_cursor(&mut self, position: Point) {
        let Some(user) = self.user else { return };
        let id = self.id;
        self.with_inner(|inner| {
            if let Some(entry) = inner.presence.get_mut(&user) {
                entry.last_active_ms = epoch_ms();
            }
            let name = inner
                .presence
                .get(&user)
                .map(|p| p.name.clone())
                .unwrap_or_default();
            inner.broadcast(
                id,
                EphemeralEvent::Cursor(CursorEntry {
                    user_id: user,
                    name,
                    position,
                }),
            );
        });
    }

    fn publish_note_position(&mut self, note: NoteId, position: Point) {
        let Some(user) = self.user else { return };
        let id = self.id;
        self.with_inner(|inner| {
            inner.broadcast(
                id,
                EphemeralEvent::NotePosition {
                    note,
                    position,
                    author: user,
                },
            );
        });
    }

    fn remove_own(&mut self) {
        let Some(user) = self.user.take() else { return };
        let id = self.id;
        self.with_inner(|inner| {
            inner.presence.remove(&user);
            inner.broadcast(id, EphemeralEvent::PeerLeft(user));
            let roster = inner.roster();
            inner.broadcast(id, EphemeralEvent::Presence(roster));
        });
    }

    fn poll(&mut self) -> Vec<EphemeralEvent> {
        match self.queue.lock() {
            Ok(mut queue) => std::mem::take(&mut *queue),
            Err(_) => Vec::new(),
        }
    }
}

impl Drop for MemoryEphemeral {
    fn drop(&mut self) {
        // Abrupt disconnects still clear presence for the remaining peers,
        // and the hub forgets the peer slot entirely.
        self.remove_own();
        self.with_inner(|inner| {
            inner.peers.remove(&self.id);
        });
    }
}
