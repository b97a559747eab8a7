//! Document store abstraction and the in-memory backend.
//!
//! The hosted document database is consumed through the [`DocumentStore`]
//! trait: board-scoped element collections with snapshot subscriptions plus
//! a board directory. Store handles are constructed explicitly and injected
//! (no global connection singleton), so tests and offline use substitute
//! [`MemoryStore`].

use crate::model::{BoardId, UserId};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use uuid::Uuid;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The element collections scoped to a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectionKind {
    Notes,
    Paths,
    Shapes,
}

pub type SubscriptionId = u64;

/// A full collection snapshot delivered to a subscriber.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub subscription: SubscriptionId,
    pub board_id: BoardId,
    pub kind: CollectionKind,
    /// Raw documents; callers decode them into typed records.
    pub documents: Vec<(Uuid, Value)>,
}

/// Client handle onto the document store.
///
/// All operations are non-blocking; snapshot delivery is pull-based via
/// [`DocumentStore::poll`], which the session drains on its event loop.
pub trait DocumentStore {
    /// Subscribe to a board-scoped collection. The current full snapshot is
    /// queued immediately; every subsequent change queues a fresh one.
    fn subscribe(&mut self, board: BoardId, kind: CollectionKind) -> StoreResult<SubscriptionId>;

    /// Tear down a subscription. Required on board/session teardown; a
    /// dangling subscription is a correctness bug, not just a leak.
    fn unsubscribe(&mut self, subscription: SubscriptionId);

    fn create(&mut self, board: BoardId, kind: CollectionKind, id: Uuid, doc: Value)
        -> StoreResult<()>;

    /// Partial field merge into an existing document.
    fn update(&mut self, board: BoardId, kind: CollectionKind, id: Uuid, patch: Value)
        -> StoreResult<()>;

    fn delete(&mut self, board: BoardId, kind: CollectionKind, id: Uuid) -> StoreResult<()>;

    /// Atomic multi-delete across collections: either every target is
    /// removed or none is.
    fn batch_delete(
        &mut self,
        board: BoardId,
        targets: &[(CollectionKind, Uuid)],
    ) -> StoreResult<()>;

    /// Drain pending snapshots for this handle's subscriptions.
    fn poll(&mut self) -> Vec<Snapshot>;

    // Board directory.

    fn upsert_board(&mut self, id: BoardId, doc: Value) -> StoreResult<()>;

    fn get_board(&mut self, id: BoardId) -> StoreResult<Value>;

    fn delete_board(&mut self, id: BoardId) -> StoreResult<()>;

    fn list_boards(&mut self, owner: UserId) -> StoreResult<Vec<(BoardId, Value)>>;
}

// ----------------------------------------------------------------------------
// In-memory backend
// ----------------------------------------------------------------------------

struct Subscriber {
    id: SubscriptionId,
    board: BoardId,
    kind: CollectionKind,
    queue: Arc<Mutex<Vec<Snapshot>>>,
}

#[derive(Default)]
struct HubInner {
    boards: HashMap<BoardId, Value>,
    /// BTreeMap keeps document order deterministic across snapshots.
    elements: HashMap<(BoardId, CollectionKind), BTreeMap<Uuid, Value>>,
    subscribers: Vec<Subscriber>,
    next_subscription: SubscriptionId,
    /// Test hook: make every write fail, simulating a network outage.
    fail_writes: bool,
}

impl HubInner {
    fn snapshot_for(&self, board: BoardId, kind: CollectionKind, sub: SubscriptionId) -> Snapshot {
        let documents = self
            .elements
            .get(&(board, kind))
            .map(|docs| docs.iter().map(|(id, doc)| (*id, doc.clone())).collect())
            .unwrap_or_default();
        Snapshot {
            subscription: sub,
            board_id: board,
            kind,
            documents,
        }
    }

    fn notify(&self, board: BoardId, kind: CollectionKind) {
        for sub in &self.subscribers {
            if sub.board == board && sub.kind == kind {
                let snapshot = self.snapshot_for(board, kind, sub.id);
                if let Ok(mut queue) = sub.queue.lock() {
                    queue.push(snapshot);
                }
            }
        }
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes {
            Err(StoreError::Backend("write rejected (offline)".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Shared in-memory store hub. Hand out one [`MemoryStore`] per simulated
/// client; all handles see the same data and each other's writes.
#[derive(Clone, Default)]
pub struct MemoryStoreHub {
    inner: Arc<RwLock<HubInner>>,
}

impl MemoryStoreHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client handle with its own subscription queue.
    pub fn client(&self) -> MemoryStore {
        MemoryStore {
            hub: self.inner.clone(),
            queue: Arc::new(Mutex::new(Vec::new())),
            own_subscriptions: Vec::new(),
        }
    }

    /// Toggle simulated write failures (tests).
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.write() {
            inner.fail_writes = fail;
        }
    }
}

/// A client handle onto a [`MemoryStoreHub`].
pub struct MemoryStore {
    hub: Arc<RwLock<HubInner>>,
    queue: Arc<Mutex<Vec<Snapshot>>>,
    own_subscriptions: Vec<SubscriptionId>,
}

impl MemoryStore {
    fn write_inner<T>(&self, f: impl FnOnce(&mut HubInner) -> StoreResult<T>) -> StoreResult<T> {
        let mut inner = self
            .hub
            .write()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {}", e)))?;
        f(&mut inner)
    }
}

impl DocumentStore for MemoryStore {
    fn subscribe(&mut self, board: BoardId, kind: CollectionKind) -> StoreResult<SubscriptionId> {
        let queue = self.queue.clone();
        let id = self.write_inner(|inner| {
            let id = inner.next_subscription;
            inner.next_subscription += 1;
            inner.subscribers.push(Subscriber {
                id,
                board,
                kind,
                queue: queue.clone(),
            });
            // Initial full snapshot is delivered immediately.
            let snapshot = inner.snapshot_for(board, kind, id);
            if let Ok(mut q) = queue.lock() {
                q.push(snapshot);
            }
            Ok(id)
        })?;
        self.own_subscriptions.push(id);
        Ok(id)
    }

    fn unsubscribe(&mut self, subscription: SubscriptionId) {
        self.own_subscriptions.retain(|&s| s != subscription);
        let _ = self.write_inner(|inner| {
            inner.subscribers.retain(|s| s.id != subscription);
            Ok(())
        });
    }

    fn create(
        &mut self,
        board: BoardId,
        kind: CollectionKind,
        id: Uuid,
        doc: Value,
    ) -> StoreResult<()> {
        self.write_inner(|inner| {
            inner.check_writable()?;
            inner.elements.entry((board, kind)).or_default().insert(id, doc);
            inner.notify(board, kind);
            Ok(())
        })
    }

    fn update(
        &mut self,
        board: BoardId,
        kind: CollectionKind,
        id: Uuid,
        patch: Value,
    ) -> StoreResult<()> {
        self.write_inner(|inner| {
            inner.check_writable()?;
            let docs = inner
                .elements
                .get_mut(&(board, kind))
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            let doc = docs
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            merge_fields(doc, &patch);
            inner.notify(board, kind);
            Ok(())
        })
    }

    fn delete(&mut self, board: BoardId, kind: CollectionKind, id: Uuid) -> StoreResult<()> {
        self.write_inner(|inner| {
            inner.check_writable()?;
            if let Some(docs) = inner.elements.get_mut(&(board, kind)) {
                docs.remove(&id);
            }
            inner.notify(board, kind);
            Ok(())
        })
    }

    fn batch_delete(
        &mut self,
        board: BoardId,
        targets: &[(CollectionKind, Uuid)],
    ) -> StoreResult<()> {
        self.write_inner(|inner| {
            // All-or-nothing: check writability before touching anything.
            inner.check_writable()?;
            let mut touched: Vec<CollectionKind> = Vec::new();
            for &(kind, id) in targets {
                if let Some(docs) = inner.elements.get_mut(&(board, kind)) {
                    docs.remove(&id);
                }
                if !touched.contains(&kind) {
                    touched.push(kind);
                }
            }
            for kind in touched {
                inner.notify(board, kind);
            }
            Ok(())
        })
    }

    fn poll(&mut self) -> Vec<Snapshot> {
        match self.queue.lock() {
            Ok(mut queue) => std::mem::take(&mut *queue),
            Err(_) => Vec::new(),
        }
    }

    fn upsert_board(&mut self, id: BoardId, doc: Value) -> StoreResult<()> {
        self.write_inner(|inner| {
            inner.check_writable()?;
            match inner.boards.get_mut(&id) {
                Some(existing) => merge_fields(existing, &doc),
                None => {
                    inner.boards.insert(id, doc);
                }
            }
            Ok(())
        })
    }

    fn get_board(&mut self, id: BoardId) -> StoreResult<Value> {
        self.write_inner(|inner| {
            inner
                .boards
                .get(&id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(id.to_string()))
        })
    }

    fn delete_board(&mut self, id: BoardId) -> StoreResult<()> {
        self.write_inner(|inner| {
            inner.check_writable()?;
            inner
                .boards
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| StoreError::NotFound(id.to_string()))
        })
    }

    fn list_boards(&mut self, owner: UserId) -> StoreResult<Vec<(BoardId, Value)>> {
        self.write_inner(|inner| {
            let owner_str = owner.to_string();
            Ok(inner
                .boards
                .iter()
                .filter(|(_, doc)| {
                    doc.get("owner").and_then(|v| v.as_str()) == Some(owner_str.as_str())
                })
                .map(|(id, doc)| (*id, doc.clone()))
                .collect())
        })
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        // A dropped handle must not leave dangling subscriptions behind.
        let subs = std::mem::take(&mut self.own_subscriptions);
        let _ = self.write_inner(|inner| {
            inner.subscribers.retain(|s| !subs.contains(&s.id));
            Ok(())
        });
    }
}

/// Merge top-level fields of `patch` into `target` (Firestore-style partial
/// update). Non-object patches replace the document wholesale.
fn merge_fields(target: &mut Value, patch: &Value) {
    match (target.as_object_mut(), patch.as_object()) {
        (Some(target_map), Some(patch_map)) => {
            for (key, value) in patch_map {
                target_map.insert(key.clone(), value.clone());
            }
        }
        _ => *target = patch.clone(),
    }
}
