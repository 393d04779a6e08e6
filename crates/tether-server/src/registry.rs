//! Live connection registry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tether_transport::{Connection, ConnectionId};

struct Slot {
    conn: Arc<dyn Connection>,
    active: AtomicBool,
}

/// `ConnectionId → connection` for every connection whose read loop is
/// running.
///
/// Sharded (`DashMap`) so accepts, removals and broadcast snapshots on
/// different connections don't contend on one lock. No shard guard is ever
/// held across an `.await`: callers get cloned `Arc`s out.
#[derive(Default)]
pub(crate) struct ConnectionRegistry {
    slots: DashMap<ConnectionId, Arc<Slot>>,
}

impl ConnectionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds `conn` under a freshly generated id.
    ///
    /// Ids are time + random and can in principle collide; on a collision
    /// a new id is drawn. The returned guard removes the entry on drop.
    pub(crate) fn register(self: &Arc<Self>, conn: Arc<dyn Connection>) -> RegistryGuard {
        loop {
            let id = ConnectionId::generate();
            if let Entry::Vacant(vacant) = self.slots.entry(id.clone()) {
                vacant.insert(Arc::new(Slot {
                    conn,
                    active: AtomicBool::new(true),
                }));
                return RegistryGuard {
                    registry: Arc::clone(self),
                    id,
                };
            }
            tracing::debug!(%id, "connection id collision, regenerating");
        }
    }

    /// The connection for `id`, if it is still active.
    pub(crate) fn get(&self, id: &ConnectionId) -> Option<Arc<dyn Connection>> {
        self.slots
            .get(id)
            .filter(|slot| slot.active.load(Ordering::Acquire))
            .map(|slot| Arc::clone(&slot.conn))
    }

    /// Every active connection, copied out so the caller can await freely.
    pub(crate) fn snapshot(&self) -> Vec<(ConnectionId, Arc<dyn Connection>)> {
        self.slots
            .iter()
            .filter(|entry| entry.value().active.load(Ordering::Acquire))
            .map(|entry| (entry.key().clone(), Arc::clone(&entry.value().conn)))
            .collect()
    }

    pub(crate) fn ids(&self) -> Vec<ConnectionId> {
        self.slots.iter().map(|entry| entry.key().clone()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    fn remove(&self, id: &ConnectionId) {
        if let Some((_, slot)) = self.slots.remove(id) {
            slot.active.store(false, Ordering::Release);
        }
    }

    fn deactivate(&self, id: &ConnectionId) {
        if let Some(slot) = self.slots.get(id) {
            slot.active.store(false, Ordering::Release);
        }
    }
}

/// Removes a connection from the registry when its read loop exits,
/// however it exits.
pub(crate) struct RegistryGuard {
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
}

impl RegistryGuard {
    pub(crate) fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Stops broadcasts and lookups from reaching the connection while it
    /// is being torn down.
    pub(crate) fn deactivate(&self) {
        self.registry.deactivate(&self.id);
    }
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}
