//! Process-wide session registry.
//!
//! Maps session identifier to a live [`SessionHandle`]. The map lock is held
//! only for lookup and insert; store reads and skeleton writes happen
//! outside it. Eviction is a memory-management concern only: a dropped
//! session's record stays in the store and is rehydrated on the next
//! reference.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use crate::config::policy;
use crate::error::StoreResult;
use crate::model::SessionRecord;
use crate::session::SessionHandle;
use crate::store::ElementStore;

struct Slot {
    handle: SessionHandle,
    /// Rewritten with a registry-unique value on every reference; a pending
    /// eviction only fires if the value it was armed with is still current.
    generation: Arc<AtomicU64>,
}

/// Registry of live sessions backed by the durable store.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Slot>>,
    store: Arc<ElementStore>,
    generations: AtomicU64,
}

impl SessionRegistry {
    /// Create a registry over a store.
    #[must_use]
    pub fn new(store: Arc<ElementStore>) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), store, generations: AtomicU64::new(0) }
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::SeqCst)
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<ElementStore> {
        &self.store
    }

    /// Number of sessions currently loaded in memory (for readiness probes).
    pub async fn loaded_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Get the live session, rehydrating from the store or creating and
    /// persisting an empty skeleton if the identifier is new.
    pub async fn get_or_create(&self, id: &str) -> StoreResult<SessionHandle> {
        if let Some(handle) = self.lookup(id).await {
            return Ok(handle);
        }

        let record = match self.store.get(id)? {
            Some(record) => record,
            None => {
                let record = SessionRecord::new(id);
                self.store.put(&record)?;
                tracing::info!(session_id = %id, "created session");
                record
            }
        };

        Ok(self.insert_or_reuse(record).await)
    }

    /// Get the live session only if it is loaded or persisted; `None` for an
    /// identifier with no record anywhere.
    pub async fn get(&self, id: &str) -> StoreResult<Option<SessionHandle>> {
        if let Some(handle) = self.lookup(id).await {
            return Ok(Some(handle));
        }

        match self.store.get(id)? {
            Some(record) => Ok(Some(self.insert_or_reuse(record).await)),
            None => Ok(None),
        }
    }

    /// Arm a delayed eviction for a session that just lost a subscriber. When
    /// the delay fires the session is dropped from the map only if it has not
    /// been referenced since and still has zero subscribers.
    pub fn schedule_eviction(self: &Arc<Self>, id: String) {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let armed = {
                let map = registry.sessions.read().await;
                match map.get(&id) {
                    Some(slot) => slot.generation.load(Ordering::SeqCst),
                    None => return,
                }
            };

            tokio::time::sleep(policy::EVICTION_DELAY).await;

            let mut map = registry.sessions.write().await;
            if let Some(slot) = map.get(&id) {
                if slot.generation.load(Ordering::SeqCst) == armed
                    && slot.handle.subscriber_count() == 0
                {
                    map.remove(&id);
                    tracing::info!(session_id = %id, "evicted idle session");
                }
            }
        });
    }

    async fn lookup(&self, id: &str) -> Option<SessionHandle> {
        let map = self.sessions.read().await;
        map.get(id).map(|slot| {
            slot.generation.store(self.next_generation(), Ordering::SeqCst);
            slot.handle.clone()
        })
    }

    async fn insert_or_reuse(&self, record: SessionRecord) -> SessionHandle {
        let mut map = self.sessions.write().await;
        if let Some(slot) = map.get(&record.id) {
            // Lost a load race; the first actor wins.
            slot.generation.store(self.next_generation(), Ordering::SeqCst);
            return slot.handle.clone();
        }

        let id = record.id.clone();
        let handle = SessionHandle::spawn(record, Arc::clone(&self.store));
        let generation = Arc::new(AtomicU64::new(self.next_generation()));
        map.insert(id, Slot { handle: handle.clone(), generation });
        handle
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry").finish()
    }
}
