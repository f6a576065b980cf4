//! Per-document in-flight slots.
//!
//! At most one holder per document id: the pipeline run holds the slot for
//! its whole execution, the retry controller while it resets the record.
//! Entries are removed from the registry when the last interested task lets
//! go, so the map only ever holds documents that are being worked on.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::models::DocumentId;

type Registry = Mutex<HashMap<DocumentId, Arc<AsyncMutex<()>>>>;

#[derive(Default, Clone)]
pub struct DocumentLocks {
    registry: Arc<Registry>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: DocumentId) -> Arc<AsyncMutex<()>> {
        let mut map = self
            .registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry(id).or_default().clone()
    }

    /// Wait until the slot for `id` is free and take it.
    pub async fn acquire(&self, id: DocumentId) -> InFlightGuard {
        let slot = self.entry(id);
        let guard = slot.lock_owned().await;
        InFlightGuard {
            guard: Some(guard),
            id,
            registry: self.registry.clone(),
        }
    }

    /// Take the slot only if nobody holds it.
    pub fn try_acquire(&self, id: DocumentId) -> Option<InFlightGuard> {
        let slot = self.entry(id);
        match slot.try_lock_owned() {
            Ok(guard) => Some(InFlightGuard {
                guard: Some(guard),
                id,
                registry: self.registry.clone(),
            }),
            Err(_) => {
                release_entry(&self.registry, id);
                None
            }
        }
    }

    /// Number of documents with a live slot (held or awaited).
    pub fn active(&self) -> usize {
        self.registry.lock().map(|m| m.len()).unwrap_or(0)
    }
}

/// Drop the registry entry if only the map still references it.
fn release_entry(registry: &Registry, id: DocumentId) {
    let mut map = registry
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(slot) = map.get(&id) {
        if Arc::strong_count(slot) == 1 {
            map.remove(&id);
        }
    }
}

/// RAII in-flight slot. Released on every exit path, unwinding included.
pub struct InFlightGuard {
    guard: Option<OwnedMutexGuard<()>>,
    id: DocumentId,
    registry: Arc<Registry>,
}

impl InFlightGuard {
    pub fn document_id(&self) -> DocumentId {
        self.id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        // Unlock first so the strong count reflects only other waiters.
        drop(self.guard.take());
        release_entry(&self.registry, self.id);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn slot_is_exclusive() {
        let locks = DocumentLocks::new();
        let guard = locks.acquire(DocumentId(1)).await;
        assert!(locks.try_acquire(DocumentId(1)).is_none());
        assert!(locks.try_acquire(DocumentId(2)).is_some());
        drop(guard);
        assert!(locks.try_acquire(DocumentId(1)).is_some());
    }

    #[tokio::test]
    async fn registry_empties_after_release() {
        let locks = DocumentLocks::new();
        {
            let _a = locks.acquire(DocumentId(7)).await;
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);

        assert!(locks.try_acquire(DocumentId(8)).is_some());
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn waiter_gets_slot_after_holder_releases() {
        let locks = DocumentLocks::new();
        let first = locks.acquire(DocumentId(3)).await;

        let waiter_locks = locks.clone();
        let waiter = tokio::spawn(async move {
            let guard = waiter_locks.acquire(DocumentId(3)).await;
            guard.document_id()
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        assert_eq!(waiter.await.unwrap(), DocumentId(3));
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn failed_try_keeps_holder_entry() {
        let locks = DocumentLocks::new();
        let _held = locks.acquire(DocumentId(4)).await;
        assert!(locks.try_acquire(DocumentId(4)).is_none());
        assert_eq!(locks.active(), 1);
    }
}
