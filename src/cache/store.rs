//! Fixed-slot object cache with per-slot readers-writer locking.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, OwnedRwLockReadGuard, RwLock};

use crate::cache::entry::{CacheEntry, Recency};
use crate::config::CacheConfig;
use crate::observability::metrics;

/// Errors returned by [`ObjectCache::insert`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("object of {len} bytes exceeds the per-object limit of {limit} bytes")]
    ObjectTooLarge { len: usize, limit: usize },
}

#[derive(Debug, Default)]
struct Slot {
    entry: Arc<RwLock<CacheEntry>>,
    /// Handlers currently holding a hit on this slot.
    readers: Arc<AtomicUsize>,
}

/// Point-in-time view of one slot, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub index: usize,
    pub key: Option<String>,
    pub len: usize,
    pub recency: Recency,
}

/// A cache hit. The slot stays read-locked until this is dropped, so the body
/// cannot be overwritten while the caller is still sending it.
#[derive(Debug)]
pub struct CacheHit {
    index: usize,
    guard: OwnedRwLockReadGuard<CacheEntry>,
    readers: Arc<AtomicUsize>,
}

impl CacheHit {
    pub fn slot(&self) -> usize {
        self.index
    }

    pub fn body(&self) -> &[u8] {
        self.guard.body()
    }
}

impl Drop for CacheHit {
    fn drop(&mut self) {
        self.readers.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Bounded in-memory cache of origin responses keyed by request URI.
///
/// Each slot is its own lock; there is no cache-wide lock on the read path.
/// Inserts are serialized among themselves because an insert holds its target
/// slot while ageing every other slot, and two inserts doing that concurrently
/// could each wait on the other's target.
#[derive(Debug)]
pub struct ObjectCache {
    slots: Vec<Slot>,
    max_object_size: usize,
    writer: Mutex<()>,
}

impl ObjectCache {
    /// Create a cache with `slots` free slots. At least one slot is always allocated.
    pub fn new(slots: usize, max_object_size: usize) -> Self {
        Self {
            slots: (0..slots.max(1)).map(|_| Slot::default()).collect(),
            max_object_size,
            writer: Mutex::new(()),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.slots, config.max_object_size)
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Largest body accepted by [`insert`](Self::insert).
    pub fn max_object_size(&self) -> usize {
        self.max_object_size
    }

    /// Find `key`, scanning slots in index order.
    ///
    /// Each slot is read-locked only while it is compared; on a match the lock
    /// is handed to the returned [`CacheHit`].
    pub async fn lookup(&self, key: &str) -> Option<CacheHit> {
        for (index, slot) in self.slots.iter().enumerate() {
            let guard = Arc::clone(&slot.entry).read_owned().await;
            if guard.matches(key) {
                slot.readers.fetch_add(1, Ordering::AcqRel);
                metrics::record_cache_lookup(true);
                return Some(CacheHit {
                    index,
                    guard,
                    readers: Arc::clone(&slot.readers),
                });
            }
        }
        metrics::record_cache_lookup(false);
        None
    }

    /// Slot the next insert of a new key would overwrite.
    ///
    /// The first free slot wins outright. Otherwise the lowest recency wins,
    /// and among equal recencies the lowest index.
    pub async fn eviction_candidate(&self) -> usize {
        let mut best: Option<(usize, Recency)> = None;
        for (index, slot) in self.slots.iter().enumerate() {
            let entry = slot.entry.read().await;
            if !entry.is_occupied() {
                return index;
            }
            match best {
                Some((_, min)) if entry.recency() >= min => {}
                _ => best = Some((index, entry.recency())),
            }
        }
        best.map(|(index, _)| index).unwrap_or(0)
    }

    /// Store `body` under `key` and return the slot it was written to.
    ///
    /// A key that is already cached is overwritten in its current slot so that
    /// keys stay unique. Every other occupied slot is aged by one, each under
    /// its own write lock; the target slot is released last.
    pub async fn insert(&self, key: &str, body: Vec<u8>) -> Result<usize, CacheError> {
        if body.len() > self.max_object_size {
            return Err(CacheError::ObjectTooLarge {
                len: body.len(),
                limit: self.max_object_size,
            });
        }

        let _serial = self.writer.lock().await;

        let index = match self.position(key).await {
            Some(index) => index,
            None => self.eviction_candidate().await,
        };

        let mut target = self.slots[index].entry.write().await;
        if let Some(previous) = target.key() {
            tracing::debug!(slot = index, evicted = %previous, "Evicting cache entry");
        }
        let len = body.len();
        target.fill(key, body);

        for (other, slot) in self.slots.iter().enumerate() {
            if other != index {
                slot.entry.write().await.age();
            }
        }
        drop(target);

        tracing::debug!(slot = index, key, bytes = len, "Cached response");
        metrics::record_cache_insert(len);
        Ok(index)
    }

    /// Number of handlers currently holding a hit on `index`.
    pub fn active_readers(&self, index: usize) -> usize {
        self.slots
            .get(index)
            .map(|slot| slot.readers.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    /// Read every slot in turn and report its state.
    pub async fn snapshot(&self) -> Vec<SlotSnapshot> {
        let mut out = Vec::with_capacity(self.slots.len());
        for (index, slot) in self.slots.iter().enumerate() {
            let entry = slot.entry.read().await;
            out.push(SlotSnapshot {
                index,
                key: entry.key().map(str::to_string),
                len: entry.body().len(),
                recency: entry.recency(),
            });
        }
        out
    }

    async fn position(&self, key: &str) -> Option<usize> {
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.entry.read().await.matches(key) {
                return Some(index);
            }
        }
        None
    }
}
