//! A single cache slot's contents.

/// Eviction ordering value. Lower means older.
pub type Recency = i64;

/// Recency given to a slot at the moment it is written. Ageing only ever
/// decrements, so no aged slot can reach this value again.
pub const RECENCY_FRESH: Recency = Recency::MAX;

/// Contents of one slot. Free slots keep their buffers for reuse but never
/// match a lookup.
#[derive(Debug, Default)]
pub struct CacheEntry {
    key: String,
    body: Vec<u8>,
    recency: Recency,
    occupied: bool,
}

impl CacheEntry {
    pub fn is_occupied(&self) -> bool {
        self.occupied
    }

    pub fn key(&self) -> Option<&str> {
        self.occupied.then_some(self.key.as_str())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn recency(&self) -> Recency {
        self.recency
    }

    /// True only for an occupied slot holding exactly `key`.
    pub fn matches(&self, key: &str) -> bool {
        self.occupied && self.key == key
    }

    /// Overwrite the slot in place and mark it freshly used.
    pub(crate) fn fill(&mut self, key: &str, body: Vec<u8>) {
        self.key.clear();
        self.key.push_str(key);
        self.body = body;
        self.occupied = true;
        self.recency = RECENCY_FRESH;
    }

    /// Push an occupied slot one step towards eviction. Free slots are left alone.
    pub(crate) fn age(&mut self) {
        if self.occupied {
            self.recency = self.recency.saturating_sub(1);
        }
    }
}
