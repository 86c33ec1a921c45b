//! Object cache subsystem.
//!
//! # Data Flow
//! ```text
//! Connection handler
//!     → store.rs lookup (read-lock each slot in index order)
//!         hit  → CacheHit keeps the slot read-locked while the body is sent
//!         miss → handler fetches from origin
//!     → store.rs insert (after a complete, small-enough origin response)
//!         → eviction_candidate (first free slot, else lowest recency)
//!         → write-lock target, fill, age every other occupied slot
//! ```
//!
//! # Design Decisions
//! - Fixed slot count, fixed at construction; no total byte budget
//! - One readers-writer lock per slot, no cache-wide lock for readers
//! - Recency changes on insertion only; hits never write
//! - Slots are overwritten in place, never removed

pub mod entry;
pub mod store;

pub use entry::{CacheEntry, Recency, RECENCY_FRESH};
pub use store::{CacheError, CacheHit, ObjectCache, SlotSnapshot};
