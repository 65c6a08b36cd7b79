//! Relational entity cache.
//!
//! This module provides the in-memory store the rest of the client reads
//! from:
//! - Typed entity tables keyed by id, plus the relationship edge set
//! - Merge/upsert of [`CacheUpdate`] batches built from JSON:API documents
//! - Join resolution into summary (list row) and persistable (detail) views
//! - Live subscriptions re-emitting those views when their entities change
//! - A persistence collaborator for offline start

mod data_cache;
mod state;
mod storage;
mod subscription;
mod tables;
mod update;

pub use data_cache::DataCache;
pub use state::{ContentPersistableState, ContentSummaryState};
pub use storage::{CachedListing, NoopStore, PersistenceStore, SqliteStore};
pub use subscription::Subscription;
pub use tables::EntityCounts;
pub use update::CacheUpdate;
