//! The shared in-memory store and its subscription registry.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::state::{ContentPersistableState, ContentSummaryState};
use super::subscription::Subscription;
use super::tables::{EntityCounts, Tables};
use super::update::CacheUpdate;
use crate::entities::{Content, EntityIdentity, EntityRelationship};
use crate::error::CacheError;

type Sender<T> = mpsc::UnboundedSender<Result<T, CacheError>>;

enum Watcher {
  Summary {
    ids: Vec<i64>,
    sender: Sender<Vec<ContentSummaryState>>,
  },
  Detail {
    id: i64,
    sender: Sender<ContentPersistableState>,
  },
}

impl Watcher {
  fn watches(&self, touched: &BTreeSet<i64>) -> bool {
    match self {
      Watcher::Summary { ids, .. } => ids.iter().any(|id| touched.contains(id)),
      Watcher::Detail { id, .. } => touched.contains(id),
    }
  }

  /// Push a fresh state. Returns `false` once the watcher should be dropped.
  fn notify(&self, tables: &Tables) -> bool {
    match self {
      Watcher::Summary { ids, sender } => {
        let state = tables.summary_states(ids);
        let ok = state.is_ok();
        sender.send(state).is_ok() && ok
      }
      Watcher::Detail { id, sender } => {
        let state = tables.persistable_state(*id);
        let ok = state.is_ok();
        sender.send(state).is_ok() && ok
      }
    }
  }
}

#[derive(Default)]
pub(super) struct CacheInner {
  tables: Tables,
  watchers: BTreeMap<u64, Watcher>,
  next_watcher_id: u64,
}

impl CacheInner {
  pub(super) fn unregister(&mut self, id: u64) {
    if self.watchers.remove(&id).is_some() {
      debug!("Subscription {} cancelled", id);
    }
  }

  fn notify(&mut self, touched: &BTreeSet<i64>) -> usize {
    let tables = &self.tables;
    let mut notified = 0;
    self.watchers.retain(|id, watcher| {
      if !watcher.watches(touched) {
        return true;
      }
      let alive = watcher.notify(tables);
      if alive {
        notified += 1;
      } else {
        debug!("Dropping closed subscription {}", id);
      }
      alive
    });
    notified
  }
}

/// Lock the cache, recovering the data if a previous holder panicked.
pub(super) fn lock(inner: &Mutex<CacheInner>) -> MutexGuard<'_, CacheInner> {
  inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to the single authoritative entity store.
///
/// Cloning the handle shares the store. All merges and notifications are
/// serialized by one lock.
#[derive(Clone, Default)]
pub struct DataCache {
  inner: Arc<Mutex<CacheInner>>,
}

impl DataCache {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, CacheInner> {
    lock(&self.inner)
  }

  /// Upsert a batch and push fresh states to every affected subscription.
  pub fn merge(&self, update: &CacheUpdate) {
    let mut inner = self.lock();
    let touched = inner.tables.merge(update);
    let notified = inner.notify(&touched);
    info!(
      "Merged {} contents, {} groups, {} relationships; {} content views affected, {} subscriptions notified",
      update.contents().len(),
      update.groups().len(),
      update.relationships().len(),
      touched.len(),
      notified
    );
  }

  /// Drop every entity and end every subscription, e.g. on logout.
  pub fn reset(&self) {
    let mut inner = self.lock();
    let watchers = inner.watchers.len();
    *inner = CacheInner {
      next_watcher_id: inner.next_watcher_id,
      ..Default::default()
    };
    info!("Cache reset, {} subscriptions ended", watchers);
  }

  /// Live list-row states for `ids`, always emitted in the order given.
  pub fn summary_state(&self, ids: Vec<i64>) -> Subscription<Vec<ContentSummaryState>> {
    let watched = ids.clone();
    self.subscribe(
      move |tables| tables.summary_states(&watched),
      move |sender| Watcher::Summary { ids, sender },
    )
  }

  /// Live detail state for one content.
  pub fn detail_state(&self, id: i64) -> Subscription<ContentPersistableState> {
    self.subscribe(
      move |tables| tables.persistable_state(id),
      move |sender| Watcher::Detail { id, sender },
    )
  }

  fn subscribe<T>(
    &self,
    evaluate: impl FnOnce(&Tables) -> Result<T, CacheError>,
    watcher: impl FnOnce(Sender<T>) -> Watcher,
  ) -> Subscription<T> {
    let (sender, receiver) = mpsc::unbounded_channel();
    let mut inner = self.lock();
    let id = inner.next_watcher_id;
    inner.next_watcher_id += 1;

    match evaluate(&inner.tables) {
      Ok(state) => {
        // The receiver is alive here, so this cannot fail
        let _ = sender.send(Ok(state));
        inner.watchers.insert(id, watcher(sender));
      }
      Err(e) => {
        debug!("Subscription {} terminated at start: {}", id, e);
        let _ = sender.send(Err(e));
      }
    }

    Subscription::new(id, receiver, Arc::downgrade(&self.inner))
  }

  /// Point read of a detail state. Use when the cache is known to be warm.
  pub fn cached_content_persistable_state(
    &self,
    id: i64,
  ) -> Result<ContentPersistableState, CacheError> {
    self.lock().tables.persistable_state(id)
  }

  pub fn cached_content_summary_state(&self, id: i64) -> Result<ContentSummaryState, CacheError> {
    self.lock().tables.summary_state(id)
  }

  pub fn content(&self, id: i64) -> Option<Content> {
    self.lock().tables.content(id).cloned()
  }

  pub fn contains(&self, id: i64) -> bool {
    self.lock().tables.contains(id)
  }

  pub fn relationships_from(&self, identity: &EntityIdentity) -> Vec<EntityRelationship> {
    self.lock().tables.relationships_from(identity).to_vec()
  }

  pub fn counts(&self) -> EntityCounts {
    self.lock().tables.counts()
  }

  pub fn subscription_count(&self) -> usize {
    self.lock().watchers.len()
  }
}

impl std::fmt::Debug for DataCache {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let inner = self.lock();
    f.debug_struct("DataCache")
      .field("counts", &inner.tables.counts())
      .field("subscriptions", &inner.watchers.len())
      .finish()
  }
}
