//! Paginated content repository.
//!
//! A `ContentRepository` owns one listing (one set of filter parameters):
//! the page cursor, the ids fetched so far, the backend's total count, and a
//! live summary subscription to the shared [`DataCache`] for those ids.
//!
//! Fetches run on spawned tasks. Their results come back over a channel and
//! are applied only in [`ContentRepository::poll`] or
//! [`ContentRepository::settle`], so every state change happens on the
//! owner's task.
//!
//! # Example
//!
//! ```ignore
//! let service = service.clone();
//! let mut repository = ContentRepository::new(cache.clone(), filters, move |params| {
//!     let service = service.clone();
//!     async move { service.contents(&params).await.map_err(|e| e.to_string()) }
//! });
//!
//! repository.reload();
//! repository.settle().await;
//!
//! for row in repository.contents() {
//!     println!("{}", row.content.name);
//! }
//! ```

mod parameters;

pub use parameters::{listing_key, Parameter, START_PAGE};

use color_eyre::Result;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{
  CacheUpdate, ContentSummaryState, DataCache, PersistenceStore, Subscription,
};
use crate::entities::Content;

/// What a fetch hands back: typed contents in listing order, the batch to
/// merge, and the backend's total for the whole listing.
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
  pub contents: Vec<Content>,
  pub update: CacheUpdate,
  pub total_count: usize,
}

/// A boxed future that returns a Result<FetchResponse, String>
type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

/// Creates the future for one fetch from its parameter list
type FetcherFn = Box<dyn Fn(Vec<Parameter>) -> BoxFuture<FetchResponse> + Send + Sync>;

/// Pagination state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataState {
  /// Nothing requested yet
  Initial,
  /// First page in flight
  Loading,
  /// At least one page applied
  HasData,
  /// A further page in flight
  LoadingAdditional,
  /// The last fetch failed; previously tracked data is kept
  Failed,
}

impl DataState {
  pub fn is_loading(self) -> bool {
    matches!(self, DataState::Loading | DataState::LoadingAdditional)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
  Reload,
  LoadMore,
}

struct Completion {
  generation: u64,
  kind: FetchKind,
  result: Result<FetchResponse, String>,
}

/// A spawned fetch and the channel its result comes back on
struct InFlight {
  generation: u64,
  kind: FetchKind,
  handle: JoinHandle<()>,
  receiver: mpsc::UnboundedReceiver<Result<FetchResponse, String>>,
}

pub struct ContentRepository {
  cache: DataCache,
  fetcher: FetcherFn,
  non_pagination_parameters: Vec<Parameter>,

  state: DataState,
  error: Option<String>,
  current_page: u32,
  content_ids: Vec<i64>,
  total_content_num: usize,

  /// Bumped by every fetch; completions from older generations are dropped
  generation: u64,
  in_flight: Option<InFlight>,

  summaries: Option<Subscription<Vec<ContentSummaryState>>>,
  contents: Vec<ContentSummaryState>,
}

impl ContentRepository {
  /// Create a repository for one filter set.
  ///
  /// The fetcher is called with the full parameter list of each request.
  /// Nothing is fetched until [`reload`](Self::reload).
  pub fn new<F, Fut>(cache: DataCache, non_pagination_parameters: Vec<Parameter>, fetcher: F) -> Self
  where
    F: Fn(Vec<Parameter>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<FetchResponse, String>> + Send + 'static,
  {
    Self {
      cache,
      fetcher: Box::new(move |params| Box::pin(fetcher(params))),
      non_pagination_parameters,
      state: DataState::Initial,
      error: None,
      current_page: START_PAGE,
      content_ids: Vec::new(),
      total_content_num: 0,
      generation: 0,
      in_flight: None,
      summaries: None,
      contents: Vec::new(),
    }
  }

  pub fn state(&self) -> DataState {
    self.state
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  /// Message of the last failed fetch, cleared by the next success.
  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn current_page(&self) -> u32 {
    self.current_page
  }

  pub fn content_ids(&self) -> &[i64] {
    &self.content_ids
  }

  pub fn total_content_num(&self) -> usize {
    self.total_content_num
  }

  pub fn non_pagination_parameters(&self) -> &[Parameter] {
    &self.non_pagination_parameters
  }

  /// The latest summary rows pushed by the cache, in listing order.
  pub fn contents(&self) -> &[ContentSummaryState] {
    &self.contents
  }

  pub fn has_more(&self) -> bool {
    self.content_ids.len() < self.total_content_num
  }

  /// Fetch the first page again. No-op while a fetch is in flight.
  pub fn reload(&mut self) {
    if self.is_loading() {
      debug!("Ignoring reload while {:?}", self.state);
      return;
    }
    self.start_reload();
  }

  /// Fetch the next page. No-op while a fetch is in flight or once every
  /// item of the listing is tracked.
  pub fn load_more(&mut self) {
    if self.is_loading() {
      debug!("Ignoring load_more while {:?}", self.state);
      return;
    }
    if !self.has_more() {
      debug!(
        "Ignoring load_more, {} of {} loaded",
        self.content_ids.len(),
        self.total_content_num
      );
      return;
    }

    self.current_page += 1;
    self.state = DataState::LoadingAdditional;
    let mut params = self.non_pagination_parameters.clone();
    params.push(Parameter::page(self.current_page));
    self.start_fetch(FetchKind::LoadMore, params);
  }

  /// Replace the filter set. Always reloads, superseding any fetch in flight.
  pub fn set_non_pagination_parameters(&mut self, parameters: Vec<Parameter>) {
    self.non_pagination_parameters = parameters;
    if let Some(fetch) = self.in_flight.take() {
      debug!("Cancelling fetch of generation {}", fetch.generation);
      fetch.handle.abort();
    }
    self.start_reload();
  }

  fn start_reload(&mut self) {
    // The cursor restarts even though a failed reload keeps the old ids, so
    // the next load_more after such a failure asks for page 2 again.
    self.current_page = START_PAGE;
    self.state = DataState::Loading;
    let params = self.non_pagination_parameters.clone();
    self.start_fetch(FetchKind::Reload, params);
  }

  fn start_fetch(&mut self, kind: FetchKind, params: Vec<Parameter>) {
    self.generation += 1;
    let generation = self.generation;
    debug!(
      "Starting {:?} fetch, generation {}, page {}",
      kind, generation, self.current_page
    );

    let (tx, receiver) = mpsc::unbounded_channel();
    let future = (self.fetcher)(params);
    let handle = tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - the fetch may have been superseded
      let _ = tx.send(result);
    });
    self.in_flight = Some(InFlight {
      generation,
      kind,
      handle,
      receiver,
    });
  }

  /// Apply finished fetches and fresh cache emissions without waiting.
  ///
  /// Returns `true` if anything observable changed.
  pub fn poll(&mut self) -> bool {
    let changed = match self.in_flight.as_mut().map(|f| f.receiver.try_recv()) {
      None | Some(Err(TryRecvError::Empty)) => false,
      Some(received) => self.finish_fetch(received.ok()),
    };
    let refreshed = self.refresh_contents();
    changed || refreshed
  }

  /// Wait until no fetch is in flight, then apply everything pending.
  pub async fn settle(&mut self) -> bool {
    let mut changed = false;
    while let Some(fetch) = self.in_flight.as_mut() {
      let received = fetch.receiver.recv().await;
      changed |= self.finish_fetch(received);
    }
    let polled = self.poll();
    changed || polled
  }

  /// Apply the outcome of the fetch in flight. `None` means its task ended
  /// without sending, e.g. it panicked, which counts as a failed fetch.
  fn finish_fetch(&mut self, received: Option<Result<FetchResponse, String>>) -> bool {
    let Some(fetch) = self.in_flight.take() else {
      return false;
    };
    let result = received.unwrap_or_else(|| {
      warn!("Fetch of generation {} ended without a result", fetch.generation);
      Err("fetch task ended without a result".to_string())
    });
    self.apply(Completion {
      generation: fetch.generation,
      kind: fetch.kind,
      result,
    })
  }

  fn apply(&mut self, completion: Completion) -> bool {
    if completion.generation != self.generation {
      debug!(
        "Discarding stale completion of generation {} (current {})",
        completion.generation, self.generation
      );
      return false;
    }

    match (completion.kind, completion.result) {
      (FetchKind::Reload, Ok(response)) => {
        self.cache.merge(&response.update);
        self.content_ids = dedup_ids(response.contents.iter().map(|c| c.id));
        self.total_content_num = response.total_count;
        self.on_success();
      }
      (FetchKind::LoadMore, Ok(response)) => {
        self.cache.merge(&response.update);
        let mut known: HashSet<i64> = self.content_ids.iter().copied().collect();
        for content in &response.contents {
          if known.insert(content.id) {
            self.content_ids.push(content.id);
          }
        }
        self.total_content_num = response.total_count;
        self.on_success();
      }
      (FetchKind::Reload, Err(e)) => {
        warn!("Reload failed: {}", e);
        self.state = DataState::Failed;
        self.error = Some(e);
      }
      (FetchKind::LoadMore, Err(e)) => {
        warn!("Loading page {} failed: {}", self.current_page, e);
        self.current_page -= 1;
        self.state = DataState::Failed;
        self.error = Some(e);
      }
    }
    true
  }

  fn on_success(&mut self) {
    self.state = DataState::HasData;
    self.error = None;
    info!(
      "Listing has {} of {} contents (page {})",
      self.content_ids.len(),
      self.total_content_num,
      self.current_page
    );
    self.resubscribe();
  }

  /// Point the live summary view at the current id list.
  fn resubscribe(&mut self) {
    let mut subscription = self.cache.summary_state(self.content_ids.clone());
    match subscription.latest() {
      Some(Ok(states)) => self.contents = states,
      Some(Err(e)) => {
        warn!("Fetched contents are not resolvable: {}", e);
        self.state = DataState::Failed;
        self.error = Some(e.to_string());
      }
      None => {}
    }
    self.summaries = Some(subscription);
  }

  fn refresh_contents(&mut self) -> bool {
    let Some(subscription) = self.summaries.as_mut() else {
      return false;
    };
    match subscription.latest() {
      Some(Ok(states)) => {
        self.contents = states;
        true
      }
      Some(Err(e)) => {
        warn!("Summary subscription ended: {}", e);
        self.summaries = None;
        false
      }
      None => false,
    }
  }

  /// Save the tracked listing so it can be shown offline.
  pub fn persist_listing(&self, store: &dyn PersistenceStore) -> Result<()> {
    store.store_listing(
      &listing_key(&self.non_pagination_parameters),
      &self.content_ids,
      self.total_content_num,
      self.current_page,
    )
  }

  /// Restore a persisted listing whose contents are all in the cache.
  ///
  /// Returns `false` (and changes nothing) when no usable listing exists or
  /// a fetch is in flight.
  pub fn restore_listing(&mut self, store: &dyn PersistenceStore) -> Result<bool> {
    if self.is_loading() {
      return Ok(false);
    }
    let Some(listing) = store.load_listing(&listing_key(&self.non_pagination_parameters))? else {
      return Ok(false);
    };
    if !listing.ids.iter().all(|id| self.cache.contains(*id)) {
      debug!("Persisted listing references contents missing from the cache");
      return Ok(false);
    }

    self.content_ids = listing.ids;
    self.total_content_num = listing.total;
    self.current_page = listing.page;
    info!(
      "Restored listing cached at {} with {} contents",
      listing.cached_at,
      self.content_ids.len()
    );
    self.on_success();
    Ok(true)
  }
}

impl Drop for ContentRepository {
  fn drop(&mut self) {
    if let Some(fetch) = self.in_flight.take() {
      fetch.handle.abort();
    }
  }
}

impl std::fmt::Debug for ContentRepository {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ContentRepository")
      .field("state", &self.state)
      .field("current_page", &self.current_page)
      .field("content_ids", &self.content_ids.len())
      .field("total_content_num", &self.total_content_num)
      .field("generation", &self.generation)
      .finish_non_exhaustive()
  }
}

/// Keep the first occurrence of every id.
fn dedup_ids(ids: impl Iterator<Item = i64>) -> Vec<i64> {
  let mut seen = HashSet::new();
  ids.filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::test_support::{screencast_document, update_from};
  use crate::cache::SqliteStore;
  use serde_json::json;
  use std::sync::{Arc, Mutex};
  use tokio::sync::Semaphore;

  fn response(ids: std::ops::RangeInclusive<i64>, total: usize) -> FetchResponse {
    let update = ids
      .map(|id| update_from(screencast_document(id)))
      .fold(CacheUpdate::default(), CacheUpdate::merged_with);
    FetchResponse {
      contents: update.contents().to_vec(),
      update,
      total_count: total,
    }
  }

  fn page_of(params: &[Parameter]) -> u32 {
    params
      .iter()
      .find(|p| p.is_page())
      .and_then(|p| p.value.parse().ok())
      .unwrap_or(START_PAGE)
  }

  type Calls = Arc<Mutex<Vec<Vec<Parameter>>>>;

  /// 50 items in pages of 25. Fails every request while `fail` is set.
  fn paged_repository(cache: DataCache, fail: Arc<Mutex<bool>>) -> (ContentRepository, Calls) {
    let calls: Calls = Arc::default();
    let recorded = calls.clone();
    let repository = ContentRepository::new(cache, vec![Parameter::sort("-released_at")], move |params| {
      recorded.lock().unwrap().push(params.clone());
      let fail = *fail.lock().unwrap();
      async move {
        if fail {
          return Err("service unavailable".to_string());
        }
        let page = page_of(&params) as i64;
        let first = (page - 1) * 25 + 1;
        Ok(response(first..=first + 24, 50))
      }
    });
    (repository, calls)
  }

  #[tokio::test]
  async fn test_reload_then_load_more_to_the_end() {
    let cache = DataCache::new();
    let (mut repository, calls) = paged_repository(cache.clone(), Arc::default());
    assert_eq!(repository.state(), DataState::Initial);

    repository.reload();
    assert_eq!(repository.state(), DataState::Loading);
    repository.settle().await;
    assert_eq!(repository.state(), DataState::HasData);
    assert_eq!(repository.content_ids().len(), 25);
    assert_eq!(repository.total_content_num(), 50);
    assert_eq!(repository.contents().len(), 25);

    repository.load_more();
    assert_eq!(repository.state(), DataState::LoadingAdditional);
    repository.settle().await;
    assert_eq!(repository.content_ids().len(), 50);
    assert_eq!(repository.current_page(), 2);
    assert_eq!(repository.content_ids()[25], 26);

    // 50 >= 50: nothing more to fetch
    repository.load_more();
    assert_eq!(repository.state(), DataState::HasData);
    assert_eq!(repository.current_page(), 2);
    assert_eq!(calls.lock().unwrap().len(), 2);

    let calls = calls.lock().unwrap();
    assert_eq!(calls[0], vec![Parameter::sort("-released_at")]);
    assert_eq!(
      calls[1],
      vec![Parameter::sort("-released_at"), Parameter::page(2)]
    );
  }

  #[tokio::test]
  async fn test_requests_are_ignored_while_loading() {
    let gate = Arc::new(Semaphore::new(0));
    let calls = Arc::new(Mutex::new(0));
    let (gate_for_fetch, counter) = (gate.clone(), calls.clone());
    let mut repository = ContentRepository::new(DataCache::new(), Vec::new(), move |params| {
      *counter.lock().unwrap() += 1;
      let gate = gate_for_fetch.clone();
      async move {
        gate.acquire().await.map_err(|e| e.to_string())?.forget();
        let first = (page_of(&params) as i64 - 1) * 25 + 1;
        Ok(response(first..=first + 24, 50))
      }
    });

    repository.reload();
    repository.reload();
    repository.load_more();
    assert_eq!(repository.state(), DataState::Loading);
    assert_eq!(*calls.lock().unwrap(), 1);

    gate.add_permits(1);
    repository.settle().await;
    assert_eq!(repository.state(), DataState::HasData);

    repository.load_more();
    repository.load_more();
    repository.reload();
    assert_eq!(repository.state(), DataState::LoadingAdditional);
    assert_eq!(repository.current_page(), 2);
    assert_eq!(*calls.lock().unwrap(), 2);

    gate.add_permits(1);
    repository.settle().await;
    assert_eq!(repository.content_ids().len(), 50);
  }

  #[tokio::test]
  async fn test_failed_load_more_rolls_back() {
    let fail = Arc::new(Mutex::new(false));
    let (mut repository, _) = paged_repository(DataCache::new(), fail.clone());

    repository.reload();
    repository.settle().await;
    let ids_before = repository.content_ids().to_vec();

    *fail.lock().unwrap() = true;
    repository.load_more();
    assert_eq!(repository.current_page(), 2);
    repository.settle().await;

    assert_eq!(repository.state(), DataState::Failed);
    assert_eq!(repository.error(), Some("service unavailable"));
    assert_eq!(repository.current_page(), 1);
    assert_eq!(repository.content_ids(), ids_before.as_slice());
    assert_eq!(repository.total_content_num(), 50);

    // Retry succeeds from the same cursor
    *fail.lock().unwrap() = false;
    repository.load_more();
    repository.settle().await;
    assert_eq!(repository.current_page(), 2);
    assert_eq!(repository.content_ids().len(), 50);
    assert_eq!(repository.error(), None);
  }

  #[tokio::test]
  async fn test_failed_reload_keeps_previous_ids() {
    let fail = Arc::new(Mutex::new(false));
    let (mut repository, _) = paged_repository(DataCache::new(), fail.clone());

    repository.reload();
    repository.settle().await;
    repository.load_more();
    repository.settle().await;

    *fail.lock().unwrap() = true;
    repository.reload();
    repository.settle().await;

    assert_eq!(repository.state(), DataState::Failed);
    assert_eq!(repository.content_ids().len(), 50);
    assert_eq!(repository.current_page(), START_PAGE);
  }

  #[tokio::test]
  async fn test_first_reload_failure() {
    let (mut repository, _) = paged_repository(DataCache::new(), Arc::new(Mutex::new(true)));
    repository.reload();
    repository.settle().await;

    assert_eq!(repository.state(), DataState::Failed);
    assert!(repository.content_ids().is_empty());
    assert!(repository.contents().is_empty());
  }

  #[tokio::test]
  async fn test_panicking_fetch_fails_instead_of_hanging() {
    let calls = Arc::new(Mutex::new(0));
    let counter = calls.clone();
    let mut repository = ContentRepository::new(DataCache::new(), Vec::new(), move |params| {
      let call = {
        let mut calls = counter.lock().unwrap();
        *calls += 1;
        *calls
      };
      async move {
        // Every second request dies mid-flight
        if call % 2 == 0 {
          panic!("fetch task died");
        }
        let first = (page_of(&params) as i64 - 1) * 25 + 1;
        Ok(response(first..=first + 24, 50))
      }
    });

    repository.reload();
    repository.settle().await;
    assert_eq!(repository.state(), DataState::HasData);

    repository.load_more();
    tokio::time::timeout(std::time::Duration::from_secs(5), repository.settle())
      .await
      .unwrap();
    assert_eq!(repository.state(), DataState::Failed);
    assert!(repository.error().is_some());
    assert_eq!(repository.current_page(), START_PAGE);
    assert_eq!(repository.content_ids().len(), 25);

    // The next attempt goes out and succeeds
    repository.load_more();
    assert_eq!(repository.state(), DataState::LoadingAdditional);
    repository.settle().await;
    assert_eq!(repository.state(), DataState::HasData);
    assert_eq!(repository.content_ids().len(), 50);
    assert_eq!(*calls.lock().unwrap(), 3);
  }

  #[tokio::test]
  async fn test_poll_notices_a_dead_reload() {
    let mut repository = ContentRepository::new(DataCache::new(), Vec::new(), |_| async {
      if true {
        panic!("fetch task died");
      }
      Ok(FetchResponse::default())
    });

    repository.reload();
    while repository.is_loading() {
      tokio::task::yield_now().await;
      repository.poll();
    }
    assert_eq!(repository.state(), DataState::Failed);

    repository.reload();
    assert_eq!(repository.state(), DataState::Loading);
  }

  #[tokio::test]
  async fn test_failed_reload_restarts_the_page_cursor() {
    let fail = Arc::new(Mutex::new(false));
    let calls: Calls = Arc::default();
    let (failing, recorded) = (fail.clone(), calls.clone());
    let mut repository = ContentRepository::new(DataCache::new(), Vec::new(), move |params| {
      recorded.lock().unwrap().push(params.clone());
      let fail = *failing.lock().unwrap();
      async move {
        if fail {
          return Err("service unavailable".to_string());
        }
        let first = (page_of(&params) as i64 - 1) * 25 + 1;
        Ok(response(first..=first + 24, 75))
      }
    });

    repository.reload();
    repository.settle().await;
    repository.load_more();
    repository.settle().await;
    assert_eq!(repository.current_page(), 2);

    *fail.lock().unwrap() = true;
    repository.reload();
    repository.settle().await;
    assert_eq!(repository.state(), DataState::Failed);
    assert_eq!(repository.current_page(), START_PAGE);
    assert_eq!(repository.content_ids().len(), 50);

    // Paging resumes from the restarted cursor: page 2 again, nothing new
    *fail.lock().unwrap() = false;
    repository.load_more();
    repository.settle().await;
    assert_eq!(repository.current_page(), 2);
    assert_eq!(repository.content_ids().len(), 50);
    assert_eq!(calls.lock().unwrap().last().unwrap(), &vec![Parameter::page(2)]);

    repository.load_more();
    repository.settle().await;
    assert_eq!(repository.current_page(), 3);
    assert_eq!(repository.content_ids().len(), 75);
  }

  #[tokio::test]
  async fn test_changing_filters_reloads_once() {
    let cache = DataCache::new();
    let (mut repository, calls) = paged_repository(cache, Arc::default());
    repository.reload();
    repository.settle().await;
    repository.load_more();
    repository.settle().await;
    calls.lock().unwrap().clear();

    let filters = vec![Parameter::search("swift")];
    repository.set_non_pagination_parameters(filters.clone());
    assert_eq!(repository.state(), DataState::Loading);
    assert_eq!(repository.current_page(), START_PAGE);
    repository.settle().await;

    assert_eq!(*calls.lock().unwrap(), vec![filters]);
    assert_eq!(repository.content_ids().len(), 25);
  }

  #[tokio::test]
  async fn test_filter_change_supersedes_fetch_in_flight() {
    let gate = Arc::new(Semaphore::new(0));
    let gate_for_fetch = gate.clone();
    let mut repository = ContentRepository::new(DataCache::new(), Vec::new(), move |params| {
      let gate = gate_for_fetch.clone();
      async move {
        gate.acquire().await.map_err(|e| e.to_string())?.forget();
        if params.contains(&Parameter::search("kotlin")) {
          Ok(response(100..=101, 2))
        } else {
          Ok(response(1..=25, 50))
        }
      }
    });

    repository.reload();
    repository.set_non_pagination_parameters(vec![Parameter::search("kotlin")]);
    gate.add_permits(2);
    repository.settle().await;
    tokio::task::yield_now().await;
    repository.poll();

    assert_eq!(repository.content_ids(), &[100, 101]);
    assert_eq!(repository.total_content_num(), 2);
  }

  #[tokio::test]
  async fn test_stale_generation_is_discarded() {
    let (mut repository, _) = paged_repository(DataCache::new(), Arc::default());
    repository.reload();
    repository.settle().await;

    let stale = Completion {
      generation: repository.generation - 1,
      kind: FetchKind::Reload,
      result: Ok(response(200..=201, 2)),
    };
    assert!(!repository.apply(stale));
    assert_eq!(repository.content_ids().len(), 25);
  }

  #[tokio::test]
  async fn test_contents_follow_cache_updates() {
    let cache = DataCache::new();
    let (mut repository, _) = paged_repository(cache.clone(), Arc::default());
    repository.reload();
    repository.settle().await;
    assert!(!repository.poll());

    let mut renamed = screencast_document(3);
    renamed["data"][0]["attributes"]["name"] = json!("Renamed");
    cache.merge(&update_from(renamed));

    assert!(repository.poll());
    assert_eq!(repository.contents()[2].content.name, "Renamed");
    assert_eq!(cache.subscription_count(), 1);
  }

  #[tokio::test]
  async fn test_listing_survives_restart() {
    let store = SqliteStore::open_in_memory().unwrap();
    let cache = DataCache::new();
    let (mut repository, _) = paged_repository(cache.clone(), Arc::default());
    repository.reload();
    repository.settle().await;
    repository.persist_listing(&store).unwrap();
    let states: Vec<_> = repository
      .content_ids()
      .iter()
      .map(|id| cache.cached_content_persistable_state(*id).unwrap())
      .collect();
    store.save_states(&states).unwrap();

    let restored_cache = DataCache::new();
    restored_cache.merge(&store.load_update().unwrap());
    let (mut restored, calls) =
      paged_repository(restored_cache, Arc::new(Mutex::new(true)));

    assert!(restored.restore_listing(&store).unwrap());
    assert_eq!(restored.state(), DataState::HasData);
    assert_eq!(restored.content_ids(), repository.content_ids());
    assert_eq!(restored.contents().len(), 25);
    assert!(calls.lock().unwrap().is_empty());
  }
}
