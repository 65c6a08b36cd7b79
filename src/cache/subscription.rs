//! Live views pushed by the cache.

use futures::Stream;
use std::pin::Pin;
use std::sync::{Mutex, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use super::data_cache::{lock, CacheInner};
use crate::error::CacheError;

/// A push-based view over the cache.
///
/// The first item is the state at subscribe time. A subscription that
/// starts with [`CacheError::CacheMiss`] is terminated and yields nothing
/// after it. Dropping (or [`cancel`](Self::cancel)ling) the subscription
/// removes it from the cache's registry; items already received stay valid.
pub struct Subscription<T> {
  id: u64,
  receiver: mpsc::UnboundedReceiver<Result<T, CacheError>>,
  registry: Weak<Mutex<CacheInner>>,
}

impl<T> Subscription<T> {
  pub(super) fn new(
    id: u64,
    receiver: mpsc::UnboundedReceiver<Result<T, CacheError>>,
    registry: Weak<Mutex<CacheInner>>,
  ) -> Self {
    Self {
      id,
      receiver,
      registry,
    }
  }

  /// Wait for the next emission. `None` once the subscription has ended.
  pub async fn next(&mut self) -> Option<Result<T, CacheError>> {
    self.receiver.recv().await
  }

  /// Take an emission if one is waiting.
  pub fn try_next(&mut self) -> Option<Result<T, CacheError>> {
    self.receiver.try_recv().ok()
  }

  /// Drain everything waiting and keep only the newest emission.
  pub fn latest(&mut self) -> Option<Result<T, CacheError>> {
    let mut latest = None;
    while let Ok(item) = self.receiver.try_recv() {
      latest = Some(item);
    }
    latest
  }

  pub fn cancel(self) {}
}

impl<T> Drop for Subscription<T> {
  fn drop(&mut self) {
    if let Some(inner) = self.registry.upgrade() {
      lock(&inner).unregister(self.id);
    }
  }
}

impl<T> Stream for Subscription<T> {
  type Item = Result<T, CacheError>;

  fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    self.receiver.poll_recv(cx)
  }
}

impl<T> std::fmt::Debug for Subscription<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("id", &self.id)
      .finish_non_exhaustive()
  }
}
