//! Typed errors for ingestion and cache queries.
//!
//! Collaborator layers (config, service, storage, CLI) report through
//! `color_eyre::Result`; the core keeps its failures typed so callers can
//! tell a cache miss apart from a malformed payload.

use thiserror::Error;

use crate::entities::EntityType;

/// Failure while turning a JSON:API document into a cache update.
///
/// Any of these aborts construction of the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
  #[error("document is malformed: {0}")]
  MalformedDocument(String),

  #[error("adapter for {expected:?} cannot process a {found:?} resource")]
  InvalidResourceTypeForAdapter {
    expected: EntityType,
    found: EntityType,
  },

  #[error("{entity:?} {id} has invalid or missing attributes: {reason}")]
  InvalidOrMissingAttributes {
    entity: EntityType,
    id: i64,
    reason: String,
  },

  #[error("{entity:?} {id} is missing its `{relationship}` relationship")]
  InvalidOrMissingRelationships {
    entity: EntityType,
    id: i64,
    relationship: &'static str,
  },
}

/// Failure of a cache query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
  /// The requested content ids have never been merged.
  #[error("cache miss for content {ids:?}")]
  CacheMiss { ids: Vec<i64> },
}

impl CacheError {
  pub fn miss(id: i64) -> Self {
    CacheError::CacheMiss { ids: vec![id] }
  }

  pub fn is_miss(&self) -> bool {
    matches!(self, CacheError::CacheMiss { .. })
  }
}
