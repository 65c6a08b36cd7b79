//! Derived join views over the cache. Never stored, always recomputed.

use serde::{Deserialize, Serialize};

use crate::entities::{
  Bookmark, Category, Content, ContentCategory, ContentDomain, Domain, Group, Progression,
};

/// The list-row view of a content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSummaryState {
  pub content: Content,
  pub domains: Vec<Domain>,
  pub parent_content: Option<Content>,
  pub bookmark: Option<Bookmark>,
  pub progression: Option<Progression>,
}

/// The detail-page view of a content. Everything needed to persist it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPersistableState {
  pub content: Content,
  pub content_domains: Vec<ContentDomain>,
  pub domains: Vec<Domain>,
  pub content_categories: Vec<ContentCategory>,
  pub categories: Vec<Category>,
  pub bookmark: Option<Bookmark>,
  pub parent_content: Option<Content>,
  pub progression: Option<Progression>,
  /// Groups owned by this content, ordered
  pub groups: Vec<Group>,
  /// Contents inside those groups, ordered by group then ordinal
  pub child_contents: Vec<Content>,
}

impl ContentPersistableState {
  pub fn summary(&self) -> ContentSummaryState {
    ContentSummaryState {
      content: self.content.clone(),
      domains: self.domains.clone(),
      parent_content: self.parent_content.clone(),
      bookmark: self.bookmark.clone(),
      progression: self.progression.clone(),
    }
  }
}
