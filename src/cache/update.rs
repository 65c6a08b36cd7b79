//! The immutable batch handed to [`DataCache::merge`](super::DataCache::merge).

use std::collections::BTreeSet;
use tracing::debug;

use super::state::ContentPersistableState;
use crate::adapters::{
  BookmarkAdapter, CategoryAdapter, ContentAdapter, ContentCategoryAdapter, ContentDomainAdapter,
  DomainAdapter, EntityAdapter, GroupAdapter, ProgressionAdapter,
};
use crate::entities::{
  Bookmark, Category, Content, ContentCategory, ContentDomain, Domain, EntityIdentity,
  EntityRelationship, EntityType, Group, Progression,
};
use crate::error::IngestError;
use crate::jsonapi::ParsedDocument;

/// Typed entities and edges from one response, ready to merge.
///
/// `edge_sources` lists the identities whose outgoing edges this batch
/// describes in full. Merging replaces the stored edges (and junction rows)
/// of those sources; edges from any other source are added alongside what
/// the cache already holds.
#[derive(Debug, Clone, Default)]
pub struct CacheUpdate {
  pub(crate) contents: Vec<Content>,
  pub(crate) bookmarks: Vec<Bookmark>,
  pub(crate) progressions: Vec<Progression>,
  pub(crate) domains: Vec<Domain>,
  pub(crate) groups: Vec<Group>,
  pub(crate) categories: Vec<Category>,
  pub(crate) content_domains: Vec<ContentDomain>,
  pub(crate) content_categories: Vec<ContentCategory>,
  pub(crate) relationships: Vec<EntityRelationship>,
  pub(crate) edge_sources: BTreeSet<EntityIdentity>,
}

impl CacheUpdate {
  /// Run every resource through its adapter. The first failure aborts the
  /// whole batch.
  pub fn from_document(document: &ParsedDocument) -> Result<Self, IngestError> {
    let edges = &document.relationships;
    let mut update = CacheUpdate::default();

    for resource in &document.resources {
      update.edge_sources.insert(resource.identity);
      match resource.entity_type() {
        EntityType::Content => update
          .contents
          .push(ContentAdapter::process(resource, edges)?),
        EntityType::Bookmark => update
          .bookmarks
          .push(BookmarkAdapter::process(resource, edges)?),
        EntityType::Progression => update
          .progressions
          .push(ProgressionAdapter::process(resource, edges)?),
        EntityType::Domain => update
          .domains
          .push(DomainAdapter::process(resource, edges)?),
        EntityType::Group => update.groups.push(GroupAdapter::process(resource, edges)?),
        EntityType::Category => update
          .categories
          .push(CategoryAdapter::process(resource, edges)?),
        EntityType::Permission | EntityType::Video | EntityType::Attachment => {
          debug!(
            "No adapter for {:?}, keeping edges only",
            resource.identity
          );
        }
      }
    }

    update.content_domains = ContentDomainAdapter::process(edges);
    update.content_categories = ContentCategoryAdapter::process(edges);
    update.relationships = edges.clone();

    Ok(update)
  }

  /// Concatenate two batches; `other` wins on conflicting ids when merged.
  pub fn merged_with(mut self, other: CacheUpdate) -> Self {
    self.contents.extend(other.contents);
    self.bookmarks.extend(other.bookmarks);
    self.progressions.extend(other.progressions);
    self.domains.extend(other.domains);
    self.groups.extend(other.groups);
    self.categories.extend(other.categories);
    self.content_domains.extend(other.content_domains);
    self.content_categories.extend(other.content_categories);
    self.relationships.extend(other.relationships);
    self.edge_sources.extend(other.edge_sources);
    self
  }

  pub fn is_empty(&self) -> bool {
    self.contents.is_empty()
      && self.bookmarks.is_empty()
      && self.progressions.is_empty()
      && self.domains.is_empty()
      && self.groups.is_empty()
      && self.categories.is_empty()
      && self.content_domains.is_empty()
      && self.content_categories.is_empty()
      && self.relationships.is_empty()
  }

  pub fn contents(&self) -> &[Content] {
    &self.contents
  }

  pub fn bookmarks(&self) -> &[Bookmark] {
    &self.bookmarks
  }

  pub fn progressions(&self) -> &[Progression] {
    &self.progressions
  }

  pub fn domains(&self) -> &[Domain] {
    &self.domains
  }

  pub fn groups(&self) -> &[Group] {
    &self.groups
  }

  pub fn categories(&self) -> &[Category] {
    &self.categories
  }

  pub fn content_domains(&self) -> &[ContentDomain] {
    &self.content_domains
  }

  pub fn content_categories(&self) -> &[ContentCategory] {
    &self.content_categories
  }

  pub fn relationships(&self) -> &[EntityRelationship] {
    &self.relationships
  }
}

/// Rebuild a batch from a persisted detail view, e.g. to seed the cache at
/// startup. Only the state's own content is authoritative for its edges.
impl From<ContentPersistableState> for CacheUpdate {
  fn from(state: ContentPersistableState) -> Self {
    let source = EntityIdentity::content(state.content.id);
    let mut relationships = Vec::new();
    for row in &state.content_domains {
      relationships.push(EntityRelationship::new(
        "domains",
        source,
        EntityIdentity::new(row.domain_id, EntityType::Domain),
      ));
    }
    for row in &state.content_categories {
      relationships.push(EntityRelationship::new(
        "categories",
        source,
        EntityIdentity::new(row.category_id, EntityType::Category),
      ));
    }
    for group in &state.groups {
      relationships.push(EntityRelationship::new(
        "groups",
        source,
        EntityIdentity::new(group.id, EntityType::Group),
      ));
    }
    if let Some(bookmark) = &state.bookmark {
      relationships.push(EntityRelationship::new(
        "bookmark",
        source,
        EntityIdentity::new(bookmark.id, EntityType::Bookmark),
      ));
    }
    if let Some(progression) = &state.progression {
      relationships.push(EntityRelationship::new(
        "progression",
        source,
        EntityIdentity::new(progression.id, EntityType::Progression),
      ));
    }

    let mut contents = vec![state.content];
    contents.extend(state.parent_content);
    contents.extend(state.child_contents);

    CacheUpdate {
      contents,
      bookmarks: state.bookmark.into_iter().collect(),
      progressions: state.progression.into_iter().collect(),
      domains: state.domains,
      groups: state.groups,
      categories: state.categories,
      content_domains: state.content_domains,
      content_categories: state.content_categories,
      relationships,
      edge_sources: BTreeSet::from([source]),
    }
  }
}
