//! Entity tables, join indexes and join resolution.
//!
//! This is the unsynchronized core of the cache; [`DataCache`](super::DataCache)
//! wraps it with locking and subscriptions.

use std::collections::{BTreeSet, HashMap};

use super::state::{ContentPersistableState, ContentSummaryState};
use super::update::CacheUpdate;
use crate::entities::{
  Bookmark, Category, Content, ContentCategory, ContentDomain, Domain, EntityIdentity,
  EntityRelationship, EntityType, Group, Progression,
};
use crate::error::CacheError;

/// Row counts per table, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityCounts {
  pub contents: usize,
  pub bookmarks: usize,
  pub progressions: usize,
  pub domains: usize,
  pub groups: usize,
  pub categories: usize,
  pub relationships: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Tables {
  contents: HashMap<i64, Content>,
  bookmarks: HashMap<i64, Bookmark>,
  progressions: HashMap<i64, Progression>,
  domains: HashMap<i64, Domain>,
  groups: HashMap<i64, Group>,
  categories: HashMap<i64, Category>,
  /// content id -> domain ids, in edge order
  content_domains: HashMap<i64, Vec<i64>>,
  /// content id -> category ids, in edge order
  content_categories: HashMap<i64, Vec<i64>>,
  relationships: HashMap<EntityIdentity, Vec<EntityRelationship>>,

  // Join indexes
  groups_by_content: HashMap<i64, BTreeSet<i64>>,
  contents_by_group: HashMap<i64, BTreeSet<i64>>,
  bookmark_by_content: HashMap<i64, i64>,
  progression_by_content: HashMap<i64, i64>,
}

/// Sort key putting explicit ordinals first, then falling back to id.
fn ordinal_key(ordinal: Option<i64>, id: i64) -> (bool, i64, i64) {
  (ordinal.is_none(), ordinal.unwrap_or_default(), id)
}

impl Tables {
  /// Upsert everything in `update` and return the content ids whose
  /// derived views may have changed.
  pub fn merge(&mut self, update: &CacheUpdate) -> BTreeSet<i64> {
    let mut touched = BTreeSet::new();

    // Relatives before the merge, so moved episodes refresh their old parent
    for content in &update.contents {
      touched.extend(self.neighbours(content.id));
    }
    for group in &update.groups {
      if let Some(old) = self.groups.get(&group.id) {
        touched.insert(old.content_id);
        touched.extend(self.contents_in_group(old.id));
      }
    }

    for content in &update.contents {
      self.upsert_content(content.clone());
      touched.insert(content.id);
    }
    for group in &update.groups {
      self.upsert_group(group.clone());
      touched.insert(group.content_id);
      touched.extend(self.contents_in_group(group.id));
    }
    for bookmark in &update.bookmarks {
      if let Some(old) = self.bookmarks.insert(bookmark.id, bookmark.clone()) {
        if self.bookmark_by_content.get(&old.content_id) == Some(&old.id) {
          self.bookmark_by_content.remove(&old.content_id);
        }
        touched.insert(old.content_id);
      }
      self
        .bookmark_by_content
        .insert(bookmark.content_id, bookmark.id);
      touched.insert(bookmark.content_id);
    }
    for progression in &update.progressions {
      if let Some(old) = self.progressions.insert(progression.id, progression.clone()) {
        if self.progression_by_content.get(&old.content_id) == Some(&old.id) {
          self.progression_by_content.remove(&old.content_id);
        }
        touched.insert(old.content_id);
      }
      self
        .progression_by_content
        .insert(progression.content_id, progression.id);
      touched.insert(progression.content_id);
    }
    for domain in &update.domains {
      self.domains.insert(domain.id, domain.clone());
    }
    for category in &update.categories {
      self.categories.insert(category.id, category.clone());
    }

    // Sources described in full lose their previous edges and junction rows
    for source in &update.edge_sources {
      self.relationships.insert(*source, Vec::new());
      if source.entity_type == EntityType::Content {
        let had_domains = self.content_domains.remove(&source.id).is_some();
        let had_categories = self.content_categories.remove(&source.id).is_some();
        if had_domains || had_categories {
          touched.insert(source.id);
        }
      }
    }
    for edge in &update.relationships {
      let edges = self.relationships.entry(edge.from).or_default();
      if !edges.contains(edge) {
        edges.push(edge.clone());
      }
    }
    for row in &update.content_domains {
      let ids = self.content_domains.entry(row.content_id).or_default();
      if !ids.contains(&row.domain_id) {
        ids.push(row.domain_id);
      }
      touched.insert(row.content_id);
    }
    for row in &update.content_categories {
      let ids = self.content_categories.entry(row.content_id).or_default();
      if !ids.contains(&row.category_id) {
        ids.push(row.category_id);
      }
      touched.insert(row.content_id);
    }

    for domain in &update.domains {
      touched.extend(
        self
          .content_domains
          .iter()
          .filter(|(_, ids)| ids.contains(&domain.id))
          .map(|(content_id, _)| *content_id),
      );
    }
    for category in &update.categories {
      touched.extend(
        self
          .content_categories
          .iter()
          .filter(|(_, ids)| ids.contains(&category.id))
          .map(|(content_id, _)| *content_id),
      );
    }

    // One level of parent/child join
    let direct: Vec<i64> = touched.iter().copied().collect();
    for id in direct {
      touched.extend(self.neighbours(id));
    }
    touched
  }

  fn upsert_content(&mut self, content: Content) {
    let id = content.id;
    let group_id = content.group_id;
    if let Some(old) = self.contents.insert(id, content) {
      if let Some(old_group) = old.group_id.filter(|g| Some(*g) != group_id) {
        if let Some(members) = self.contents_by_group.get_mut(&old_group) {
          members.remove(&id);
        }
      }
    }
    if let Some(group_id) = group_id {
      self
        .contents_by_group
        .entry(group_id)
        .or_default()
        .insert(id);
    }
  }

  fn upsert_group(&mut self, group: Group) {
    let id = group.id;
    let content_id = group.content_id;
    if let Some(old) = self.groups.insert(id, group) {
      if old.content_id != content_id {
        if let Some(owned) = self.groups_by_content.get_mut(&old.content_id) {
          owned.remove(&id);
        }
      }
    }
    self
      .groups_by_content
      .entry(content_id)
      .or_default()
      .insert(id);
  }

  /// Parent and child content ids of `id`, as far as the cache knows them.
  fn neighbours(&self, id: i64) -> Vec<i64> {
    let mut ids: Vec<i64> = self
      .contents
      .get(&id)
      .and_then(|c| self.parent_id(c))
      .into_iter()
      .collect();
    if let Some(group_ids) = self.groups_by_content.get(&id) {
      for group_id in group_ids {
        ids.extend(self.contents_in_group(*group_id));
      }
    }
    ids
  }

  fn contents_in_group(&self, group_id: i64) -> Vec<i64> {
    self
      .contents_by_group
      .get(&group_id)
      .map(|ids| ids.iter().copied().collect())
      .unwrap_or_default()
  }

  fn parent_id(&self, content: &Content) -> Option<i64> {
    let group_id = content.group_id?;
    self.groups.get(&group_id).map(|g| g.content_id)
  }

  pub fn contains(&self, id: i64) -> bool {
    self.contents.contains_key(&id)
  }

  pub fn content(&self, id: i64) -> Option<&Content> {
    self.contents.get(&id)
  }

  pub fn relationships_from(&self, identity: &EntityIdentity) -> &[EntityRelationship] {
    self
      .relationships
      .get(identity)
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  pub fn counts(&self) -> EntityCounts {
    EntityCounts {
      contents: self.contents.len(),
      bookmarks: self.bookmarks.len(),
      progressions: self.progressions.len(),
      domains: self.domains.len(),
      groups: self.groups.len(),
      categories: self.categories.len(),
      relationships: self.relationships.values().map(Vec::len).sum(),
    }
  }

  // ==========================================================================
  // Join resolution
  // ==========================================================================

  pub fn summary_state(&self, id: i64) -> Result<ContentSummaryState, CacheError> {
    let content = self.contents.get(&id).ok_or_else(|| CacheError::miss(id))?;
    Ok(ContentSummaryState {
      content: content.clone(),
      domains: self.domains_for(id).1,
      parent_content: self.parent_content(content),
      bookmark: self.bookmark_for(id),
      progression: self.progression_for(id),
    })
  }

  /// Summary states in the order of `ids`, or a miss naming every absent id.
  pub fn summary_states(&self, ids: &[i64]) -> Result<Vec<ContentSummaryState>, CacheError> {
    let missing: Vec<i64> = ids
      .iter()
      .copied()
      .filter(|id| !self.contains(*id))
      .collect();
    if !missing.is_empty() {
      return Err(CacheError::CacheMiss { ids: missing });
    }
    ids.iter().map(|id| self.summary_state(*id)).collect()
  }

  pub fn persistable_state(&self, id: i64) -> Result<ContentPersistableState, CacheError> {
    let content = self.contents.get(&id).ok_or_else(|| CacheError::miss(id))?;

    let groups = self.groups_for(id);
    let mut child_contents = Vec::new();
    for group in &groups {
      let mut children: Vec<&Content> = self
        .contents_in_group(group.id)
        .iter()
        .filter_map(|child_id| self.contents.get(child_id))
        .collect();
      children.sort_by_key(|c| ordinal_key(c.ordinal, c.id));
      child_contents.extend(children.into_iter().cloned());
    }

    let (content_domains, domains) = self.domains_for(id);
    let (content_categories, categories) = self.categories_for(id);

    Ok(ContentPersistableState {
      content: content.clone(),
      content_domains,
      domains,
      content_categories,
      categories,
      bookmark: self.bookmark_for(id),
      parent_content: self.parent_content(content),
      progression: self.progression_for(id),
      groups,
      child_contents,
    })
  }

  /// Best effort: the parent may live outside the cached window.
  fn parent_content(&self, content: &Content) -> Option<Content> {
    self
      .parent_id(content)
      .and_then(|parent_id| self.contents.get(&parent_id))
      .cloned()
  }

  fn groups_for(&self, content_id: i64) -> Vec<Group> {
    let mut groups: Vec<&Group> = self
      .groups_by_content
      .get(&content_id)
      .into_iter()
      .flatten()
      .filter_map(|group_id| self.groups.get(group_id))
      .collect();
    groups.sort_by_key(|g| ordinal_key(g.ordinal, g.id));
    groups.into_iter().cloned().collect()
  }

  fn bookmark_for(&self, content_id: i64) -> Option<Bookmark> {
    self
      .bookmark_by_content
      .get(&content_id)
      .and_then(|id| self.bookmarks.get(id))
      .cloned()
  }

  fn progression_for(&self, content_id: i64) -> Option<Progression> {
    self
      .progression_by_content
      .get(&content_id)
      .and_then(|id| self.progressions.get(id))
      .cloned()
  }

  fn domains_for(&self, content_id: i64) -> (Vec<ContentDomain>, Vec<Domain>) {
    let domain_ids = self
      .content_domains
      .get(&content_id)
      .map(Vec::as_slice)
      .unwrap_or(&[]);
    let rows = domain_ids
      .iter()
      .map(|domain_id| ContentDomain {
        content_id,
        domain_id: *domain_id,
      })
      .collect();
    let domains = domain_ids
      .iter()
      .filter_map(|domain_id| self.domains.get(domain_id))
      .cloned()
      .collect();
    (rows, domains)
  }

  fn categories_for(&self, content_id: i64) -> (Vec<ContentCategory>, Vec<Category>) {
    let category_ids = self
      .content_categories
      .get(&content_id)
      .map(Vec::as_slice)
      .unwrap_or(&[]);
    let rows = category_ids
      .iter()
      .map(|category_id| ContentCategory {
        content_id,
        category_id: *category_id,
      })
      .collect();
    let categories = category_ids
      .iter()
      .filter_map(|category_id| self.categories.get(category_id))
      .cloned()
      .collect();
    (rows, categories)
  }
}
