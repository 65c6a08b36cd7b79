use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;

use super::{attributes, check_type, inverse_related_id, related_id, EntityAdapter};
use crate::entities::{
  Bookmark, Category, ContentCategory, ContentDomain, Domain, DomainLevel, EntityRelationship,
  EntityType, Group, Progression,
};
use crate::error::IngestError;
use crate::jsonapi::Resource;

/// Content id a user record belongs to, read from either direction.
fn owning_content_id(
  resource: &Resource,
  relationships: &[EntityRelationship],
  inverse_name: &str,
) -> Result<i64, IngestError> {
  related_id(resource, relationships, "content", EntityType::Content)
    .or_else(|| inverse_related_id(resource, relationships, EntityType::Content, inverse_name))
    .ok_or(IngestError::InvalidOrMissingRelationships {
      entity: resource.entity_type(),
      id: resource.id(),
      relationship: "content",
    })
}

// ============================================================================
// Bookmarks and progressions
// ============================================================================

#[derive(Debug, Deserialize)]
struct BookmarkAttributes {
  created_at: DateTime<Utc>,
}

pub struct BookmarkAdapter;

impl EntityAdapter for BookmarkAdapter {
  type Entity = Bookmark;
  const ENTITY_TYPE: EntityType = EntityType::Bookmark;

  fn process(
    resource: &Resource,
    relationships: &[EntityRelationship],
  ) -> Result<Bookmark, IngestError> {
    check_type::<Self>(resource)?;
    let attrs: BookmarkAttributes = attributes(resource)?;
    Ok(Bookmark {
      id: resource.id(),
      created_at: attrs.created_at,
      content_id: owning_content_id(resource, relationships, "bookmark")?,
    })
  }
}

#[derive(Debug, Deserialize)]
struct ProgressionAttributes {
  target: i64,
  progress: i64,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

pub struct ProgressionAdapter;

impl EntityAdapter for ProgressionAdapter {
  type Entity = Progression;
  const ENTITY_TYPE: EntityType = EntityType::Progression;

  fn process(
    resource: &Resource,
    relationships: &[EntityRelationship],
  ) -> Result<Progression, IngestError> {
    check_type::<Self>(resource)?;
    let attrs: ProgressionAttributes = attributes(resource)?;
    Ok(Progression {
      id: resource.id(),
      target: attrs.target,
      progress: attrs.progress,
      created_at: attrs.created_at,
      updated_at: attrs.updated_at,
      content_id: owning_content_id(resource, relationships, "progression")?,
    })
  }
}

// ============================================================================
// Catalog records
// ============================================================================

#[derive(Debug, Deserialize)]
struct DomainAttributes {
  name: String,
  slug: String,
  description: Option<String>,
  level: DomainLevel,
  ordinal: Option<i64>,
}

pub struct DomainAdapter;

impl EntityAdapter for DomainAdapter {
  type Entity = Domain;
  const ENTITY_TYPE: EntityType = EntityType::Domain;

  fn process(resource: &Resource, _: &[EntityRelationship]) -> Result<Domain, IngestError> {
    check_type::<Self>(resource)?;
    let attrs: DomainAttributes = attributes(resource)?;
    Ok(Domain {
      id: resource.id(),
      name: attrs.name,
      slug: attrs.slug,
      description: attrs.description,
      level: attrs.level,
      ordinal: attrs.ordinal,
    })
  }
}

#[derive(Debug, Deserialize)]
struct CategoryAttributes {
  name: String,
  uri: String,
  ordinal: Option<i64>,
}

pub struct CategoryAdapter;

impl EntityAdapter for CategoryAdapter {
  type Entity = Category;
  const ENTITY_TYPE: EntityType = EntityType::Category;

  fn process(resource: &Resource, _: &[EntityRelationship]) -> Result<Category, IngestError> {
    check_type::<Self>(resource)?;
    let attrs: CategoryAttributes = attributes(resource)?;
    Ok(Category {
      id: resource.id(),
      name: attrs.name,
      uri: attrs.uri,
      ordinal: attrs.ordinal,
    })
  }
}

#[derive(Debug, Deserialize)]
struct GroupAttributes {
  name: String,
  description: Option<String>,
  ordinal: Option<i64>,
}

pub struct GroupAdapter;

impl EntityAdapter for GroupAdapter {
  type Entity = Group;
  const ENTITY_TYPE: EntityType = EntityType::Group;

  fn process(
    resource: &Resource,
    relationships: &[EntityRelationship],
  ) -> Result<Group, IngestError> {
    check_type::<Self>(resource)?;
    let attrs: GroupAttributes = attributes(resource)?;
    Ok(Group {
      id: resource.id(),
      name: attrs.name,
      description: attrs.description,
      ordinal: attrs.ordinal,
      content_id: owning_content_id(resource, relationships, "groups")?,
    })
  }
}

// ============================================================================
// Junction rows
// ============================================================================

pub struct ContentDomainAdapter;

impl ContentDomainAdapter {
  /// One row per distinct content → domain edge.
  pub fn process(relationships: &[EntityRelationship]) -> Vec<ContentDomain> {
    let mut seen = HashSet::new();
    relationships
      .iter()
      .filter(|r| {
        r.from.entity_type == EntityType::Content && r.to.entity_type == EntityType::Domain
      })
      .map(|r| ContentDomain {
        content_id: r.from.id,
        domain_id: r.to.id,
      })
      .filter(|row| seen.insert(*row))
      .collect()
  }
}

pub struct ContentCategoryAdapter;

impl ContentCategoryAdapter {
  /// One row per distinct content → category edge.
  pub fn process(relationships: &[EntityRelationship]) -> Vec<ContentCategory> {
    let mut seen = HashSet::new();
    relationships
      .iter()
      .filter(|r| {
        r.from.entity_type == EntityType::Content && r.to.entity_type == EntityType::Category
      })
      .map(|r| ContentCategory {
        content_id: r.from.id,
        category_id: r.to.id,
      })
      .filter(|row| seen.insert(*row))
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::adapters::fixtures::resource;
  use crate::entities::EntityIdentity;
  use serde_json::json;

  fn edge(name: &str, from: EntityIdentity, to: EntityIdentity) -> EntityRelationship {
    EntityRelationship::new(name, from, to)
  }

  #[test]
  fn test_bookmark_with_content() {
    let resource = resource(
      3,
      EntityType::Bookmark,
      json!({ "created_at": "2020-02-01T00:00:00Z" }),
    );
    let edges = vec![edge(
      "content",
      EntityIdentity::new(3, EntityType::Bookmark),
      EntityIdentity::content(42),
    )];
    let bookmark = BookmarkAdapter::process(&resource, &edges).unwrap();
    assert_eq!(bookmark.id, 3);
    assert_eq!(bookmark.content_id, 42);
  }

  #[test]
  fn test_bookmark_without_content_fails() {
    let resource = resource(
      3,
      EntityType::Bookmark,
      json!({ "created_at": "2020-02-01T00:00:00Z" }),
    );
    assert_eq!(
      BookmarkAdapter::process(&resource, &[]).unwrap_err(),
      IngestError::InvalidOrMissingRelationships {
        entity: EntityType::Bookmark,
        id: 3,
        relationship: "content",
      }
    );
  }

  #[test]
  fn test_progression_from_inverse_edge() {
    let resource = resource(
      8,
      EntityType::Progression,
      json!({
        "target": 600,
        "progress": 300,
        "created_at": "2020-02-01T00:00:00Z",
        "updated_at": "2020-02-02T00:00:00Z"
      }),
    );
    let edges = vec![edge(
      "progression",
      EntityIdentity::content(42),
      EntityIdentity::new(8, EntityType::Progression),
    )];
    let progression = ProgressionAdapter::process(&resource, &edges).unwrap();
    assert_eq!(progression.content_id, 42);
    assert_eq!(progression.proportion(), 0.5);
  }

  #[test]
  fn test_group_requires_content() {
    let resource = resource(5, EntityType::Group, json!({ "name": "Part 1" }));
    assert!(matches!(
      GroupAdapter::process(&resource, &[]),
      Err(IngestError::InvalidOrMissingRelationships {
        relationship: "content",
        ..
      })
    ));

    let edges = vec![edge(
      "groups",
      EntityIdentity::content(10),
      EntityIdentity::new(5, EntityType::Group),
    )];
    let group = GroupAdapter::process(&resource, &edges).unwrap();
    assert_eq!(group.content_id, 10);
    assert_eq!(group.name, "Part 1");
  }

  #[test]
  fn test_domain_level() {
    let resource = resource(
      1,
      EntityType::Domain,
      json!({ "name": "iOS & Swift", "slug": "ios", "level": "production", "ordinal": 1 }),
    );
    let domain = DomainAdapter::process(&resource, &[]).unwrap();
    assert_eq!(domain.level, DomainLevel::Production);
    assert_eq!(domain.description, None);

    let bad = resource_with_level("galactic");
    assert!(matches!(
      DomainAdapter::process(&bad, &[]),
      Err(IngestError::InvalidOrMissingAttributes { .. })
    ));
  }

  fn resource_with_level(level: &str) -> Resource {
    resource(
      2,
      EntityType::Domain,
      json!({ "name": "x", "slug": "x", "level": level }),
    )
  }

  #[test]
  fn test_category_rejects_wrong_shape() {
    let resource = resource(4, EntityType::Category, json!({ "name": 12, "uri": "x" }));
    assert!(matches!(
      CategoryAdapter::process(&resource, &[]),
      Err(IngestError::InvalidOrMissingAttributes { .. })
    ));
  }

  #[test]
  fn test_junction_rows_from_edges() {
    let edges = vec![
      edge(
        "domains",
        EntityIdentity::content(1),
        EntityIdentity::new(7, EntityType::Domain),
      ),
      edge(
        "domains",
        EntityIdentity::content(1),
        EntityIdentity::new(7, EntityType::Domain),
      ),
      edge(
        "categories",
        EntityIdentity::content(1),
        EntityIdentity::new(9, EntityType::Category),
      ),
      edge(
        "content",
        EntityIdentity::new(7, EntityType::Domain),
        EntityIdentity::content(1),
      ),
    ];

    assert_eq!(
      ContentDomainAdapter::process(&edges),
      vec![ContentDomain {
        content_id: 1,
        domain_id: 7
      }]
    );
    assert_eq!(
      ContentCategoryAdapter::process(&edges),
      vec![ContentCategory {
        content_id: 1,
        category_id: 9
      }]
    );
  }
}
