//! Entity adapters: untyped resources in, typed entities out.
//!
//! Adapters are pure functions over a [`Resource`] and the edges visible in
//! the same document. Junction adapters never look at a resource and read
//! the edge list alone.

mod content;
mod records;

pub use content::ContentAdapter;
pub use records::{
  BookmarkAdapter, CategoryAdapter, ContentCategoryAdapter, ContentDomainAdapter, DomainAdapter,
  GroupAdapter, ProgressionAdapter,
};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::entities::{EntityRelationship, EntityType};
use crate::error::IngestError;
use crate::jsonapi::Resource;

/// Converts one resource of a fixed type into its entity.
pub trait EntityAdapter {
  type Entity;

  /// The only type tag this adapter accepts.
  const ENTITY_TYPE: EntityType;

  fn process(
    resource: &Resource,
    relationships: &[EntityRelationship],
  ) -> Result<Self::Entity, IngestError>;
}

/// Fail unless `resource` carries the adapter's type.
fn check_type<A: EntityAdapter>(resource: &Resource) -> Result<(), IngestError> {
  if resource.entity_type() == A::ENTITY_TYPE {
    Ok(())
  } else {
    Err(IngestError::InvalidResourceTypeForAdapter {
      expected: A::ENTITY_TYPE,
      found: resource.entity_type(),
    })
  }
}

/// Deserialize the attribute map into an adapter's attribute struct.
fn attributes<T: DeserializeOwned>(resource: &Resource) -> Result<T, IngestError> {
  serde_json::from_value(Value::Object(resource.attributes.clone())).map_err(|e| {
    IngestError::InvalidOrMissingAttributes {
      entity: resource.entity_type(),
      id: resource.id(),
      reason: e.to_string(),
    }
  })
}

/// Id of the `target` entity this resource points at through `name`.
fn related_id(
  resource: &Resource,
  relationships: &[EntityRelationship],
  name: &str,
  target: EntityType,
) -> Option<i64> {
  relationships
    .iter()
    .find(|r| r.from == resource.identity && r.name == name && r.to.entity_type == target)
    .map(|r| r.to.id)
}

/// Id of the `source` entity that points at this resource through `name`.
fn inverse_related_id(
  resource: &Resource,
  relationships: &[EntityRelationship],
  source: EntityType,
  name: &str,
) -> Option<i64> {
  relationships
    .iter()
    .find(|r| r.to == resource.identity && r.name == name && r.from.entity_type == source)
    .map(|r| r.from.id)
}
