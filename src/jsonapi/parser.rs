//! Flattens a JSON:API document into identified resources and edges.

use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::debug;

use super::document::{ApiDocument, ApiResource};
use crate::entities::{EntityIdentity, EntityRelationship, EntityType};
use crate::error::IngestError;

/// A resource with its type resolved and its id made numeric.
#[derive(Debug, Clone)]
pub struct Resource {
  pub identity: EntityIdentity,
  pub attributes: Map<String, Value>,
  /// Edges declared by this resource's own `relationships` member
  pub relationships: Vec<EntityRelationship>,
}

impl Resource {
  pub fn id(&self) -> i64 {
    self.identity.id
  }

  pub fn entity_type(&self) -> EntityType {
    self.identity.entity_type
  }
}

/// The flattened output of one document.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
  /// Identities of the primary `data` resources, in document order
  pub primary: Vec<EntityIdentity>,
  /// Primary then included resources, first occurrence wins
  pub resources: Vec<Resource>,
  /// Every edge: inline ones followed by any supplied out of band
  pub relationships: Vec<EntityRelationship>,
  pub total_count: Option<u64>,
}

impl ParsedDocument {
  /// Attach edges the caller already knows about but the payload doesn't
  /// express, e.g. a progression for a content that isn't in this document.
  pub fn with_relationships(
    mut self,
    additional: impl IntoIterator<Item = EntityRelationship>,
  ) -> Self {
    self.relationships.extend(additional);
    self
  }

  /// Attach resources delivered outside the document alongside their edges.
  pub fn with_resources(mut self, additional: impl IntoIterator<Item = Resource>) -> Self {
    for resource in additional {
      self.relationships.extend(resource.relationships.iter().cloned());
      self.resources.push(resource);
    }
    self
  }
}

/// Parse raw bytes into a flattened document.
pub fn parse_slice(bytes: &[u8]) -> Result<ParsedDocument, IngestError> {
  let document: ApiDocument =
    serde_json::from_slice(bytes).map_err(|e| IngestError::MalformedDocument(e.to_string()))?;
  parse_document(document)
}

pub fn parse_value(value: Value) -> Result<ParsedDocument, IngestError> {
  let document: ApiDocument =
    serde_json::from_value(value).map_err(|e| IngestError::MalformedDocument(e.to_string()))?;
  parse_document(document)
}

pub fn parse_document(document: ApiDocument) -> Result<ParsedDocument, IngestError> {
  let primary_resources = document.data.map(|d| d.into_vec()).unwrap_or_default();

  let mut parsed = ParsedDocument {
    total_count: document.meta.and_then(|m| m.total_result_count),
    ..Default::default()
  };
  let mut seen = HashSet::new();

  for (is_primary, api_resource) in primary_resources
    .into_iter()
    .map(|r| (true, r))
    .chain(document.included.into_iter().map(|r| (false, r)))
  {
    let Some(resource) = parse_resource(api_resource)? else {
      continue;
    };
    if is_primary {
      parsed.primary.push(resource.identity);
    }
    if seen.insert(resource.identity) {
      parsed
        .relationships
        .extend(resource.relationships.iter().cloned());
      parsed.resources.push(resource);
    }
  }

  Ok(parsed)
}

/// Returns `None` for type tags we cannot identify.
fn parse_resource(resource: ApiResource) -> Result<Option<Resource>, IngestError> {
  let Some(entity_type) = EntityType::from_tag(&resource.resource_type) else {
    debug!(
      "Skipping resource {} of unknown type {:?}",
      resource.id, resource.resource_type
    );
    return Ok(None);
  };
  let id = resource.id.as_i64().ok_or_else(|| {
    IngestError::MalformedDocument(format!(
      "{} resource has non-numeric id {:?}",
      resource.resource_type,
      resource.id.to_string()
    ))
  })?;
  let identity = EntityIdentity::new(id, entity_type);

  let mut relationships = Vec::new();
  for (name, relationship) in resource.relationships {
    let linkages = relationship.data.map(|d| d.into_vec()).unwrap_or_default();
    for linkage in linkages {
      let Some(target_type) = EntityType::from_tag(&linkage.resource_type) else {
        debug!(
          "Skipping `{}` edge from {:?} to unknown type {:?}",
          name, identity, linkage.resource_type
        );
        continue;
      };
      let target_id = linkage.id.as_i64().ok_or_else(|| {
        IngestError::MalformedDocument(format!(
          "`{}` linkage of {:?} has non-numeric id {:?}",
          name,
          identity,
          linkage.id.to_string()
        ))
      })?;
      relationships.push(EntityRelationship::new(
        name.clone(),
        identity,
        EntityIdentity::new(target_id, target_type),
      ));
    }
  }

  Ok(Some(Resource {
    identity,
    attributes: resource.attributes,
    relationships,
  }))
}
