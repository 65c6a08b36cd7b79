//! Entity identities, relationship edges and the typed entity values.

mod types;

pub use types::{
  Bookmark, Category, Content, ContentCategory, ContentDomain, ContentType, Difficulty, Domain,
  DomainLevel, Group, Progression,
};

use serde::{Deserialize, Serialize};

/// Every type tag the backend can send that we know how to identify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
  Content,
  Bookmark,
  Category,
  Domain,
  Group,
  Permission,
  Progression,
  Video,
  Attachment,
}

impl EntityType {
  /// Map a JSON:API `type` tag onto an entity type.
  pub fn from_tag(tag: &str) -> Option<Self> {
    let entity_type = match tag {
      "contents" => EntityType::Content,
      "bookmarks" => EntityType::Bookmark,
      "categories" => EntityType::Category,
      "domains" => EntityType::Domain,
      "groups" => EntityType::Group,
      "permissions" => EntityType::Permission,
      "progressions" => EntityType::Progression,
      "videos" => EntityType::Video,
      "attachments" => EntityType::Attachment,
      _ => return None,
    };
    Some(entity_type)
  }

  pub fn tag(self) -> &'static str {
    match self {
      EntityType::Content => "contents",
      EntityType::Bookmark => "bookmarks",
      EntityType::Category => "categories",
      EntityType::Domain => "domains",
      EntityType::Group => "groups",
      EntityType::Permission => "permissions",
      EntityType::Progression => "progressions",
      EntityType::Video => "videos",
      EntityType::Attachment => "attachments",
    }
  }
}

/// The universal join key: an integer id scoped by its entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityIdentity {
  pub id: i64,
  pub entity_type: EntityType,
}

impl EntityIdentity {
  pub const fn new(id: i64, entity_type: EntityType) -> Self {
    Self { id, entity_type }
  }

  pub const fn content(id: i64) -> Self {
    Self::new(id, EntityType::Content)
  }
}

/// A named, directed edge between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRelationship {
  pub name: String,
  pub from: EntityIdentity,
  pub to: EntityIdentity,
}

impl EntityRelationship {
  pub fn new(name: impl Into<String>, from: EntityIdentity, to: EntityIdentity) -> Self {
    Self {
      name: name.into(),
      from,
      to,
    }
  }
}
