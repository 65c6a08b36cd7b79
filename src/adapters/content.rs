use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use super::{attributes, check_type, inverse_related_id, related_id, EntityAdapter};
use crate::entities::{Content, ContentType, Difficulty, EntityRelationship, EntityType};
use crate::error::IngestError;
use crate::jsonapi::Resource;

#[derive(Debug, Deserialize)]
struct ContentAttributes {
  uri: String,
  name: String,
  description_html: String,
  description_plain_text: String,
  released_at: DateTime<Utc>,
  free: bool,
  professional: bool,
  difficulty: Difficulty,
  content_type: ContentType,
  duration: i64,
  card_artwork_url: Option<Url>,
  technology_triple_string: Option<String>,
  contributor_string: Option<String>,
  video_identifier: Option<i64>,
  ordinal: Option<i64>,
}

pub struct ContentAdapter;

impl EntityAdapter for ContentAdapter {
  type Entity = Content;
  const ENTITY_TYPE: EntityType = EntityType::Content;

  fn process(
    resource: &Resource,
    relationships: &[EntityRelationship],
  ) -> Result<Content, IngestError> {
    check_type::<Self>(resource)?;
    let attrs: ContentAttributes = attributes(resource)?;

    // Episodes either name their group or are listed by it
    let group_id = related_id(resource, relationships, "group", EntityType::Group)
      .or_else(|| inverse_related_id(resource, relationships, EntityType::Group, "contents"));

    Ok(Content {
      id: resource.id(),
      uri: attrs.uri,
      name: attrs.name,
      description_html: attrs.description_html,
      description_plain_text: attrs.description_plain_text,
      released_at: attrs.released_at,
      free: attrs.free,
      professional: attrs.professional,
      difficulty: attrs.difficulty,
      content_type: attrs.content_type,
      duration: attrs.duration,
      card_artwork_url: attrs.card_artwork_url,
      technology_triple_string: attrs.technology_triple_string,
      contributor_string: attrs.contributor_string,
      video_identifier: attrs.video_identifier,
      ordinal: attrs.ordinal,
      group_id,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::adapters::fixtures::{content_attributes, resource};
  use crate::entities::EntityIdentity;
  use serde_json::json;

  #[test]
  fn test_screencast() {
    let resource = resource(
      42,
      EntityType::Content,
      content_attributes("Swift Generics", "screencast"),
    );
    let content = ContentAdapter::process(&resource, &[]).unwrap();

    assert_eq!(content.id, 42);
    assert_eq!(content.name, "Swift Generics");
    assert_eq!(content.content_type, ContentType::Screencast);
    assert_eq!(content.difficulty, Difficulty::Intermediate);
    assert_eq!(content.duration, 600);
    assert_eq!(
      content.card_artwork_url.as_ref().map(Url::as_str),
      Some("https://files.example.com/card.png")
    );
    assert_eq!(content.group_id, None);
  }

  #[test]
  fn test_group_from_inverse_edge() {
    let resource = resource(11, EntityType::Content, content_attributes("Episode", "episode"));
    let edges = vec![EntityRelationship::new(
      "contents",
      EntityIdentity::new(5, EntityType::Group),
      EntityIdentity::content(11),
    )];
    let content = ContentAdapter::process(&resource, &edges).unwrap();
    assert_eq!(content.group_id, Some(5));
  }

  #[test]
  fn test_group_from_own_edge() {
    let resource = resource(11, EntityType::Content, content_attributes("Episode", "episode"));
    let edges = vec![EntityRelationship::new(
      "group",
      EntityIdentity::content(11),
      EntityIdentity::new(6, EntityType::Group),
    )];
    let content = ContentAdapter::process(&resource, &edges).unwrap();
    assert_eq!(content.group_id, Some(6));
  }

  #[test]
  fn test_missing_attribute() {
    let mut attributes = content_attributes("Broken", "screencast");
    attributes.as_object_mut().unwrap().remove("released_at");
    let resource = resource(1, EntityType::Content, attributes);

    let err = ContentAdapter::process(&resource, &[]).unwrap_err();
    assert!(matches!(
      err,
      IngestError::InvalidOrMissingAttributes {
        entity: EntityType::Content,
        id: 1,
        ..
      }
    ));
  }

  #[test]
  fn test_unknown_enum_value_is_rejected() {
    let mut attributes = content_attributes("Broken", "screencast");
    attributes["difficulty"] = json!("expert");
    let resource = resource(1, EntityType::Content, attributes);

    assert!(matches!(
      ContentAdapter::process(&resource, &[]),
      Err(IngestError::InvalidOrMissingAttributes { .. })
    ));
  }

  #[test]
  fn test_wrong_resource_type() {
    let resource = resource(1, EntityType::Domain, json!({}));
    assert_eq!(
      ContentAdapter::process(&resource, &[]).unwrap_err(),
      IngestError::InvalidResourceTypeForAdapter {
        expected: EntityType::Content,
        found: EntityType::Domain,
      }
    );
  }
}
