use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Level of expertise a piece of content assumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Beginner,
  Intermediate,
  Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
  Screencast,
  Collection,
  Episode,
  Product,
  Article,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainLevel {
  Production,
  Beta,
  Blog,
  Retired,
  Archive,
}

/// A screencast, collection, episode or article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
  pub id: i64,
  pub uri: String,
  pub name: String,
  pub description_html: String,
  pub description_plain_text: String,
  pub released_at: DateTime<Utc>,
  pub free: bool,
  pub professional: bool,
  pub difficulty: Difficulty,
  pub content_type: ContentType,
  /// Seconds
  pub duration: i64,
  pub card_artwork_url: Option<Url>,
  pub technology_triple_string: Option<String>,
  pub contributor_string: Option<String>,
  pub video_identifier: Option<i64>,
  pub ordinal: Option<i64>,
  /// Group this content sits in when it is an episode of a collection
  pub group_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
  pub id: i64,
  pub created_at: DateTime<Utc>,
  pub content_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
  pub id: i64,
  pub target: i64,
  pub progress: i64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub content_id: i64,
}

impl Progression {
  /// Fraction watched, clamped to `0.0..=1.0`.
  pub fn proportion(&self) -> f64 {
    if self.target <= 0 {
      return 0.0;
    }
    (self.progress as f64 / self.target as f64).clamp(0.0, 1.0)
  }

  pub fn finished(&self) -> bool {
    self.target > 0 && self.progress >= self.target
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
  pub id: i64,
  pub name: String,
  pub slug: String,
  pub description: Option<String>,
  pub level: DomainLevel,
  pub ordinal: Option<i64>,
}

/// A container of child contents, owned by a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
  pub id: i64,
  pub name: String,
  pub description: Option<String>,
  pub ordinal: Option<i64>,
  /// The collection this group belongs to
  pub content_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
  pub id: i64,
  pub name: String,
  pub uri: String,
  pub ordinal: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentCategory {
  pub content_id: i64,
  pub category_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDomain {
  pub content_id: i64,
  pub domain_id: i64,
}
