//! Serde-deserializable types matching the JSON:API document shape.
//!
//! These stay untyped at the attribute level; the entity adapters turn
//! attribute maps into domain values.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// `data` members may hold one item or a list of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
  One(T),
  Many(Vec<T>),
}

impl<T> OneOrMany<T> {
  pub fn into_vec(self) -> Vec<T> {
    match self {
      OneOrMany::One(item) => vec![item],
      OneOrMany::Many(items) => items,
    }
  }
}

/// Resource ids are strings on the wire, but some endpoints send numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiId {
  Number(i64),
  Text(String),
}

impl ApiId {
  pub fn as_i64(&self) -> Option<i64> {
    match self {
      ApiId::Number(n) => Some(*n),
      ApiId::Text(s) => s.trim().parse().ok(),
    }
  }
}

impl std::fmt::Display for ApiId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ApiId::Number(n) => write!(f, "{}", n),
      ApiId::Text(s) => f.write_str(s),
    }
  }
}

// ============================================================================
// Top level document
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ApiDocument {
  #[serde(default)]
  pub data: Option<OneOrMany<ApiResource>>,
  #[serde(default)]
  pub included: Vec<ApiResource>,
  #[serde(default)]
  pub meta: Option<ApiMeta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiMeta {
  pub total_result_count: Option<u64>,
}

// ============================================================================
// Resources and linkage
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ApiResource {
  pub id: ApiId,
  #[serde(rename = "type")]
  pub resource_type: String,
  #[serde(default)]
  pub attributes: Map<String, Value>,
  #[serde(default)]
  pub relationships: BTreeMap<String, ApiRelationship>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiRelationship {
  #[serde(default)]
  pub data: Option<OneOrMany<ApiLinkage>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiLinkage {
  pub id: ApiId,
  #[serde(rename = "type")]
  pub resource_type: String,
}
