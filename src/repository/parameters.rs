//! Ordered key/value request parameters.

use sha2::{Digest, Sha256};

/// The first page a listing loads.
pub const START_PAGE: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
  pub key: String,
  pub value: String,
}

impl Parameter {
  pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      value: value.into(),
    }
  }

  /// Parse `key=value`, as given on the command line.
  pub fn parse(s: &str) -> Option<Self> {
    let (key, value) = s.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
      return None;
    }
    Some(Self::new(key, value.trim()))
  }

  /// A multi-valued filter, e.g. `filter[content_types][]=screencast`.
  pub fn filter(name: &str, value: impl Into<String>) -> Self {
    Self::new(format!("filter[{}][]", name), value)
  }

  pub fn search(term: impl Into<String>) -> Self {
    Self::new("filter[q]", term)
  }

  pub fn sort(field: impl Into<String>) -> Self {
    Self::new("sort", field)
  }

  pub fn page_size(size: u32) -> Self {
    Self::new("page[size]", size.to_string())
  }

  /// Only ever appended last, and only for pagination fetches.
  pub fn page(number: u32) -> Self {
    Self::new("page[number]", number.to_string())
  }

  pub fn is_page(&self) -> bool {
    self.key == "page[number]"
  }
}

/// Stable key for a filter set, used to persist the listing it produced.
pub fn listing_key(parameters: &[Parameter]) -> String {
  // SHA256 hash for stable, fixed-length keys. Every key and value is
  // length-prefixed so no two parameter lists share an input.
  let mut hasher = Sha256::new();
  for parameter in parameters.iter().filter(|p| !p.is_page()) {
    for part in [parameter.key.trim(), parameter.value.trim()] {
      hasher.update((part.len() as u64).to_le_bytes());
      hasher.update(part.as_bytes());
    }
  }
  hex::encode(hasher.finalize())
}
