//! HTTP client for the contents endpoints.

use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use tracing::debug;
use url::Url;

use crate::cache::CacheUpdate;
use crate::config::Config;
use crate::entities::EntityType;
use crate::jsonapi::parse_slice;
use crate::repository::{FetchResponse, Parameter};

const JSON_API: &str = "application/vnd.api+json; charset=UTF-8";

/// Contents API client
#[derive(Clone)]
pub struct ContentsService {
  client: reqwest::Client,
  base_url: Url,
}

impl ContentsService {
  pub fn new(config: &Config) -> Result<Self> {
    Self::with_token(config.api.url.clone(), Config::get_api_token())
  }

  pub fn with_token(base_url: Url, token: Option<String>) -> Result<Self> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(JSON_API));
    if let Some(token) = token {
      let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| eyre!("Invalid API token: {}", e))?;
      value.set_sensitive(true);
      headers.insert(AUTHORIZATION, value);
    }

    let client = reqwest::Client::builder()
      .default_headers(headers)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, base_url })
  }

  /// One page of the contents listing.
  pub async fn contents(&self, parameters: &[Parameter]) -> Result<FetchResponse> {
    let url = self.contents_url(parameters)?;
    let body = self.get(url).await?;
    response_from_body(&body)
  }

  /// A single content with everything its detail view joins.
  pub async fn content_details(&self, id: i64) -> Result<FetchResponse> {
    let url = self.endpoint(&format!("contents/{}", id))?;
    let body = self.get(url).await?;
    response_from_body(&body)
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    let mut base = self.base_url.clone();
    // Url::join replaces the last segment unless the base ends with '/'
    if !base.path().ends_with('/') {
      base.set_path(&format!("{}/", base.path()));
    }
    base
      .join(path)
      .map_err(|e| eyre!("Invalid endpoint {}: {}", path, e))
  }

  fn contents_url(&self, parameters: &[Parameter]) -> Result<Url> {
    let mut url = self.endpoint("contents")?;
    if !parameters.is_empty() {
      url
        .query_pairs_mut()
        .extend_pairs(parameters.iter().map(|p| (p.key.as_str(), p.value.as_str())));
    }
    Ok(url)
  }

  async fn get(&self, url: Url) -> Result<Vec<u8>> {
    debug!("GET {}", url);
    let response = self
      .client
      .get(url.clone())
      .send()
      .await
      .map_err(|e| eyre!("Request to {} failed: {}", url, e))?;

    let status = response.status();
    if !status.is_success() {
      return Err(eyre!("Request to {} returned {}", url, status));
    }

    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read response from {}: {}", url, e))?;
    Ok(body.to_vec())
  }
}

/// Decode a JSON:API body into the batch plus the primary contents in order.
pub fn response_from_body(body: &[u8]) -> Result<FetchResponse> {
  let document = parse_slice(body)?;
  let update = CacheUpdate::from_document(&document)?;

  let contents: Vec<_> = document
    .primary
    .iter()
    .filter(|identity| identity.entity_type == EntityType::Content)
    .filter_map(|identity| update.contents().iter().find(|c| c.id == identity.id))
    .cloned()
    .collect();

  let total_count = document
    .total_count
    .and_then(|total| usize::try_from(total).ok())
    .unwrap_or(contents.len());

  Ok(FetchResponse {
    contents,
    update,
    total_count,
  })
}
