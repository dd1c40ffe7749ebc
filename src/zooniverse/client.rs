use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::api_types::ApiSubject;
use super::auth::CredentialStore;
use super::types::SubjectDescriptor;
use crate::cache::traits::RemoteService;
use crate::error::{MirrorError, Result};

/// HTTP client for the Zooniverse subjects API and image hosts.
#[derive(Clone)]
pub struct ZooniverseClient {
  client: Client,
  subjects_url: Url,
  credentials: Arc<dyn CredentialStore>,
}

impl ZooniverseClient {
  pub fn new(subjects_url: &str, credentials: Arc<dyn CredentialStore>) -> Result<Self> {
    let subjects_url = Url::parse(subjects_url)
      .map_err(|e| MirrorError::Remote(format!("invalid subjects url {}: {}", subjects_url, e)))?;

    let mut headers = HeaderMap::new();
    headers.insert(
      USER_AGENT,
      HeaderValue::from_str(&format!("gzm/{}", env!("CARGO_PKG_VERSION")))
        .map_err(|e| MirrorError::Remote(e.to_string()))?,
    );
    let client = Client::builder()
      .default_headers(headers)
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| MirrorError::Remote(format!("failed to build http client: {}", e)))?;

    Ok(Self {
      client,
      subjects_url,
      credentials,
    })
  }

  /// `<subjects_url>?limit=N`, keeping any query the configured URL already has.
  fn subjects_endpoint(&self, limit: usize) -> Url {
    let mut url = self.subjects_url.clone();
    url.query_pairs_mut().append_pair("limit", &limit.to_string());
    url
  }

  fn get(&self, url: &str) -> RequestBuilder {
    let request = self.client.get(url);
    match self.credentials.current() {
      Some(login) => request.basic_auth(login.name, Some(login.api_key)),
      None => request,
    }
  }
}

#[async_trait]
impl RemoteService for ZooniverseClient {
  async fn fetch_subjects(&self, limit: usize) -> Result<Vec<SubjectDescriptor>> {
    let url = self.subjects_endpoint(limit);
    debug!(url = %url, "Requesting subjects");

    let response = self
      .get(url.as_str())
      .send()
      .await
      .and_then(|r| r.error_for_status())
      .map_err(|e| MirrorError::Remote(format!("subjects request failed: {}", e)))?;
    let body = response
      .bytes()
      .await
      .map_err(|e| MirrorError::Remote(format!("failed to read subjects: {}", e)))?;

    let subjects: Vec<ApiSubject> = serde_json::from_slice(&body)?;
    Ok(
      subjects
        .into_iter()
        .map(ApiSubject::into_descriptor)
        .collect(),
    )
  }

  async fn fetch_bytes(&self, uri: &str) -> Result<Vec<u8>> {
    let failure = |e: reqwest::Error| MirrorError::FetchFailure {
      uri: uri.to_string(),
      reason: e.to_string(),
    };
    let response = self
      .get(uri)
      .send()
      .await
      .and_then(|r| r.error_for_status())
      .map_err(failure)?;
    Ok(response.bytes().await.map_err(failure)?.to_vec())
  }
}
