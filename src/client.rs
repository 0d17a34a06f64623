//! # Jira API Client
//!
//! Authenticated HTTP client for the Jira REST API. Responses are
//! normalized into [`ApiResponse`]: strict JSON where possible, raw XML for
//! legacy endpoints, absent otherwise. Transport failures never surface as
//! errors; they become a sentinel response carrying a 500-like status so
//! callers branch on status codes, not on caught errors.

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::cache::ResponseCache;
use crate::consts;

/// Basic-auth credentials for a Jira instance.
#[derive(Clone)]
pub struct JiraAuth {
  pub username: String,
  pub password: String,
}

/// Parsed body of a Jira response.
#[derive(Debug, Clone)]
pub enum ResponseBody {
  /// Strict JSON, remote key order preserved.
  Json(Value),
  /// A legacy XML document, kept raw for endpoint-specific scraping.
  Xml(String),
  /// The body was neither JSON nor XML.
  Absent,
}

/// Normalized response from the Jira API.
#[derive(Debug, Clone)]
pub struct ApiResponse {
  pub status: StatusCode,
  pub body: ResponseBody,
  /// Transport-level error message when no HTTP exchange completed.
  pub error: Option<String>,
}

impl ApiResponse {
  /// Sentinel response standing in for a failed transport-level exchange.
  fn transport_failure(message: String) -> Self {
    Self {
      status: StatusCode::INTERNAL_SERVER_ERROR,
      body: ResponseBody::Absent,
      error: Some(message),
    }
  }

  pub fn is_ok(&self) -> bool {
    self.status == StatusCode::OK
  }

  /// The parsed JSON payload, if the body was valid JSON.
  pub fn json(&self) -> Option<&Value> {
    match &self.body {
      ResponseBody::Json(value) => Some(value),
      _ => None,
    }
  }

  /// The raw XML document, if the body carried an XML prologue.
  pub fn xml(&self) -> Option<&str> {
    match &self.body {
      ResponseBody::Xml(document) => Some(document),
      _ => None,
    }
  }

  /// Deserialize the JSON payload into a typed model.
  pub fn json_as<T: DeserializeOwned>(&self) -> Option<T> {
    self.json().and_then(|value| serde_json::from_value(value.clone()).ok())
  }
}

/// Represents a Jira API client
pub struct JiraClient {
  pub(crate) client: Client,
  pub(crate) base_url: String,
  pub(crate) auth: JiraAuth,
  cache: ResponseCache,
}

impl JiraClient {
  /// Create a new Jira client
  pub fn new(base_url: &str, auth: JiraAuth) -> Self {
    let client = Client::new();
    Self {
      client,
      base_url: base_url.trim_end_matches('/').to_string(),
      auth,
      cache: ResponseCache::new(),
    }
  }

  pub fn username(&self) -> &str {
    &self.auth.username
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  /// Resolve a path or absolute URL against the instance, folding query
  /// parameters into the result. The absolute URL doubles as the cache key.
  fn absolute_url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, url::ParseError> {
    let raw = if path.starts_with("http://") || path.starts_with("https://") {
      path.to_string()
    } else {
      format!("{}{}", self.base_url, path)
    };

    let mut url = Url::parse(&raw)?;
    if !query.is_empty() {
      let mut pairs = url.query_pairs_mut();
      for (key, value) in query {
        pairs.append_pair(key, value);
      }
    }
    Ok(url)
  }

  /// Perform one authenticated GET request.
  pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> ApiResponse {
    let url = match self.absolute_url(path, query) {
      Ok(url) => url,
      Err(e) => return ApiResponse::transport_failure(format!("invalid request URL {path}: {e}")),
    };
    self.request(Method::GET, url, None).await
  }

  /// Perform one authenticated POST request with a JSON payload.
  pub async fn post(&self, path: &str, payload: &Value) -> ApiResponse {
    let url = match self.absolute_url(path, &[]) {
      Ok(url) => url,
      Err(e) => return ApiResponse::transport_failure(format!("invalid request URL {path}: {e}")),
    };
    self.request(Method::POST, url, Some(payload)).await
  }

  /// GET with the response cache consulted first. A hit within the TTL is
  /// returned without touching the network; fresh 200 responses are written
  /// back, anything else is re-fetched on the next call.
  pub async fn get_cached(&self, path: &str, query: &[(&str, &str)]) -> ApiResponse {
    let url = match self.absolute_url(path, query) {
      Ok(url) => url,
      Err(e) => return ApiResponse::transport_failure(format!("invalid request URL {path}: {e}")),
    };

    let key = url.to_string();
    if let Some(hit) = self.cache.get(&key) {
      debug!(url = %key, "serving cached response");
      return hit;
    }

    let response = self.request(Method::GET, url, None).await;
    self.cache.insert(&key, &response);
    response
  }

  async fn request(&self, method: Method, url: Url, payload: Option<&Value>) -> ApiResponse {
    let mut builder = self
      .client
      .request(method, url.clone())
      .basic_auth(&self.auth.username, Some(&self.auth.password))
      .header(CONTENT_TYPE, "application/json")
      .header(USER_AGENT, consts::USER_AGENT);
    if let Some(payload) = payload {
      builder = builder.json(payload);
    }

    let response = match builder.send().await {
      Ok(response) => response,
      Err(e) => {
        warn!(url = %url, error = %e, "request failed");
        return ApiResponse::transport_failure(e.to_string());
      }
    };

    let status = response.status();
    let text = match response.text().await {
      Ok(text) => text,
      Err(e) => {
        warn!(url = %url, error = %e, "failed to read response body");
        return ApiResponse::transport_failure(e.to_string());
      }
    };

    ApiResponse {
      status,
      body: parse_body(&text),
      error: None,
    }
  }
}

/// Strict JSON first; a body with an XML prologue is kept raw for legacy
/// endpoints; anything else is treated as absent.
fn parse_body(text: &str) -> ResponseBody {
  if let Ok(value) = serde_json::from_str::<Value>(text) {
    return ResponseBody::Json(value);
  }
  if text.trim_start().starts_with("<?xml") {
    return ResponseBody::Xml(text.to_string());
  }
  ResponseBody::Absent
}

/// Create a Jira client from credentials
pub fn create_jira_client(base_url: &str, username: &str, password: &str) -> JiraClient {
  let auth = JiraAuth {
    username: username.to_string(),
    password: password.to_string(),
  };

  JiraClient::new(base_url, auth)
}
