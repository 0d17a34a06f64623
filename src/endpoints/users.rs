//! # User Autocomplete Endpoint
//!
//! Proxies the autocomplete URL a user-picker field descriptor carries and
//! normalizes the result. Modern instances answer with a JSON picker body;
//! legacy instances answer with an XML document that gets scraped.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::client::JiraClient;
use crate::models::UserSuggestion;

// Matches one user item out of the legacy XML picker document.
static LEGACY_USER_PATTERN: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r#"<user\s+name="([^"]*)"[^>]*>([^<]*)</user>"#).expect("Failed to compile legacy user picker regex"));

impl JiraClient {
  /// Query a user-picker autocomplete URL and normalize the suggestions.
  ///
  /// The URL comes straight from a field descriptor's `autoCompleteUrl` and
  /// conventionally ends in `username=` or `query=`, so the partial query is
  /// appended verbatim. Responses are cached like any other GET.
  pub async fn search_users(&self, autocomplete_url: &str, query: &str) -> Vec<UserSuggestion> {
    let url = format!("{autocomplete_url}{query}");
    let response = self.get_cached(&url, &[]).await;

    if !response.is_ok() {
      return Vec::new();
    }

    if let Some(value) = response.json() {
      return users_from_json(value, query);
    }
    if let Some(document) = response.xml() {
      return users_from_xml(document, query);
    }
    Vec::new()
  }
}

/// Modern picker shape: `{"users": [...]}` or a bare user list. The `html`
/// snippet is pre-rendered by Jira, so it needs no rendering host-side.
fn users_from_json(value: &Value, query: &str) -> Vec<UserSuggestion> {
  let users = value
    .get("users")
    .and_then(Value::as_array)
    .or_else(|| value.as_array());

  users
    .map(|users| {
      users
        .iter()
        .filter_map(|user| {
          let name = user.get("name").and_then(Value::as_str)?;
          let display = user
            .get("html")
            .or_else(|| user.get("displayName"))
            .and_then(Value::as_str)
            .unwrap_or(name);
          Some(UserSuggestion {
            value: name.to_string(),
            display: display.to_string(),
            needs_render: false,
            q: query.to_string(),
          })
        })
        .collect()
    })
    .unwrap_or_default()
}

/// Legacy picker shape: `<user name="...">Display Name</user>` items. The
/// display text is plain, so the host must render it.
fn users_from_xml(document: &str, query: &str) -> Vec<UserSuggestion> {
  LEGACY_USER_PATTERN
    .captures_iter(document)
    .map(|capture| UserSuggestion {
      value: capture[1].to_string(),
      display: capture[2].to_string(),
      needs_render: true,
      q: query.to_string(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  use crate::client::create_jira_client;

  #[tokio::test]
  async fn test_search_users_json_shape() {
    let mock_server = MockServer::start().await;
    let client = create_jira_client(&mock_server.uri(), "test_user", "test_pass");

    Mock::given(method("GET"))
      .and(path("/rest/api/2/user/picker"))
      .and(query_param("query", "bo"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
          "users": [
              {"name": "bob", "displayName": "Bob Smith", "html": "<b>Bo</b>b Smith"},
              {"name": "boris", "displayName": "Boris Jones"}
          ],
          "total": 2
      })))
      .mount(&mock_server)
      .await;

    let url = format!("{}/rest/api/2/user/picker?query=", mock_server.uri());
    let users = client.search_users(&url, "bo").await;

    assert_eq!(users.len(), 2);
    assert_eq!(users[0].value, "bob");
    assert_eq!(users[0].display, "<b>Bo</b>b Smith");
    assert!(!users[0].needs_render);
    assert_eq!(users[1].display, "Boris Jones");
    assert_eq!(users[1].q, "bo");
  }

  #[tokio::test]
  async fn test_search_users_legacy_xml_shape() {
    let mock_server = MockServer::start().await;
    let client = create_jira_client(&mock_server.uri(), "test_user", "test_pass");

    Mock::given(method("GET"))
      .and(path("/secure/legacy/picker"))
      .respond_with(ResponseTemplate::new(200).set_body_string(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <users><user name=\"bob\" key=\"bob\">Bob Smith</user>\
         <user name=\"boris\" key=\"boris\">Boris Jones</user></users>",
      ))
      .mount(&mock_server)
      .await;

    let url = format!("{}/secure/legacy/picker?username=", mock_server.uri());
    let users = client.search_users(&url, "bo").await;

    assert_eq!(users.len(), 2);
    assert_eq!(users[0].value, "bob");
    assert_eq!(users[0].display, "Bob Smith");
    assert!(users[0].needs_render);
  }

  #[tokio::test]
  async fn test_search_users_failure_yields_no_suggestions() {
    let mock_server = MockServer::start().await;
    let client = create_jira_client(&mock_server.uri(), "test_user", "test_pass");

    Mock::given(method("GET"))
      .and(path("/secure/picker"))
      .respond_with(ResponseTemplate::new(500))
      .mount(&mock_server)
      .await;

    let url = format!("{}/secure/picker?username=", mock_server.uri());
    assert!(client.search_users(&url, "bo").await.is_empty());
  }
}
