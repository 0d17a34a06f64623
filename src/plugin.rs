//! # Plugin Controller
//!
//! Glue between the error-tracking host and the Jira client/form stack:
//! configuration checks, form population from the error group, issue
//! creation with remote-error mapping, duplicate-link prevention,
//! auto-creation on new errors, and the user-autocomplete proxy.

use std::collections::HashMap;
use std::sync::Mutex;

use indexmap::IndexMap;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::client::{JiraClient, create_jira_client};
use crate::config::options;
use crate::fields::FormValue;
use crate::forms::{FormErrors, InitialData, IssueForm};
use crate::models::{ApiErrors, CreatedIssue, UserSuggestion};

/// Per-project persisted key/value options, owned by the host application.
pub trait OptionsStore {
  fn get_option(&self, project: &str, key: &str) -> Option<String>;
  fn set_option(&self, project: &str, key: &str, value: &str);
  fn remove_option(&self, project: &str, key: &str);
}

/// Linkage records tying an error group to the issue filed for it. At most
/// one record exists per group; it is created once and only overwritten by
/// the explicit update path.
pub trait GroupLinkStore {
  fn get_link(&self, group_id: u64) -> Option<String>;
  fn set_link(&self, group_id: u64, issue_key: &str);
}

/// In-memory store for tests and lightweight embedding.
#[derive(Default)]
pub struct MemoryStore {
  options: Mutex<HashMap<(String, String), String>>,
  links: Mutex<HashMap<u64, String>>,
}

impl OptionsStore for MemoryStore {
  fn get_option(&self, project: &str, key: &str) -> Option<String> {
    let options = self.options.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    options.get(&(project.to_string(), key.to_string())).cloned()
  }

  fn set_option(&self, project: &str, key: &str, value: &str) {
    let mut options = self.options.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    options.insert((project.to_string(), key.to_string()), value.to_string());
  }

  fn remove_option(&self, project: &str, key: &str) {
    let mut options = self.options.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    options.remove(&(project.to_string(), key.to_string()));
  }
}

impl GroupLinkStore for MemoryStore {
  fn get_link(&self, group_id: u64) -> Option<String> {
    let links = self.links.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    links.get(&group_id).cloned()
  }

  fn set_link(&self, group_id: u64, issue_key: &str) {
    let mut links = self.links.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    links.insert(group_id, issue_key.to_string());
  }
}

/// The error group a ticket is filed for.
#[derive(Debug, Clone)]
pub struct ErrorGroup {
  pub id: u64,
  /// Slug of the host project the group belongs to.
  pub project: String,
  pub title: String,
  pub description: String,
}

/// One view invocation against the plugin.
#[derive(Debug, Clone, Default)]
pub struct ViewRequest {
  /// Requested issue type, from the `issuetype` query parameter.
  pub issue_type: Option<String>,
  /// When set, the invocation is an autocomplete proxy call.
  pub autocomplete: Option<AutocompleteQuery>,
  /// Submitted form values; `None` renders the empty form.
  pub submitted: Option<IndexMap<String, FormValue>>,
}

/// Autocomplete branch parameters: the remote picker URL a user field
/// advertised plus the partial query typed so far.
#[derive(Debug, Clone)]
pub struct AutocompleteQuery {
  pub url: String,
  pub query: String,
}

/// What the host should render for one view invocation.
#[derive(Debug)]
pub enum PluginResponse {
  /// The plugin has no usable configuration for this project.
  NotConfigured,
  /// A ticket already exists for this group.
  Linked { issue_key: String, url: String },
  /// Autocomplete proxy result.
  Autocomplete { users: Vec<UserSuggestion> },
  /// Render (or re-render) the issue form.
  Form { form: IssueForm },
  /// A ticket was filed; redirect back to the group.
  Created { issue_key: String, redirect: String },
}

/// Raised when a project is asked to act on Jira without the options it
/// needs.
#[derive(Debug, Error)]
pub enum PluginError {
  #[error("missing plugin option: {0}")]
  MissingOption(&'static str),
}

/// Files Jira tickets on behalf of triaged error groups.
pub struct JiraPlugin<S> {
  store: S,
}

impl<S: OptionsStore + GroupLinkStore> JiraPlugin<S> {
  pub fn new(store: S) -> Self {
    Self { store }
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  fn option(&self, project: &str, key: &str) -> Option<String> {
    self.store.get_option(project, key)
  }

  /// A project is configured once it has an instance, credentials, and a
  /// linked default project.
  pub fn is_configured(&self, project: &str) -> bool {
    self.option(project, options::DEFAULT_PROJECT).is_some()
      && self.option(project, options::INSTANCE_URL).is_some()
      && self.option(project, options::USERNAME).is_some()
      && self.option(project, options::PASSWORD).is_some()
  }

  /// Client for the instance configured on the host project.
  pub fn client_for(&self, project: &str) -> Result<JiraClient, PluginError> {
    let instance = self
      .option(project, options::INSTANCE_URL)
      .ok_or(PluginError::MissingOption(options::INSTANCE_URL))?;
    let username = self
      .option(project, options::USERNAME)
      .ok_or(PluginError::MissingOption(options::USERNAME))?;
    let password = self
      .option(project, options::PASSWORD)
      .ok_or(PluginError::MissingOption(options::PASSWORD))?;
    Ok(create_jira_client(&instance, &username, &password))
  }

  /// Browse URL for a filed issue.
  pub fn get_issue_url(&self, project: &str, issue_key: &str) -> String {
    let instance = self.option(project, options::INSTANCE_URL).unwrap_or_default();
    format!("{instance}/browse/{issue_key}")
  }

  fn group_redirect(group: &ErrorGroup) -> String {
    format!("/{}/group/{}/", group.project, group.id)
  }

  /// Initial form values seeded from the group and the request.
  pub fn initial_form_data(&self, request: &ViewRequest, group: &ErrorGroup) -> InitialData {
    InitialData {
      summary: group.title.clone(),
      description: group.description.clone(),
      issuetype: request.issue_type.clone(),
    }
  }

  /// One request/response cycle: configuration gate, linked short-circuit,
  /// optional autocomplete branch, then form display or submission.
  pub async fn view(&self, request: &ViewRequest, group: &ErrorGroup) -> PluginResponse {
    if !self.is_configured(&group.project) {
      return PluginResponse::NotConfigured;
    }

    if let Some(issue_key) = self.store.get_link(group.id) {
      let url = self.get_issue_url(&group.project, &issue_key);
      return PluginResponse::Linked { issue_key, url };
    }

    let Ok(client) = self.client_for(&group.project) else {
      return PluginResponse::NotConfigured;
    };

    if let Some(autocomplete) = &request.autocomplete {
      let users = client.search_users(&autocomplete.url, &autocomplete.query).await;
      return PluginResponse::Autocomplete { users };
    }

    let project_key = self
      .option(&group.project, options::DEFAULT_PROJECT)
      .unwrap_or_default();
    let ignored_fields = self
      .option(&group.project, options::IGNORED_FIELDS)
      .unwrap_or_default();
    let initial = self.initial_form_data(request, group);

    let mut form = IssueForm::build(&client, &project_key, &ignored_fields, &initial).await;

    let Some(submitted) = &request.submitted else {
      return PluginResponse::Form { form };
    };

    let payload = match form.validate(submitted) {
      Ok(payload) => payload,
      Err(errors) => {
        form.errors = errors;
        return PluginResponse::Form { form };
      }
    };

    match self.create_issue(&client, &payload, form.ignored_fields()).await {
      Ok(issue_key) => {
        self.store.set_link(group.id, &issue_key);
        PluginResponse::Created {
          issue_key,
          redirect: Self::group_redirect(group),
        }
      }
      Err(errors) => {
        form.errors.merge(errors);
        PluginResponse::Form { form }
      }
    }
  }

  /// POST the encoded payload and map the outcome: a created key on
  /// success, otherwise the remote rejection folded into form errors.
  pub async fn create_issue(
    &self,
    client: &JiraClient,
    payload: &serde_json::Value,
    ignored_fields: &[String],
  ) -> Result<String, FormErrors> {
    let response = client.create_issue(payload).await;
    let mut errors = FormErrors::default();

    match response.status.as_u16() {
      200 | 201 => match response.json_as::<CreatedIssue>() {
        Some(created) => Ok(created.key),
        None => {
          errors.add_global("Error communicating with JIRA, please check your configuration.");
          Err(errors)
        }
      },
      400 => {
        let remote: ApiErrors = response.json_as().unwrap_or_default();
        for (field, message) in remote.errors {
          if ignored_fields.contains(&field) {
            // The field never made it onto the form; don't drop the
            // rejection silently.
            errors.add_global(format!(
              "Field '{field}' is listed in ignored fields but was rejected by JIRA: {message}"
            ));
          } else {
            errors.add_field(&field, message);
          }
        }
        for message in remote.error_messages {
          errors.add_global(message);
        }
        if errors.is_empty() {
          errors.add_global("JIRA rejected the issue without details.");
        }
        Err(errors)
      }
      500 => {
        errors.add_global("JIRA Internal Server Error.");
        Err(errors)
      }
      status => {
        errors.add_global(format!(
          "Something went wrong. Sounds like a configuration issue: status code {status}"
        ));
        Err(errors)
      }
    }
  }

  /// Reconciliation path: overwrite the linkage record for a group.
  pub fn update_issue_key(&self, group: &ErrorGroup, issue_key: &str) {
    self.store.set_link(group.id, issue_key);
  }

  /// File a ticket automatically for a brand-new error group. Gated on the
  /// auto-create flag, complete defaults, and the absence of a linkage
  /// record; any failure logs and skips, never retries.
  pub async fn auto_create(&self, group: &ErrorGroup) -> Option<String> {
    if self.option(&group.project, options::AUTO_CREATE).as_deref() != Some("true") {
      return None;
    }
    if self.store.get_link(group.id).is_some() {
      debug!(group = group.id, "group already linked, skipping auto-create");
      return None;
    }

    let (Some(default_project), Some(default_priority), Some(default_issue_type)) = (
      self.option(&group.project, options::DEFAULT_PROJECT),
      self.option(&group.project, options::DEFAULT_PRIORITY),
      self.option(&group.project, options::DEFAULT_ISSUE_TYPE),
    ) else {
      debug!(group = group.id, "auto-create defaults incomplete, skipping");
      return None;
    };

    let client = self.client_for(&group.project).ok()?;

    // The stored default project is a key, which the create endpoint
    // accepts directly.
    let payload = json!({
        "fields": {
            "project": {"key": default_project},
            "issuetype": {"id": default_issue_type},
            "priority": {"id": default_priority},
            "summary": group.title,
            "description": group.description,
        }
    });

    match self.create_issue(&client, &payload, &[]).await {
      Ok(issue_key) => {
        self.store.set_link(group.id, &issue_key);
        Some(issue_key)
      }
      Err(errors) => {
        warn!(group = group.id, errors = ?errors.global, "auto-create failed, skipping");
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use wiremock::matchers::{body_json, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  use super::*;

  fn group() -> ErrorGroup {
    ErrorGroup {
      id: 42,
      project: "internal".to_string(),
      title: "Hello world".to_string(),
      description: "NameError: foo.bar".to_string(),
    }
  }

  fn configured_plugin(instance_url: &str) -> JiraPlugin<MemoryStore> {
    let plugin = JiraPlugin::new(MemoryStore::default());
    plugin.store().set_option("internal", options::INSTANCE_URL, instance_url);
    plugin.store().set_option("internal", options::USERNAME, "example");
    plugin.store().set_option("internal", options::PASSWORD, "example");
    plugin.store().set_option("internal", options::DEFAULT_PROJECT, "SEN");
    plugin
  }

  #[tokio::test]
  async fn test_view_without_configuration() {
    let plugin = JiraPlugin::new(MemoryStore::default());

    let response = plugin.view(&ViewRequest::default(), &group()).await;
    assert!(matches!(response, PluginResponse::NotConfigured));
  }

  #[tokio::test]
  async fn test_view_short_circuits_when_already_linked() {
    let plugin = configured_plugin("https://jira.example.com");
    plugin.store().set_link(42, "SEN-99");

    let response = plugin.view(&ViewRequest::default(), &group()).await;
    match response {
      PluginResponse::Linked { issue_key, url } => {
        assert_eq!(issue_key, "SEN-99");
        assert_eq!(url, "https://jira.example.com/browse/SEN-99");
      }
      other => panic!("expected linked response, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_view_autocomplete_branch_proxies_user_search() {
    let mock_server = MockServer::start().await;
    let plugin = configured_plugin(&mock_server.uri());

    Mock::given(method("GET"))
      .and(path("/rest/api/2/user/picker"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
          "users": [{"name": "bob", "displayName": "Bob Smith"}]
      })))
      .mount(&mock_server)
      .await;

    let request = ViewRequest {
      autocomplete: Some(AutocompleteQuery {
        url: format!("{}/rest/api/2/user/picker?query=", mock_server.uri()),
        query: "bo".to_string(),
      }),
      ..ViewRequest::default()
    };

    match plugin.view(&request, &group()).await {
      PluginResponse::Autocomplete { users } => {
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].value, "bob");
        assert_eq!(users[0].q, "bo");
      }
      other => panic!("expected autocomplete response, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_create_issue_maps_field_errors() {
    let mock_server = MockServer::start().await;
    let plugin = configured_plugin(&mock_server.uri());
    let client = plugin.client_for("internal").unwrap();

    Mock::given(method("POST"))
      .and(path("/rest/api/2/issue"))
      .respond_with(ResponseTemplate::new(400).set_body_json(json!({
          "errorMessages": ["Something else went wrong."],
          "errors": {
              "components": "Component/s is required.",
              "security": "Security is required."
          }
      })))
      .mount(&mock_server)
      .await;

    let ignored = vec!["security".to_string()];
    let errors = plugin
      .create_issue(&client, &json!({"fields": {}}), &ignored)
      .await
      .unwrap_err();

    assert_eq!(errors.field["components"], vec!["Component/s is required.".to_string()]);
    // The rejected ignored field escalates to a global warning instead of
    // disappearing.
    assert!(errors.global.iter().any(|m| m.contains("'security'")));
    assert!(errors.global.iter().any(|m| m == "Something else went wrong."));
    assert!(!errors.field.contains_key("security"));
  }

  #[tokio::test]
  async fn test_create_issue_maps_server_errors() {
    let mock_server = MockServer::start().await;
    let plugin = configured_plugin(&mock_server.uri());
    let client = plugin.client_for("internal").unwrap();

    Mock::given(method("POST"))
      .and(path("/rest/api/2/issue"))
      .respond_with(ResponseTemplate::new(500))
      .mount(&mock_server)
      .await;

    let errors = plugin.create_issue(&client, &json!({"fields": {}}), &[]).await.unwrap_err();
    assert_eq!(errors.global, vec!["JIRA Internal Server Error.".to_string()]);
  }

  #[tokio::test]
  async fn test_create_issue_maps_unexpected_statuses() {
    let mock_server = MockServer::start().await;
    let plugin = configured_plugin(&mock_server.uri());
    let client = plugin.client_for("internal").unwrap();

    Mock::given(method("POST"))
      .and(path("/rest/api/2/issue"))
      .respond_with(ResponseTemplate::new(302))
      .mount(&mock_server)
      .await;

    let errors = plugin.create_issue(&client, &json!({"fields": {}}), &[]).await.unwrap_err();
    assert!(errors.global[0].contains("status code 302"));
  }

  #[tokio::test]
  async fn test_auto_create_requires_flag_and_defaults() {
    let mock_server = MockServer::start().await;
    let plugin = configured_plugin(&mock_server.uri());

    // Flag off.
    assert!(plugin.auto_create(&group()).await.is_none());

    // Flag on, defaults incomplete.
    plugin.store().set_option("internal", options::AUTO_CREATE, "true");
    assert!(plugin.auto_create(&group()).await.is_none());
  }

  #[tokio::test]
  async fn test_auto_create_files_and_links_once() {
    let mock_server = MockServer::start().await;
    let plugin = configured_plugin(&mock_server.uri());
    plugin.store().set_option("internal", options::AUTO_CREATE, "true");
    plugin.store().set_option("internal", options::DEFAULT_PRIORITY, "1");
    plugin.store().set_option("internal", options::DEFAULT_ISSUE_TYPE, "10002");

    Mock::given(method("POST"))
      .and(path("/rest/api/2/issue"))
      .and(body_json(json!({
          "fields": {
              "project": {"key": "SEN"},
              "issuetype": {"id": "10002"},
              "priority": {"id": "1"},
              "summary": "Hello world",
              "description": "NameError: foo.bar",
          }
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"key": "SEN-1"})))
      .expect(1)
      .mount(&mock_server)
      .await;

    assert_eq!(plugin.auto_create(&group()).await.as_deref(), Some("SEN-1"));
    assert_eq!(plugin.store().get_link(42).as_deref(), Some("SEN-1"));

    // A second new-error notification finds the link and skips.
    assert!(plugin.auto_create(&group()).await.is_none());
  }

  #[tokio::test]
  async fn test_auto_create_failure_skips_silently() {
    let mock_server = MockServer::start().await;
    let plugin = configured_plugin(&mock_server.uri());
    plugin.store().set_option("internal", options::AUTO_CREATE, "true");
    plugin.store().set_option("internal", options::DEFAULT_PRIORITY, "1");
    plugin.store().set_option("internal", options::DEFAULT_ISSUE_TYPE, "10002");

    Mock::given(method("POST"))
      .and(path("/rest/api/2/issue"))
      .respond_with(ResponseTemplate::new(500))
      .mount(&mock_server)
      .await;

    assert!(plugin.auto_create(&group()).await.is_none());
    assert!(plugin.store().get_link(42).is_none());
  }

  #[tokio::test]
  async fn test_update_issue_key_overwrites_link() {
    let plugin = configured_plugin("https://jira.example.com");
    plugin.store().set_link(42, "SEN-1");

    plugin.update_issue_key(&group(), "SEN-2");
    assert_eq!(plugin.store().get_link(42).as_deref(), Some("SEN-2"));
  }
}
