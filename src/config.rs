//! # Plugin Configuration
//!
//! Per-project option keys, the validated configuration, and the
//! configuration-form pipeline: choice loading from the remote instance
//! and validation of submitted values, including the credential probe.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::{JiraClient, create_jira_client};
use crate::forms::{FormErrors, project_choices};
use crate::models::{CreateMeta, JiraProject, Priority};

/// Persisted per-project option keys, owned by the host's options store.
pub mod options {
  pub const INSTANCE_URL: &str = "instance_url";
  pub const USERNAME: &str = "username";
  pub const PASSWORD: &str = "password";
  pub const DEFAULT_PROJECT: &str = "default_project";
  pub const DEFAULT_PRIORITY: &str = "default_priority";
  pub const DEFAULT_ISSUE_TYPE: &str = "default_issue_type";
  pub const IGNORED_FIELDS: &str = "ignored_fields";
  pub const AUTO_CREATE: &str = "auto_create";
}

/// Values submitted on the configuration form, before validation.
#[derive(Debug, Clone, Default)]
pub struct OptionsInput {
  pub instance_url: Option<String>,
  pub username: Option<String>,
  pub password: Option<String>,
  pub default_project: Option<String>,
  pub default_priority: Option<String>,
  pub default_issue_type: Option<String>,
  pub ignored_fields: Option<String>,
  pub auto_create: bool,
}

/// Validated plugin configuration, ready to persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
  pub instance_url: String,
  pub username: String,
  pub password: String,
  pub default_project: Option<String>,
  pub default_priority: Option<String>,
  pub default_issue_type: Option<String>,
  /// Comma-separated field names to leave off the issue form.
  pub ignored_fields: String,
  pub auto_create: bool,
}

/// Choice lists for the configuration form, loaded from the remote
/// instance when working credentials are available.
#[derive(Debug, Default)]
pub struct OptionsFormContext {
  pub project_choices: Vec<(String, String)>,
  pub priority_choices: Vec<(String, String)>,
  pub issue_type_choices: Vec<(String, String)>,
  /// False after an auth failure; the form must force password re-entry.
  pub credentials_valid: bool,
  /// Auto-create is only offered once defaults can actually be chosen.
  pub can_auto_create: bool,
}

impl OptionsFormContext {
  /// Probe the instance and load choice lists. Auth failures flag the
  /// stored credentials as unusable instead of erroring.
  pub async fn load(client: &JiraClient, default_project: Option<&str>) -> Self {
    let mut context = OptionsFormContext {
      credentials_valid: true,
      ..OptionsFormContext::default()
    };

    let projects_response = client.get_projects_list().await;
    if is_auth_failure(projects_response.status.as_u16()) {
      context.credentials_valid = false;
      return context;
    }
    let projects: Vec<JiraProject> = projects_response.json_as().unwrap_or_default();
    if projects.is_empty() {
      return context;
    }
    context.project_choices = project_choices(&projects);
    context.can_auto_create = true;

    let priorities_response = client.get_priorities().await;
    if is_auth_failure(priorities_response.status.as_u16()) {
      context.credentials_valid = false;
      return context;
    }
    let priorities: Vec<Priority> = priorities_response.json_as().unwrap_or_default();
    context.priority_choices = priorities.into_iter().map(|p| (p.id, p.name)).collect();

    if let Some(project_key) = default_project {
      let meta_response = client.get_create_meta(project_key).await;
      if is_auth_failure(meta_response.status.as_u16()) {
        context.credentials_valid = false;
        context.can_auto_create = false;
        return context;
      }
      let meta: Option<CreateMeta> = meta_response.json_as();
      match meta.and_then(|meta| meta.projects.into_iter().next()) {
        Some(project) => {
          context.issue_type_choices = project.issuetypes.into_iter().map(|t| (t.id, t.name)).collect();
        }
        None => context.can_auto_create = false,
      }
    }

    context
  }
}

fn is_auth_failure(status: u16) -> bool {
  status == 401 || status == 403
}

/// Validate a configuration submission. The stored configuration, when
/// present, supplies the password fallback so it need not be retyped.
pub async fn validate_options(input: &OptionsInput, stored: Option<&PluginConfig>) -> Result<PluginConfig, FormErrors> {
  let mut errors = FormErrors::default();

  let instance_url = input
    .instance_url
    .as_deref()
    .map(|url| url.trim_end_matches('/').to_string())
    .filter(|url| !url.is_empty());
  if instance_url.is_none() {
    errors.add_field(options::INSTANCE_URL, "Instance URL is required");
  } else if let Some(url) = &instance_url
    && Url::parse(url).is_err()
  {
    errors.add_field(options::INSTANCE_URL, "Instance URL is not a valid URL");
  }

  let username = input.username.clone().filter(|name| !name.is_empty());
  if username.is_none() {
    errors.add_field(options::USERNAME, "Username is required");
  }

  // Don't complain about a blank password when one is already stored; no
  // one wants to retype it to change an unrelated option.
  let password = input
    .password
    .clone()
    .filter(|pw| !pw.is_empty())
    .or_else(|| stored.map(|config| config.password.clone()).filter(|pw| !pw.is_empty()));
  if password.is_none() {
    errors.add_field(options::PASSWORD, "A Password is Required");
  }

  if !errors.is_empty() {
    return Err(errors);
  }

  let (Some(instance_url), Some(username), Some(password)) = (instance_url, username, password) else {
    // All three were just checked.
    return Err(errors);
  };

  // Make one cheap authenticated call to prove the configuration works.
  let client = create_jira_client(&instance_url, &username, &password);
  let probe = client.get_priorities().await;
  match probe.status.as_u16() {
    200 => {
      if probe.json().is_none() {
        errors.add_global(
          "Unable to connect to JIRA: the response did not contain valid JSON, \
           did you enter the correct instance URL?",
        );
        return Err(errors);
      }
    }
    status if is_auth_failure(status) => {
      errors.add_field(options::USERNAME, "Username might be incorrect");
      errors.add_field(options::PASSWORD, "Password might be incorrect");
      errors.add_global(format!(
        "Unable to connect to JIRA: {status}, if you have tried and failed multiple times \
         you may have to enter a CAPTCHA in JIRA to re-enable API logins."
      ));
      return Err(errors);
    }
    status => {
      errors.add_global(format!(
        "Unable to connect to JIRA: the remote server returned an unhandled {status} status code"
      ));
      return Err(errors);
    }
  }

  if input.auto_create && (input.default_priority.is_none() || input.default_issue_type.is_none()) {
    errors.add_field(options::AUTO_CREATE, "Default priority and issue type must be configured.");
    return Err(errors);
  }

  Ok(PluginConfig {
    instance_url,
    username,
    password,
    default_project: input.default_project.clone(),
    default_priority: input.default_priority.clone(),
    default_issue_type: input.default_issue_type.clone(),
    ignored_fields: input.ignored_fields.clone().unwrap_or_default(),
    auto_create: input.auto_create,
  })
}
