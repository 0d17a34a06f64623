//! # Issue Form
//!
//! Builds the create-issue form from live project metadata and validates
//! submissions back into the payload shape the create endpoint expects.
//! Missing or empty remote metadata is a form-level error, never a panic
//! or propagated failure; the caller re-renders the form with the errors.

use indexmap::IndexMap;
use serde_json::{Map, Value, json};

use crate::client::JiraClient;
use crate::fields::{FieldKind, FormField, FormValue, anti_gravity, build_dynamic_field, encode_value};
use crate::models::{CreateMeta, FieldMeta, IssueType, JiraProject, Priority, Version};

/// Field names the form always carries, in display order, ahead of any
/// dynamically built field.
const FIXED_FIELDS: [&str; 4] = ["project", "issuetype", "summary", "description"];

const COMMUNICATION_ERROR: &str = "Error communicating with JIRA, please check your configuration.";

/// Accumulated validation errors: per-field plus form-level.
#[derive(Debug, Clone, Default)]
pub struct FormErrors {
  pub field: IndexMap<String, Vec<String>>,
  pub global: Vec<String>,
}

impl FormErrors {
  pub fn is_empty(&self) -> bool {
    self.field.is_empty() && self.global.is_empty()
  }

  pub fn add_global(&mut self, message: impl Into<String>) {
    self.global.push(message.into());
  }

  pub fn add_field(&mut self, field: &str, message: impl Into<String>) {
    self.field.entry(field.to_string()).or_default().push(message.into());
  }

  /// Fold another error set into this one, field errors and global alike.
  pub fn merge(&mut self, other: FormErrors) {
    for (field, messages) in other.field {
      self.field.entry(field).or_default().extend(messages);
    }
    self.global.extend(other.global);
  }
}

/// Initial values seeded from the error group and the request.
#[derive(Debug, Clone, Default)]
pub struct InitialData {
  pub summary: String,
  pub description: String,
  /// Issue type requested via query parameter, if any.
  pub issuetype: Option<String>,
}

/// The create-issue form: fixed fields, dynamically built fields, and the
/// schema snapshot needed to validate a submission.
#[derive(Debug, Clone)]
pub struct IssueForm {
  pub fields: Vec<FormField>,
  /// Errors raised while building the form, when metadata was unusable.
  pub errors: FormErrors,
  issue_type: Option<IssueType>,
  project_id: Option<String>,
  ignored_fields: Vec<String>,
}

impl IssueForm {
  /// Fetch priorities, versions, and create-metadata for the project and
  /// build the form for the requested issue type.
  pub async fn build(client: &JiraClient, project_key: &str, ignored_fields: &str, initial: &InitialData) -> Self {
    let priorities: Option<Vec<Priority>> = client.get_priorities().await.json_as();
    let versions: Vec<Version> = client.get_versions(project_key).await.json_as().unwrap_or_default();
    let meta: Option<CreateMeta> = client.get_create_meta(project_key).await.json_as();

    let ignored: Vec<String> = ignored_fields
      .split(',')
      .map(|field| field.trim().to_string())
      .filter(|field| !field.is_empty())
      .collect();

    // Somehow got here without a working configuration.
    let (meta, priorities) = match (meta, priorities.filter(|p| !p.is_empty())) {
      (Some(meta), Some(priorities)) => (meta, priorities),
      _ => return Self::failed(ignored, COMMUNICATION_ERROR.to_string()),
    };

    // The metadata was looked up by exact project key, so the project is
    // always the first entry.
    let Some(project) = meta.projects.into_iter().next() else {
      return Self::failed(
        ignored,
        format!(
          "Error in JIRA configuration, no projects found for user {}.",
          client.username()
        ),
      );
    };

    if project.issuetypes.is_empty() {
      return Self::failed(ignored, COMMUNICATION_ERROR.to_string());
    }

    // Exact id match against the requested issue type; no match or no
    // request falls back to the first available type.
    let issue_type = initial
      .issuetype
      .as_deref()
      .and_then(|selector| project.issuetypes.iter().find(|t| t.id == selector))
      .unwrap_or(&project.issuetypes[0])
      .clone();

    let issue_type_choices: Vec<(String, String)> = project
      .issuetypes
      .iter()
      .map(|t| (t.id.clone(), t.name.clone()))
      .collect();

    let mut fields = vec![
      FormField::new("project", "Project", true, FieldKind::Hidden).with_initial(&project.id),
      FormField::new(
        "issuetype",
        "Issue Type",
        true,
        FieldKind::Select {
          choices: issue_type_choices,
        },
      )
      .with_initial(&issue_type.id),
      FormField::new("summary", "Issue Summary", true, FieldKind::Text).with_initial(&initial.summary),
      FormField::new("description", "Description", true, FieldKind::Textarea).with_initial(&initial.description),
    ];

    // Stable sort by the known-field priority table keeps built-in fields
    // ahead of the custom ones while preserving remote order otherwise.
    let mut dynamic: Vec<(&String, &FieldMeta)> = issue_type
      .fields
      .iter()
      .filter(|(name, _)| !FIXED_FIELDS.contains(&name.as_str()))
      .filter(|(name, _)| !ignored.iter().any(|ignored_field| ignored_field == *name))
      .collect();
    dynamic.sort_by_key(|(name, _)| anti_gravity(name));

    for (name, field_meta) in dynamic {
      let Some(mut field) = build_dynamic_field(name, field_meta) else {
        continue;
      };

      // allowedValues does not carry enough for these two; replace the
      // choices with the live lists.
      match name.as_str() {
        "priority" => {
          field.kind = FieldKind::Select {
            choices: priorities.iter().map(|p| (p.id.clone(), p.name.clone())).collect(),
          };
        }
        "fixVersions" => {
          field.kind = FieldKind::MultiSelect {
            choices: versions.iter().map(|v| (v.id.clone(), v.name.clone())).collect(),
          };
        }
        _ => {}
      }

      fields.push(field);
    }

    Self {
      fields,
      errors: FormErrors::default(),
      issue_type: Some(issue_type),
      project_id: Some(project.id),
      ignored_fields: ignored,
    }
  }

  fn failed(ignored_fields: Vec<String>, message: String) -> Self {
    let mut errors = FormErrors::default();
    errors.add_global(message);
    Self {
      fields: Vec::new(),
      errors,
      issue_type: None,
      project_id: None,
      ignored_fields,
    }
  }

  pub fn ignored_fields(&self) -> &[String] {
    &self.ignored_fields
  }

  /// The issue type the form was built for.
  pub fn issue_type(&self) -> Option<&IssueType> {
    self.issue_type.as_ref()
  }

  /// Validate a submission against the schema snapshot and produce the
  /// create-issue payload.
  pub fn validate(&self, submitted: &IndexMap<String, FormValue>) -> Result<Value, FormErrors> {
    if !self.errors.is_empty() {
      return Err(self.errors.clone());
    }

    let mut errors = FormErrors::default();

    // Protects against a misconfigured plugin submitting a form without an
    // issue type assigned.
    let (Some(issue_type), Some(project_id)) = (&self.issue_type, &self.project_id) else {
      errors.add_global("Issue Type is required. Check your plugin configuration.");
      return Err(errors);
    };

    for field in &self.fields {
      if !field.required || field.kind == FieldKind::Hidden || field.name == "issuetype" {
        continue;
      }
      let blank = submitted.get(&field.name).is_none_or(FormValue::is_blank);
      if blank {
        errors.add_field(&field.name, "This field is required.");
      }
    }
    if !errors.is_empty() {
      return Err(errors);
    }

    let issue_type_id = submitted
      .get("issuetype")
      .filter(|value| !value.is_blank())
      .map(|value| value.as_scalar().to_string())
      .unwrap_or_else(|| issue_type.id.clone());

    let mut payload_fields = Map::new();
    payload_fields.insert("project".to_string(), json!({"id": project_id}));
    payload_fields.insert("issuetype".to_string(), json!({"id": issue_type_id}));

    // Summary and description are plain strings; a list submission carries
    // its first element.
    if let Some(summary) = submitted.get("summary").filter(|value| !value.is_blank()) {
      payload_fields.insert("summary".to_string(), Value::String(summary.as_scalar().to_string()));
    }
    if let Some(description) = submitted.get("description").filter(|value| !value.is_blank()) {
      payload_fields.insert(
        "description".to_string(),
        Value::String(clean_description(description.as_scalar())),
      );
    }

    // Every remaining value re-encodes per its field schema; blank values
    // are dropped rather than sent as null.
    for (name, field_meta) in &issue_type.fields {
      if FIXED_FIELDS.contains(&name.as_str()) {
        continue;
      }
      let Some(value) = submitted.get(name) else {
        continue;
      };
      if let Some(encoded) = encode_value(&field_meta.schema, value) {
        payload_fields.insert(name.clone(), encoded);
      }
    }

    Ok(json!({"fields": payload_fields}))
  }
}

/// Turn fenced code blocks from the stack trace into Jira code blocks.
fn clean_description(description: &str) -> String {
  description.replace("```", "{code}")
}

/// Build `(key, label)` project choices for configuration forms.
pub fn project_choices(projects: &[JiraProject]) -> Vec<(String, String)> {
  projects
    .iter()
    .map(|p| (p.key.clone(), format!("{} ({})", p.name, p.key)))
    .collect()
}
