//! Typed models for the Jira REST API surface the plugin touches.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A project as returned by the project-list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct JiraProject {
  pub id: String,
  pub key: String,
  pub name: String,
}

/// A priority as returned by the priority-list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Priority {
  pub id: String,
  pub name: String,
}

/// A project version, used for `fixVersions` choices.
#[derive(Debug, Clone, Deserialize)]
pub struct Version {
  pub id: String,
  pub name: String,
}

/// Schema block of a create-metadata field descriptor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldSchema {
  #[serde(rename = "type", default)]
  pub kind: String,
  pub items: Option<String>,
  pub custom: Option<String>,
  pub system: Option<String>,
}

/// One field descriptor out of the create-metadata response.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldMeta {
  pub name: String,
  #[serde(default)]
  pub required: bool,
  #[serde(default)]
  pub schema: FieldSchema,
  #[serde(default, rename = "allowedValues")]
  pub allowed_values: Vec<Value>,
  #[serde(rename = "autoCompleteUrl")]
  pub auto_complete_url: Option<String>,
}

/// An issue type with its field descriptors, remote order preserved.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueType {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub fields: IndexMap<String, FieldMeta>,
}

/// The create-metadata response for one or more projects.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMeta {
  #[serde(default)]
  pub projects: Vec<MetaProject>,
}

/// Per-project block of the create-metadata response.
#[derive(Debug, Clone, Deserialize)]
pub struct MetaProject {
  pub id: String,
  pub key: String,
  #[serde(default)]
  pub issuetypes: Vec<IssueType>,
}

/// Response body of a successful issue creation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedIssue {
  pub id: Option<String>,
  pub key: String,
}

/// Jira's standard error body: global messages plus per-field errors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrors {
  #[serde(default, rename = "errorMessages")]
  pub error_messages: Vec<String>,
  #[serde(default)]
  pub errors: IndexMap<String, String>,
}

/// One entry of the user-autocomplete proxy response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSuggestion {
  pub value: String,
  pub display: String,
  #[serde(rename = "needsRender")]
  pub needs_render: bool,
  pub q: String,
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_create_meta_deserialization() {
    let json = json!({
        "projects": [
            {
                "id": "10000",
                "key": "SEN",
                "issuetypes": [
                    {
                        "id": "10002",
                        "name": "Task",
                        "fields": {
                            "summary": {
                                "name": "Summary",
                                "required": true,
                                "schema": {"type": "string", "system": "summary"}
                            },
                            "priority": {
                                "name": "Priority",
                                "required": false,
                                "schema": {"type": "priority", "system": "priority"},
                                "allowedValues": [{"id": "1", "name": "Highest"}]
                            }
                        }
                    }
                ]
            }
        ]
    });

    let meta: CreateMeta = serde_json::from_value(json).unwrap();

    assert_eq!(meta.projects.len(), 1);
    let project = &meta.projects[0];
    assert_eq!(project.key, "SEN");
    assert_eq!(project.issuetypes[0].id, "10002");

    let fields = &project.issuetypes[0].fields;
    assert_eq!(fields.len(), 2);
    // Remote field order survives deserialization.
    let names: Vec<&str> = fields.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["summary", "priority"]);
    assert!(fields["summary"].required);
    assert_eq!(fields["priority"].schema.kind, "priority");
    assert_eq!(fields["priority"].allowed_values.len(), 1);
  }

  #[test]
  fn test_api_errors_deserialization() {
    let json = json!({
        "errorMessages": ["Field 'components' cannot be set."],
        "errors": {
            "components": "Components is required."
        }
    });

    let errors: ApiErrors = serde_json::from_value(json).unwrap();

    assert_eq!(errors.error_messages.len(), 1);
    assert_eq!(errors.errors["components"], "Components is required.");
  }

  #[test]
  fn test_user_suggestion_serialization() {
    let suggestion = UserSuggestion {
      value: "bob".to_string(),
      display: "Bob Smith".to_string(),
      needs_render: true,
      q: "bo".to_string(),
    };

    let json = serde_json::to_value(&suggestion).unwrap();

    assert_eq!(
      json,
      json!({
          "value": "bob",
          "display": "Bob Smith",
          "needsRender": true,
          "q": "bo"
      })
    );
  }
}
