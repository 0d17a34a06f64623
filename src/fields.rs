//! # Dynamic Field Construction
//!
//! Translates Jira create-metadata field descriptors into renderable form
//! fields, and re-encodes submitted values back into the JSON shapes the
//! create-issue endpoint expects for each schema.

use serde_json::{Value, json};

use crate::models::{FieldMeta, FieldSchema};

// Common built-in Jira custom field types, for easy reference.
pub const CUSTOM_SELECT: &str = "com.atlassian.jira.plugin.system.customfieldtypes:select";
pub const CUSTOM_TEXTAREA: &str = "com.atlassian.jira.plugin.system.customfieldtypes:textarea";
pub const CUSTOM_MULTIUSERPICKER: &str = "com.atlassian.jira.plugin.system.customfieldtypes:multiuserpicker";

/// Widget a form field renders as.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
  /// Carried in the form but never shown.
  Hidden,
  Text,
  Textarea,
  /// Single choice from `(id, label)` pairs.
  Select { choices: Vec<(String, String)> },
  /// Multiple choices from `(id, label)` pairs.
  MultiSelect { choices: Vec<(String, String)> },
  /// Free text backed by the remote user-autocomplete endpoint.
  UserPicker { autocomplete_url: Option<String> },
}

/// One renderable field of the issue form.
#[derive(Debug, Clone)]
pub struct FormField {
  pub name: String,
  pub label: String,
  pub required: bool,
  pub kind: FieldKind,
  pub initial: Option<String>,
}

impl FormField {
  pub fn new(name: &str, label: &str, required: bool, kind: FieldKind) -> Self {
    Self {
      name: name.to_string(),
      label: label.to_string(),
      required,
      kind,
      initial: None,
    }
  }

  pub fn with_initial(mut self, initial: &str) -> Self {
    self.initial = Some(initial.to_string());
    self
  }
}

/// A raw value collected from the browser for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
  Text(String),
  List(Vec<String>),
}

impl FormValue {
  /// Blank values are dropped from payloads rather than sent as null.
  pub fn is_blank(&self) -> bool {
    match self {
      FormValue::Text(text) => text.is_empty(),
      FormValue::List(items) => items.is_empty(),
    }
  }

  pub(crate) fn as_scalar(&self) -> &str {
    match self {
      FormValue::Text(text) => text,
      FormValue::List(items) => items.first().map(String::as_str).unwrap_or(""),
    }
  }

  fn as_list(&self) -> Vec<&str> {
    match self {
      FormValue::Text(text) => vec![text.as_str()],
      FormValue::List(items) => items.iter().map(String::as_str).collect(),
    }
  }
}

impl From<&str> for FormValue {
  fn from(text: &str) -> Self {
    FormValue::Text(text.to_string())
  }
}

/// Extract `(id, label)` choice pairs out of an `allowedValues` list. The
/// label is the entry's `name`, falling back to `value` for option-style
/// custom fields.
pub fn make_choices(values: &[Value]) -> Vec<(String, String)> {
  values
    .iter()
    .filter_map(|entry| {
      let id = scalar_to_string(entry.get("id")?)?;
      let label = entry
        .get("name")
        .or_else(|| entry.get("value"))
        .and_then(scalar_to_string)
        .unwrap_or_else(|| id.clone());
      Some((id, label))
    })
    .collect()
}

fn scalar_to_string(value: &Value) -> Option<String> {
  match value {
    Value::String(text) => Some(text.clone()),
    Value::Number(number) => Some(number.to_string()),
    _ => None,
  }
}

/// Display ordering for well-known built-in fields; without it the remote
/// descriptor order puts them in odd places. Unranked fields sort at zero.
pub fn anti_gravity(field: &str) -> i32 {
  match field {
    "priority" => -150,
    "fixVersions" => -125,
    "components" => -100,
    "security" => -50,
    _ => 0,
  }
}

/// Build a form field from a create-metadata descriptor. Returns `None` for
/// descriptor types the form cannot represent (time tracking, work logs,
/// attachments), which are omitted from the form entirely.
pub fn build_dynamic_field(name: &str, meta: &FieldMeta) -> Option<FormField> {
  let schema = &meta.schema;

  let mut kind = if matches!(schema.kind.as_str(), "securitylevel" | "priority")
    || schema.custom.as_deref() == Some(CUSTOM_SELECT)
  {
    FieldKind::Select {
      choices: make_choices(&meta.allowed_values),
    }
  } else if schema.items.as_deref() == Some("user") || schema.kind == "user" {
    FieldKind::UserPicker {
      autocomplete_url: meta.auto_complete_url.clone(),
    }
  } else if schema.kind == "timetracking" {
    // Time tracking is unsupported altogether.
    return None;
  } else if matches!(schema.items.as_deref(), Some("worklog") | Some("attachment")) {
    return None;
  } else if schema.kind == "array" && schema.items.as_deref() != Some("string") {
    FieldKind::MultiSelect {
      choices: make_choices(&meta.allowed_values),
    }
  } else {
    FieldKind::Text
  };

  // Several base types can additionally be configured as a custom textarea;
  // the widget override applies whatever the base type chose.
  if schema.custom.as_deref() == Some(CUSTOM_TEXTAREA) {
    kind = FieldKind::Textarea;
  }

  Some(FormField::new(name, &meta.name, meta.required, kind))
}

/// Re-encode one submitted value into the shape the create-issue endpoint
/// expects for its schema. Blank values encode to `None` and are dropped
/// from the payload.
pub fn encode_value(schema: &FieldSchema, value: &FormValue) -> Option<Value> {
  if value.is_blank() {
    return None;
  }

  if schema.kind == "string" && schema.custom.as_deref() != Some(CUSTOM_SELECT) {
    return Some(Value::String(value.as_scalar().to_string()));
  }
  // Multi-user pickers are arrays of users; the custom key has to win over
  // the plain user branch.
  if schema.custom.as_deref() == Some(CUSTOM_MULTIUSERPICKER) {
    let names: Vec<Value> = value.as_list().iter().map(|name| json!({"name": name})).collect();
    return Some(Value::Array(names));
  }
  if schema.kind == "user" || schema.items.as_deref() == Some("user") {
    return Some(json!({"name": value.as_scalar()}));
  }
  if schema.kind == "array" && schema.items.as_deref() != Some("string") {
    let ids: Vec<Value> = value.as_list().iter().map(|id| json!({"id": id})).collect();
    return Some(Value::Array(ids));
  }
  if schema.custom.as_deref() == Some(CUSTOM_TEXTAREA) {
    return Some(Value::String(value.as_scalar().to_string()));
  }
  // Everything left is a non-string scalar the API wants wrapped as an id
  // reference, custom selects included.
  Some(json!({"id": value.as_scalar()}))
}
