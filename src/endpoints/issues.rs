//! # Issue Creation Endpoint

use serde_json::Value;

use crate::client::{ApiResponse, JiraClient};
use crate::consts;

impl JiraClient {
  /// File a new issue. The payload is the full `{"fields": {...}}` object
  /// with every value already encoded per its field schema; the caller
  /// branches on the response status to map remote validation errors.
  pub async fn create_issue(&self, payload: &Value) -> ApiResponse {
    self.post(consts::CREATE_URL, payload).await
  }
}
