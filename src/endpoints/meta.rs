//! # Project Metadata Endpoints
//!
//! Project list, create-metadata, priorities, and versions. Everything the
//! form builder reads per request goes through the response cache; the
//! project list is always fetched fresh so configuration validation
//! observes a credential fix immediately.

use crate::client::{ApiResponse, JiraClient};
use crate::consts;

impl JiraClient {
  /// List the projects visible to the configured user.
  pub async fn get_projects_list(&self) -> ApiResponse {
    self.get(consts::PROJECT_URL, &[]).await
  }

  /// Create-metadata for one project, field descriptors expanded.
  ///
  /// <https://developer.atlassian.com/static/rest/jira/5.0.html#id200251>
  pub async fn get_create_meta(&self, project: &str) -> ApiResponse {
    self
      .get_cached(
        consts::META_URL,
        &[("projectKeys", project), ("expand", consts::META_EXPAND)],
      )
      .await
  }

  /// The instance-wide priority list.
  pub async fn get_priorities(&self) -> ApiResponse {
    self.get_cached(consts::PRIORITIES_URL, &[]).await
  }

  /// Versions defined for a project, used for `fixVersions` choices.
  pub async fn get_versions(&self, project: &str) -> ApiResponse {
    self
      .get_cached(&format!("/rest/api/2/project/{project}/versions"), &[])
      .await
  }
}
