//! # Jira Issue Plugin
//!
//! Lets an error-tracking host application file Jira tickets on behalf of
//! triaged error groups. Provides an authenticated REST client with
//! response normalization and short-TTL caching, a metadata-driven form
//! builder that mirrors the remote instance's create-metadata, and the
//! plugin controller gluing both to host-owned option and linkage stores.

mod cache;
mod client;
pub mod config;
pub mod consts;
mod endpoints;
pub mod fields;
pub mod forms;
pub mod models;
pub mod plugin;

// Re-export the client
pub use client::{ApiResponse, JiraAuth, JiraClient, ResponseBody, create_jira_client};
// Re-export the form stack
pub use fields::{FieldKind, FormField, FormValue};
pub use forms::{FormErrors, InitialData, IssueForm};
// Re-export the controller
pub use plugin::{
  AutocompleteQuery, ErrorGroup, GroupLinkStore, JiraPlugin, MemoryStore, OptionsStore, PluginError, PluginResponse,
  ViewRequest,
};
