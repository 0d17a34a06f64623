//! # Jira API Endpoints
//!
//! Organized endpoint implementations for the resources the plugin needs:
//! project metadata, issue creation, and user autocomplete.

pub mod issues;
pub mod meta;
pub mod users;
