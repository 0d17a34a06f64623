//! Constants for the Jira plugin client.

/// User-Agent header value for the Jira API client
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub const PROJECT_URL: &str = "/rest/api/2/project";
pub const META_URL: &str = "/rest/api/2/issue/createmeta";
pub const CREATE_URL: &str = "/rest/api/2/issue";
pub const PRIORITIES_URL: &str = "/rest/api/2/priority";

/// Expansion applied to createmeta requests so field descriptors are included.
pub const META_EXPAND: &str = "projects.issuetypes.fields";

/// How long a cached GET response stays fresh, in seconds.
pub const CACHE_TTL_SECS: u64 = 60;
