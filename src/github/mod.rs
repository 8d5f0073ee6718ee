//! GitHub release host using octocrab.

pub mod auth;
pub mod releases;

pub use auth::resolve_token;
pub use releases::{GitHubHost, parse_github_remote};
