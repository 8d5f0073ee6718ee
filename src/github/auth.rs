//! GitHub token resolution.
//!
//! Order:
//! 1. GITHUB_TOKEN env var (what CI provides)
//! 2. GH_TOKEN env var
//! 3. `gh auth token` when the gh CLI is installed and logged in

use std::env;
use std::process::Command;

use tracing::debug;

use crate::error::PublishError;

const TOKEN_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// Get a GitHub token from the environment or the gh CLI.
pub fn resolve_token() -> Result<String, PublishError> {
    for var in TOKEN_VARS {
        if let Ok(token) = env::var(var) {
            let token = token.trim();
            if !token.is_empty() {
                debug!(source = var, "Using GitHub token from environment");
                return Ok(token.to_string());
            }
        }
    }

    if let Some(token) = get_token_from_gh_cli() {
        debug!(source = "gh", "Using GitHub token from gh CLI");
        return Ok(token);
    }

    Err(PublishError::AuthenticationFailed)
}

/// Try to get a token from the gh CLI.
fn get_token_from_gh_cli() -> Option<String> {
    let gh = which::which("gh").ok()?;

    let output = Command::new(gh).args(["auth", "token"]).output().ok()?;
    if !output.status.success() {
        return None;
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!token.is_empty()).then_some(token)
}
