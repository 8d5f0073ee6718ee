//! Release configuration loaded from `herald.toml`.
//!
//! Every field has a default, so a repository without a config file still
//! releases with the conventional setup: `main` branch, `v{version}` tags,
//! auto-detected manifests and no artifacts.

mod loader;
mod schema;

pub use loader::{find_config_file_from, load_config, load_config_from, parse_config};
pub use schema::ReleaseConfig;
