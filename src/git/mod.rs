//! Git operations using git2-rs.

pub mod commits;
pub mod tags;

pub use commits::{ChangeRecord, ChangeType, classify, fetch_records};
pub use tags::{
    TagFormat, TagInfo, get_latest_reachable_tag, highest_release, reachable_release_tags,
    tag_exists,
};
