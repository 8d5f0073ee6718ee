//! Version management and semver bumping.

pub mod bump;

pub use bump::{BumpKind, VersionDecision, apply_bump, determine_bump, resolve};
