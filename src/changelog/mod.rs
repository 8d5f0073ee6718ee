//! Release notes building, changelog parsing and writing.

pub mod format;
pub mod parser;
pub mod writer;

pub use format::{NotesSection, ReleaseNotes, SectionConfig, default_sections};
pub use parser::{extract_notes, has_version, read_changelog};
pub use writer::{format_version_section, generate_summary, prepend_section};
