//! Render new changelog sections.

use semver::Version;

use super::format::{CHANGELOG_HEADER, ReleaseNotes};
use super::parser::find_insertion_point;

/// Format a version section in Keep a Changelog format.
pub fn format_version_section(version: &Version, date: &str, notes: &ReleaseNotes) -> String {
    let mut section = format!("## [{}] - {}\n\n", version, date);
    section.push_str(&notes.render());
    section
}

/// Insert a section newest-on-top into existing changelog content.
///
/// - Creates the header when there is no changelog yet
/// - Keeps any [Unreleased] section above the new release
pub fn prepend_section(existing: Option<&str>, section: &str) -> String {
    match existing {
        Some(content) => {
            let insertion_point = find_insertion_point(content);

            let mut new_content = String::with_capacity(content.len() + section.len() + 2);
            new_content.push_str(&content[..insertion_point]);
            if !new_content.is_empty() && !new_content.ends_with('\n') {
                new_content.push('\n');
            }
            if !new_content.is_empty() && !new_content.ends_with("\n\n") {
                new_content.push('\n');
            }
            new_content.push_str(section);
            if insertion_point < content.len() {
                new_content.push_str(&content[insertion_point..]);
            }
            new_content
        }
        None => {
            let mut content = CHANGELOG_HEADER.to_string();
            content.push_str(section);
            content
        }
    }
}

/// Generate a summary message for the user.
pub fn generate_summary(notes: &ReleaseNotes, changelog_name: &str) -> String {
    let counts = notes.count_by_section();
    if counts.is_empty() {
        return format!("No user-facing changes recorded in {}", changelog_name);
    }

    let total: usize = counts.iter().map(|(_, n)| n).sum();
    let details: Vec<String> = counts
        .iter()
        .map(|(label, count)| format!("{}: {}", label, count))
        .collect();
    let entry_word = if total == 1 { "entry" } else { "entries" };

    format!(
        "Added {} {} ({}) to {}",
        total,
        entry_word,
        details.join(", "),
        changelog_name
    )
}
