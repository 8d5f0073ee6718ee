//! Read existing changelogs using parse-changelog.

use std::path::Path;

use semver::Version;

use crate::error::ChangelogError;

/// Read a changelog file, `None` when it does not exist yet.
pub fn read_changelog(path: &Path) -> Result<Option<String>, ChangelogError> {
    if !path.exists() {
        return Ok(None);
    }
    std::fs::read_to_string(path)
        .map(Some)
        .map_err(ChangelogError::ReadFailed)
}

/// Whether the changelog already has a section for `version`.
pub fn has_version(content: &str, version: &Version) -> bool {
    // parse-changelog errors on a changelog without releases
    parse_changelog::parse(content)
        .map(|changelog| changelog.contains_key(version.to_string().as_str()))
        .unwrap_or(false)
}

/// Extract the notes body of the section for `version`.
pub fn extract_notes(content: &str, version: &Version) -> Result<String, ChangelogError> {
    let changelog =
        parse_changelog::parse(content).map_err(|e| ChangelogError::ParseFailed(e.to_string()))?;

    changelog
        .get(version.to_string().as_str())
        .map(|release| release.notes.trim().to_string())
        .ok_or_else(|| ChangelogError::VersionNotFound(version.to_string()))
}

/// Byte offset where the next release section goes.
///
/// That is the first `## ` heading, or the second one when the first is
/// `[Unreleased]`. Without such a heading new sections go at the end.
pub fn find_insertion_point(content: &str) -> usize {
    let mut headings = line_offsets(content).filter(|(_, line)| line.starts_with("## "));

    match headings.next() {
        Some((_, line)) if line.to_lowercase().contains("unreleased") => headings
            .next()
            .map_or(content.len(), |(offset, _)| offset),
        Some((offset, _)) => offset,
        None => content.len(),
    }
}

/// Each line with the byte offset it starts at.
fn line_offsets(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content.split_inclusive('\n').scan(0, |offset, line| {
        let start = *offset;
        *offset += line.len();
        Some((start, line))
    })
}
