//! Release notes grouping and section configuration.

use serde::{Deserialize, Serialize};

use crate::git::{ChangeRecord, ChangeType};

/// Heading for the section listing every breaking change.
pub const BREAKING_LABEL: &str = "BREAKING CHANGES";

/// Display settings for one commit type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionConfig {
    #[serde(rename = "type")]
    pub kind: ChangeType,
    pub label: String,
    #[serde(default)]
    pub hidden: bool,
}

impl SectionConfig {
    fn new(kind: ChangeType, label: &str, hidden: bool) -> Self {
        Self {
            kind,
            label: label.to_string(),
            hidden,
        }
    }
}

/// The default section table: user-facing types first, internal ones hidden.
pub fn default_sections() -> Vec<SectionConfig> {
    vec![
        SectionConfig::new(ChangeType::Feat, "Features", false),
        SectionConfig::new(ChangeType::Fix, "Fixes", false),
        SectionConfig::new(ChangeType::Perf, "Performance", false),
        SectionConfig::new(ChangeType::Docs, "Documentation", true),
        SectionConfig::new(ChangeType::Style, "Styles", true),
        SectionConfig::new(ChangeType::Chore, "Miscellaneous", true),
        SectionConfig::new(ChangeType::Refactor, "Refactoring", true),
        SectionConfig::new(ChangeType::Test, "Tests", true),
        SectionConfig::new(ChangeType::Ci, "Continuous Integration", true),
    ]
}

/// One rendered category and its records, in commit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotesSection {
    pub label: String,
    pub records: Vec<ChangeRecord>,
}

/// Records grouped into visible sections, in display order.
///
/// Types without a section, `Other` and sections marked hidden never appear.
/// A breaking record of a visible type is listed once, under
/// [`BREAKING_LABEL`], ahead of every other section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseNotes {
    pub sections: Vec<NotesSection>,
}

impl ReleaseNotes {
    /// Group records by the configured section order.
    ///
    /// Records keep the order they are given in; git history is walked
    /// newest first, so sections list the newest change first.
    pub fn build(records: &[ChangeRecord], config: &[SectionConfig]) -> Self {
        let visible: Vec<&SectionConfig> = config
            .iter()
            .filter(|s| !s.hidden && s.kind != ChangeType::Other)
            .collect();

        let (breaking, regular): (Vec<ChangeRecord>, Vec<ChangeRecord>) = records
            .iter()
            .filter(|r| visible.iter().any(|s| s.kind == r.kind))
            .cloned()
            .partition(|r| r.breaking);

        let mut sections = Vec::new();
        if !breaking.is_empty() {
            sections.push(NotesSection {
                label: BREAKING_LABEL.to_string(),
                records: breaking,
            });
        }

        for section in visible {
            let matching: Vec<ChangeRecord> = regular
                .iter()
                .filter(|r| r.kind == section.kind)
                .cloned()
                .collect();

            if !matching.is_empty() {
                sections.push(NotesSection {
                    label: section.label.clone(),
                    records: matching,
                });
            }
        }

        Self { sections }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Find a section by its label.
    pub fn section(&self, label: &str) -> Option<&NotesSection> {
        self.sections.iter().find(|s| s.label == label)
    }

    /// Entry counts per section for summary output.
    pub fn count_by_section(&self) -> Vec<(&str, usize)> {
        self.sections
            .iter()
            .map(|s| (s.label.as_str(), s.records.len()))
            .collect()
    }

    /// Render the sections as markdown, one `###` heading per section.
    pub fn render(&self) -> String {
        let mut out = String::new();

        for section in &self.sections {
            out.push_str(&format!("### {}\n\n", section.label));
            for record in &section.records {
                out.push_str(&format_bullet(record));
                out.push('\n');
            }
            out.push('\n');
        }

        out
    }
}

/// Format one record as `- **scope:** summary (abc1234)`.
pub fn format_bullet(record: &ChangeRecord) -> String {
    let mut line = String::from("- ");
    if let Some(scope) = &record.scope {
        line.push_str(&format!("**{}:** ", scope));
    }
    line.push_str(&record.summary);
    if let Some(hash) = record.short_hash() {
        line.push_str(&format!(" ({})", hash));
    }
    line
}

/// Keep a Changelog header for new files.
pub const CHANGELOG_HEADER: &str = r#"# Changelog

All notable changes to this project will be documented in this file.

The format is based on [Keep a Changelog](https://keepachangelog.com/en/1.1.0/),
and this project adheres to [Semantic Versioning](https://semver.org/spec/v2.0.0.html).

"#;
