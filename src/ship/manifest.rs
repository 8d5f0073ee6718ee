//! Version manifest detection and rewriting.
//!
//! A manifest entry names a file and a dotted key path to its version field.
//! TOML files are edited with `toml_edit` so comments and layout survive;
//! JSON files keep their key order.

use std::path::{Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};
use toml_edit::{DocumentMut, TableLike};
use tracing::debug;

use crate::error::ManifestError;

/// File format of a version manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFormat {
    Toml,
    Json,
}

/// A location the release version is written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the repository root.
    pub path: PathBuf,
    /// Dotted key path, e.g. `package.version`.
    pub field: String,
    /// Inferred from the extension when omitted.
    #[serde(default)]
    pub format: Option<ManifestFormat>,
}

impl ManifestEntry {
    pub fn new(path: impl Into<PathBuf>, field: &str) -> Self {
        Self {
            path: path.into(),
            field: field.to_string(),
            format: None,
        }
    }

    /// The configured format, or the one implied by the file extension.
    pub fn resolved_format(&self) -> Result<ManifestFormat, ManifestError> {
        if let Some(format) = self.format {
            return Ok(format);
        }
        match self.path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(ManifestFormat::Toml),
            Some("json") => Ok(ManifestFormat::Json),
            _ => Err(ManifestError::UnknownFormat(self.path.clone())),
        }
    }

    fn keys(&self) -> Vec<&str> {
        self.field.split('.').collect()
    }
}

/// Detect well-known manifests in the repository root.
///
/// Checks Cargo.toml (`package.version`), package.json (`version`) and
/// pyproject.toml (`project.version`, falling back to `tool.poetry.version`).
/// Files without a literal version string are skipped, so a crate inheriting
/// `version.workspace = true` is not picked up.
pub fn detect_manifests(root: &Path) -> Result<Vec<ManifestEntry>, ManifestError> {
    let candidates: [(&str, &[&str]); 3] = [
        ("Cargo.toml", &["package.version"]),
        ("package.json", &["version"]),
        ("pyproject.toml", &["project.version", "tool.poetry.version"]),
    ];

    let mut entries = Vec::new();
    for (file, fields) in candidates {
        let path = root.join(file);
        if !path.exists() {
            continue;
        }
        let content = read_file(&path)?;
        for field in fields {
            let entry = ManifestEntry::new(file, field);
            if current_value(&entry, &path, &content)?.is_some() {
                debug!(manifest = file, field, "Detected version manifest");
                entries.push(entry);
                break;
            }
        }
    }

    Ok(entries)
}

/// Read the current version string of an entry, `None` when the field is absent.
pub fn current_value(
    entry: &ManifestEntry,
    path: &Path,
    content: &str,
) -> Result<Option<String>, ManifestError> {
    let keys = entry.keys();
    match entry.resolved_format()? {
        ManifestFormat::Toml => {
            let doc = parse_toml(path, content)?;
            Ok(toml_field(doc.as_table(), &keys))
        }
        ManifestFormat::Json => {
            let json = parse_json(path, content)?;
            Ok(json
                .pointer(&json_pointer(&keys))
                .and_then(|v| v.as_str())
                .map(String::from))
        }
    }
}

/// Return `content` with the entry's version field set to `version`.
pub fn render_manifest(
    entry: &ManifestEntry,
    path: &Path,
    content: &str,
    version: &Version,
) -> Result<String, ManifestError> {
    let keys = entry.keys();
    let missing = || ManifestError::MissingField {
        path: path.to_path_buf(),
        field: entry.field.clone(),
    };

    match entry.resolved_format()? {
        ManifestFormat::Toml => {
            let mut doc = parse_toml(path, content)?;
            if !set_toml_field(doc.as_table_mut(), &keys, &version.to_string()) {
                return Err(missing());
            }
            Ok(doc.to_string())
        }
        ManifestFormat::Json => {
            let mut json = parse_json(path, content)?;
            match json.pointer_mut(&json_pointer(&keys)) {
                Some(value) if value.is_string() => {
                    *value = serde_json::Value::String(version.to_string());
                }
                _ => return Err(missing()),
            }
            let output =
                serde_json::to_string_pretty(&json).map_err(|e| ManifestError::Parse {
                    path: path.to_path_buf(),
                    reason: format!("Failed to serialize JSON: {}", e),
                })?;
            // npm uses trailing newline
            Ok(format!("{}\n", output))
        }
    }
}

// --- TOML ---

fn toml_field(table: &dyn TableLike, keys: &[&str]) -> Option<String> {
    let (last, parents) = keys.split_last()?;
    let mut table = table;
    for key in parents {
        table = table.get(key)?.as_table_like()?;
    }
    table.get(last)?.as_str().map(String::from)
}

fn set_toml_field(table: &mut dyn TableLike, keys: &[&str], version: &str) -> bool {
    let Some((last, parents)) = keys.split_last() else {
        return false;
    };

    let mut table = table;
    for key in parents {
        table = match table.get_mut(key).and_then(|item| item.as_table_like_mut()) {
            Some(next) => next,
            None => return false,
        };
    }

    let Some(item) = table.get_mut(last) else {
        return false;
    };
    if !item.is_str() {
        return false;
    }

    // Keep trailing comments on the version line
    let decor = item.as_value().map(|v| v.decor().clone());
    *item = toml_edit::value(version);
    if let (Some(decor), Some(value)) = (decor, item.as_value_mut()) {
        *value.decor_mut() = decor;
    }
    true
}

fn parse_toml(path: &Path, content: &str) -> Result<DocumentMut, ManifestError> {
    content
        .parse::<DocumentMut>()
        .map_err(|e| ManifestError::Parse {
            path: path.to_path_buf(),
            reason: format!("Invalid TOML: {}", e),
        })
}

// --- JSON ---

fn json_pointer(keys: &[&str]) -> String {
    keys.iter()
        .map(|k| format!("/{}", k.replace('~', "~0").replace('/', "~1")))
        .collect()
}

fn parse_json(path: &Path, content: &str) -> Result<serde_json::Value, ManifestError> {
    serde_json::from_str(content).map_err(|e| ManifestError::Parse {
        path: path.to_path_buf(),
        reason: format!("Invalid JSON: {}", e),
    })
}

pub(crate) fn read_file(path: &Path) -> Result<String, ManifestError> {
    std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })
}
