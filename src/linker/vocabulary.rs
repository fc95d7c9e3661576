//! Vocabulary loading
//!
//! Two sources feed the alias index:
//! - a flat term file, one term per line (the line is the link target)
//! - terminology notes whose YAML front matter names `term`, `aliases`, `tags`

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::corpus::{collect_documents, read_document};
use crate::error::{LinkError, Result};
use crate::linker::variants::normalize_whitespace;

// =============================================================================
// Types
// =============================================================================

/// One canonical term and everything known about it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    /// Canonical term, whitespace-normalized. Doubles as the link target.
    pub term: String,
    /// The vocabulary line (or note) it came from, as written
    pub source: String,
    /// Extra alias base forms declared alongside the term
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Cluster tags carried into the generated tables
    #[serde(default)]
    pub clusters: Vec<String>,
}

impl VocabularyEntry {
    /// Entry for a flat vocabulary line. `None` for blank lines.
    pub fn from_line(line: &str) -> Option<Self> {
        let source = line.trim();
        if source.is_empty() {
            return None;
        }
        Some(Self {
            term: normalize_whitespace(source),
            source: source.to_string(),
            aliases: Vec::new(),
            clusters: Vec::new(),
        })
    }
}

// =============================================================================
// Flat term file
// =============================================================================

/// Parse a flat vocabulary: every non-blank line is one term
pub fn parse_vocabulary(text: &str) -> Vec<VocabularyEntry> {
    text.lines().filter_map(VocabularyEntry::from_line).collect()
}

/// Load a flat vocabulary file. A missing file is `LinkError::NotFound`.
pub fn load_vocabulary(path: &Path) -> Result<Vec<VocabularyEntry>> {
    let text = std::fs::read_to_string(path).map_err(|e| LinkError::io(path, e))?;
    let entries = parse_vocabulary(&text);
    tracing::info!(path = %path.display(), terms = entries.len(), "loaded vocabulary");
    Ok(entries)
}

// =============================================================================
// Front matter harvesting
// =============================================================================

/// Split `---\n<yaml>\n---\n<body>` into its YAML block and body
pub fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let rest = match text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    {
        Some(rest) => rest,
        None => return (None, text),
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }
    (None, text)
}

/// Read a YAML value that may be a single string or a list of strings
fn string_list(value: Option<&serde_yaml::Value>) -> Vec<String> {
    match value {
        Some(serde_yaml::Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() { Vec::new() } else { vec![s.to_string()] }
        }
        Some(serde_yaml::Value::Sequence(items)) => items
            .iter()
            .filter_map(|item| match item {
                serde_yaml::Value::String(s) => Some(s.trim().to_string()),
                serde_yaml::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Entry for one terminology note. The term defaults to the file stem.
pub fn entry_from_note(file_stem: &str, text: &str) -> Result<Option<VocabularyEntry>> {
    let (yaml, _body) = split_front_matter(text);
    let meta: serde_yaml::Value = match yaml {
        Some(block) if !block.trim().is_empty() => serde_yaml::from_str(block)?,
        _ => serde_yaml::Value::Null,
    };

    let term = meta
        .get("term")
        .and_then(|v| v.as_str())
        .map(normalize_whitespace)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| normalize_whitespace(file_stem));
    if term.is_empty() {
        return Ok(None);
    }

    let clusters = string_list(meta.get("tags"))
        .into_iter()
        .map(|t| t.trim_start_matches('#').to_string())
        .filter(|t| !t.is_empty())
        .collect();

    Ok(Some(VocabularyEntry {
        term,
        source: file_stem.to_string(),
        aliases: string_list(meta.get("aliases")),
        clusters,
    }))
}

/// Harvest entries from every note under `dir`.
///
/// A directory that cannot be walked, or a note that cannot be read or
/// whose front matter fails to parse, is skipped with a warning.
pub fn harvest_terminology(dir: &Path, extension: &str) -> Result<Vec<VocabularyEntry>> {
    let mut entries = Vec::new();
    let paths = match collect_documents(dir, extension) {
        Ok(paths) => paths,
        Err(e) => {
            tracing::warn!(directory = %dir.display(), error = %e, "skipping terminology directory");
            return Ok(entries);
        }
    };
    for path in paths {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let text = match read_document(&path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable terminology note");
                continue;
            }
        };
        match entry_from_note(&stem, &text) {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping note with unreadable front matter");
            }
        }
    }
    tracing::info!(directory = %dir.display(), terms = entries.len(), "harvested terminology notes");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vocabulary_skips_blanks() {
        let entries = parse_vocabulary("Cognitive Load Theory (CLT)\n\n  robotics  \n\t\n");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].term, "Cognitive Load Theory (CLT)");
        assert_eq!(entries[1].term, "robotics");
        assert_eq!(entries[1].source, "robotics");
    }

    #[test]
    fn test_term_is_whitespace_normalized_source_is_not() {
        let entry = VocabularyEntry::from_line("machine    learning").unwrap();
        assert_eq!(entry.term, "machine learning");
        assert_eq!(entry.source, "machine    learning");
    }

    #[test]
    fn test_missing_vocabulary_is_reported() {
        let err = load_vocabulary(Path::new("no/such/terms.md")).unwrap_err();
        assert!(matches!(err, LinkError::NotFound(_)));
    }

    #[test]
    fn test_split_front_matter() {
        let text = "---\nterm: Flow\naliases: [flow state]\n---\nBody here\n";
        let (yaml, body) = split_front_matter(text);
        assert_eq!(yaml, Some("term: Flow\naliases: [flow state]\n"));
        assert_eq!(body, "Body here\n");

        let (yaml, body) = split_front_matter("No front matter");
        assert!(yaml.is_none());
        assert_eq!(body, "No front matter");
    }

    #[test]
    fn test_unterminated_front_matter_is_body() {
        let (yaml, body) = split_front_matter("---\nterm: x\n");
        assert!(yaml.is_none());
        assert_eq!(body, "---\nterm: x\n");
    }

    #[test]
    fn test_entry_from_note() {
        let text = "---\nterm: Working Memory\naliases:\n  - WM\n  - short-term store\ntags: [\"#psychology\", cognition]\n---\nNotes.";
        let entry = entry_from_note("working-memory", text).unwrap().unwrap();
        assert_eq!(entry.term, "Working Memory");
        assert_eq!(entry.aliases, vec!["WM", "short-term store"]);
        assert_eq!(entry.clusters, vec!["psychology", "cognition"]);
        assert_eq!(entry.source, "working-memory");
    }

    #[test]
    fn test_entry_defaults_to_file_stem() {
        let entry = entry_from_note("Spaced Repetition", "Just a body").unwrap().unwrap();
        assert_eq!(entry.term, "Spaced Repetition");
        assert!(entry.aliases.is_empty());

        let entry = entry_from_note("Retrieval", "---\naliases: testing effect\n---\n").unwrap().unwrap();
        assert_eq!(entry.term, "Retrieval");
        assert_eq!(entry.aliases, vec!["testing effect"]);
    }

    #[test]
    fn test_harvest_terminology() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Flow.md"), "---\ntags: psychology\n---\n").unwrap();
        std::fs::write(dir.path().join("Broken.md"), "---\nterm: [unclosed\n---\n").unwrap();
        let entries = harvest_terminology(dir.path(), "md").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].term, "Flow");
        assert_eq!(entries[0].clusters, vec!["psychology"]);
    }

    #[test]
    fn test_harvest_skips_unreadable_note() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Flow.md"), "---\naliases: [flow state]\n---\nBody").unwrap();
        std::fs::write(dir.path().join("Latin1.md"), b"caf\xe9 note").unwrap();

        let entries = harvest_terminology(dir.path(), "md").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].term, "Flow");
    }

    #[test]
    fn test_harvest_missing_directory_is_empty() {
        let entries = harvest_terminology(Path::new("no/such/terminology"), "md").unwrap();
        assert!(entries.is_empty());
    }
}
