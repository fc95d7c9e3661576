//! Corpus I/O shell
//!
//! Directory walking, UTF-8 reads and write-if-changed. The linking engine
//! itself never touches the filesystem; everything it needs passes through
//! here as plain `String`s.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};

/// Non-fatal failure on one item of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageError {
    pub path: PathBuf,
    pub phase: String,
    pub message: String,
}

impl StageError {
    pub fn new(path: impl Into<PathBuf>, phase: &str, message: impl ToString) -> Self {
        Self {
            path: path.into(),
            phase: phase.to_string(),
            message: message.to_string(),
        }
    }
}

/// Recursively collect files with the given extension, sorted by path
pub fn collect_documents(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    collect_into(root, extension, &mut out)?;
    out.sort();
    Ok(out)
}

fn collect_into(dir: &Path, extension: &str, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| LinkError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| LinkError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| LinkError::io(&path, e))?;
        if file_type.is_dir() {
            // Hidden folders (.obsidian, .git, .trash) hold no notes
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with('.'));
            if !hidden {
                // An unlistable subfolder costs only its own notes
                if let Err(e) = collect_into(&path, extension, out) {
                    tracing::warn!(directory = %path.display(), error = %e, "skipping unreadable folder");
                }
            }
        } else if has_extension(&path, extension) {
            out.push(path);
        }
    }
    Ok(())
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case(extension.trim_start_matches('.')))
}

/// A set of root directories scanned for documents
#[derive(Debug, Clone)]
pub struct Corpus {
    roots: Vec<PathBuf>,
    extension: String,
}

impl Corpus {
    pub fn new(roots: &[PathBuf], extension: &str) -> Self {
        Self {
            roots: roots.to_vec(),
            extension: extension.to_string(),
        }
    }

    /// All documents under every root. A missing or unreadable root is
    /// reported and skipped; the remaining roots are still walked.
    pub fn documents(&self) -> (Vec<PathBuf>, Vec<StageError>) {
        let mut documents = Vec::new();
        let mut errors = Vec::new();
        for root in &self.roots {
            if !root.is_dir() {
                tracing::warn!(directory = %root.display(), "directory not found, skipping");
                errors.push(StageError::new(root, "walk", "directory not found"));
                continue;
            }
            match collect_documents(root, &self.extension) {
                Ok(found) => {
                    tracing::debug!(directory = %root.display(), count = found.len(), "collected documents");
                    documents.extend(found);
                }
                Err(e) => {
                    tracing::warn!(directory = %root.display(), error = %e, "directory walk failed");
                    errors.push(StageError::new(root, "walk", e));
                }
            }
        }
        (documents, errors)
    }
}

/// Read a whole document as UTF-8
pub fn read_document(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| LinkError::io(path, e))
}

/// Overwrite a document
pub fn write_document(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).map_err(|e| LinkError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_filters_extension_and_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::create_dir_all(root.join(".obsidian")).unwrap();
        fs::write(root.join("a.md"), "a").unwrap();
        fs::write(root.join("sub/b.MD"), "b").unwrap();
        fs::write(root.join("sub/c.txt"), "c").unwrap();
        fs::write(root.join(".obsidian/d.md"), "d").unwrap();

        let docs = collect_documents(root, "md").unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].ends_with("a.md"));
        assert!(docs[1].ends_with("sub/b.MD"));
    }

    #[test]
    fn test_missing_root_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x.md"), "x").unwrap();
        let corpus = Corpus::new(
            &[dir.path().join("nope"), dir.path().to_path_buf()],
            ".md",
        );
        let (docs, errors) = corpus.documents();
        assert_eq!(docs.len(), 1);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].phase, "walk");
    }

    #[test]
    fn test_read_write_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.md");
        write_document(&path, "héllo [[World]]").unwrap();
        assert_eq!(read_document(&path).unwrap(), "héllo [[World]]");
        assert!(matches!(
            read_document(&dir.path().join("missing.md")),
            Err(LinkError::NotFound(_))
        ));
    }
}
