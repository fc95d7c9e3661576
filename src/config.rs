//! Configuration for a linking run
//!
//! One explicit value, loaded from YAML and handed to every stage.
//! Nothing here is global: two runs with two configs never interact.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};

// =============================================================================
// LLM backend
// =============================================================================

/// Settings for the external disambiguation backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Chat model name. Default: gpt-4o-mini
    #[serde(default = "default_model")]
    pub model: String,
    /// OpenAI-compatible base URL. Default: https://api.openai.com/v1
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key. Default: OPENAI_API_KEY
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Per-request timeout. Default: 30
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Occurrences resolved concurrently for one alias. Default: 4
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_model() -> String { "gpt-4o-mini".to_string() }
fn default_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_api_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_max_concurrency() -> usize { 4 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Configuration for all linking stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkerConfig {
    /// Directories whose documents are rewritten
    #[serde(default)]
    pub scan_directories: Vec<PathBuf>,
    /// Flat vocabulary: one term per line
    #[serde(default)]
    pub vocabulary_file: Option<PathBuf>,
    /// Terminology notes harvested for term/aliases/tags front matter
    #[serde(default)]
    pub terminology_directories: Vec<PathBuf>,
    /// Unambiguous table (written by `generate`, read by `link-keywords`)
    #[serde(default)]
    pub keywords_csv_file: Option<PathBuf>,
    /// Ambiguous registry (written by `generate`, read by `smart-link`)
    #[serde(default)]
    pub ambiguous_json_file: Option<PathBuf>,
    /// Author records
    #[serde(default)]
    pub authors_json_file: Option<PathBuf>,
    /// Plain name list from the bibliography export
    #[serde(default)]
    pub author_names_file: Option<PathBuf>,
    /// Extension of documents to rewrite. Default: md
    #[serde(default = "default_extension")]
    pub document_extension: String,
    /// Characters of context on each side of an ambiguous occurrence. Default: 240
    #[serde(default = "default_context_window")]
    pub context_window_chars: usize,
    /// Match author names regardless of case. Default: true
    #[serde(default = "default_true")]
    pub link_authors_case_insensitive: bool,
    #[serde(default)]
    pub llm: LlmConfig,
}

fn default_extension() -> String { "md".to_string() }
fn default_context_window() -> usize { 240 }
fn default_true() -> bool { true }

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            scan_directories: Vec::new(),
            vocabulary_file: None,
            terminology_directories: Vec::new(),
            keywords_csv_file: None,
            ambiguous_json_file: None,
            authors_json_file: None,
            author_names_file: None,
            document_extension: default_extension(),
            context_window_chars: default_context_window(),
            link_authors_case_insensitive: true,
            llm: LlmConfig::default(),
        }
    }
}

impl LinkerConfig {
    /// Load from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| LinkError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse from YAML text. An empty document yields the defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Fetch an optional path setting, naming the key when it is absent
    pub fn require<'a>(value: &'a Option<PathBuf>, key: &str) -> Result<&'a Path> {
        value
            .as_deref()
            .ok_or_else(|| LinkError::invalid_input(format!("'{}' not set in config", key)))
    }

    /// Scan directories, or an error naming the key when the list is empty
    pub fn require_scan_directories(&self) -> Result<&[PathBuf]> {
        if self.scan_directories.is_empty() {
            return Err(LinkError::invalid_input("'scan_directories' not set in config"));
        }
        Ok(&self.scan_directories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = LinkerConfig::default();
        assert_eq!(config.document_extension, "md");
        assert_eq!(config.context_window_chars, 240);
        assert!(config.link_authors_case_insensitive);
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
scan_directories:
  - "vault/Notes"
  - vault/Papers
keywords_csv_file: "unambiguous-keywords.csv"
authors_json_file: authors.json
context_window_chars: 80
llm:
  model: local-model
"#;
        let config = LinkerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.scan_directories.len(), 2);
        assert_eq!(config.scan_directories[0], PathBuf::from("vault/Notes"));
        assert_eq!(config.keywords_csv_file, Some(PathBuf::from("unambiguous-keywords.csv")));
        assert_eq!(config.context_window_chars, 80);
        assert_eq!(config.llm.model, "local-model");
        // Unset nested keys keep their defaults
        assert_eq!(config.llm.timeout_secs, 30);
        assert_eq!(config.document_extension, "md");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = LinkerConfig::from_yaml("   \n").unwrap();
        assert!(config.scan_directories.is_empty());
    }

    #[test]
    fn test_require_names_missing_key() {
        let config = LinkerConfig::default();
        let err = LinkerConfig::require(&config.keywords_csv_file, "keywords_csv_file").unwrap_err();
        assert!(err.to_string().contains("keywords_csv_file"));
        assert!(config.require_scan_directories().is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let err = LinkerConfig::load("definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, LinkError::NotFound(_)));
    }
}
