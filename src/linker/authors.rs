//! AuthorCortex: Person Names as Link Rules
//!
//! Author records come from a bibliography export as a flat list of names.
//! Each person contributes two rules:
//! - **full name** → direct link (`[[Jane Q. Smith]]`)
//! - **surname** → piped link back to the full name (`[[Jane Q. Smith|Smith]]`)
//!
//! Rules are tiered: every full name (longest first) runs before any
//! surname, so one person's surname never claims part of another person's
//! full name. A surname shared by several authors is not guessed at; it
//! goes to the ambiguous registry instead.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};
use crate::linker::index::AmbiguousEntry;
use crate::linker::planner::{MatchRule, RulePlan};
use crate::linker::variants::normalize_whitespace;

/// Surnames shorter than this (in chars) never become rules
pub const MIN_SURNAME_LEN: usize = 2;

/// Lowercase name particles that belong to the surname ("van Gogh")
const SURNAME_PARTICLES: &[&str] = &["von", "van", "de", "der", "da", "di", "du", "la", "le"];

// ==================== TYPE DEFINITIONS ====================

/// One person, as stored in the authors JSON
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorRecord {
    pub full_name: String,
    /// Given + middle names
    #[serde(default)]
    pub first_name: String,
    pub last_name: String,
}

impl AuthorRecord {
    pub fn from_parts(first: &str, last: &str) -> Option<Self> {
        let first = normalize_whitespace(first);
        let last = normalize_whitespace(last);
        if last.is_empty() && first.is_empty() {
            return None;
        }
        // A lone name is treated as the surname
        let (first, last) = if last.is_empty() { (String::new(), first) } else { (first, last) };
        let full_name = if first.is_empty() {
            last.clone()
        } else {
            format!("{first} {last}")
        };
        Some(Self {
            full_name,
            first_name: first,
            last_name: last,
        })
    }

    /// Parse `Last, First Middle`, `Last, Suffix, First` or `First Middle Last`
    pub fn parse_name(raw: &str) -> Option<Self> {
        let raw = normalize_whitespace(raw);
        if raw.is_empty() {
            return None;
        }

        if raw.contains(',') {
            let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
            return match parts.as_slice() {
                [last, first] => Self::from_parts(first, last),
                // suffix (Jr., III) is dropped
                [last, _suffix, first, ..] => Self::from_parts(first, last),
                _ => None,
            };
        }

        let tokens: Vec<&str> = raw.split(' ').collect();
        if tokens.len() == 1 {
            return Self::from_parts("", tokens[0]);
        }
        let mut split = tokens.len() - 1;
        while split > 1 && SURNAME_PARTICLES.contains(&tokens[split - 1]) {
            split -= 1;
        }
        Self::from_parts(&tokens[..split].join(" "), &tokens[split..].join(" "))
    }
}

/// Compiled author rules plus the surnames left for disambiguation
#[derive(Debug, Clone, Default)]
pub struct AuthorRules {
    pub rules: Vec<MatchRule>,
    pub shared_surnames: Vec<AmbiguousEntry>,
}

impl AuthorRules {
    /// Plan in tier order (no re-sorting)
    pub fn plan(&self) -> Result<RulePlan> {
        RulePlan::in_order(self.rules.clone())
    }
}

// ==================== AUTHOR LIST I/O ====================

/// Parse a name list (one name per line, `#` comments allowed).
/// Deduplicated by full name and sorted by full name.
pub fn parse_author_names(text: &str) -> Vec<AuthorRecord> {
    let mut unique: BTreeMap<String, AuthorRecord> = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match AuthorRecord::parse_name(line) {
            Some(record) => {
                unique.insert(record.full_name.clone(), record);
            }
            None => tracing::warn!(line = %line, "skipping unparseable author name"),
        }
    }
    unique.into_values().collect()
}

/// Longest full name first; ties alphabetical
pub fn sort_longest_first(authors: &mut [AuthorRecord]) {
    authors.sort_by(|a, b| {
        b.full_name
            .chars()
            .count()
            .cmp(&a.full_name.chars().count())
            .then_with(|| a.full_name.cmp(&b.full_name))
    });
}

/// Load the authors JSON, sorted longest full name first
pub fn load_authors(path: &Path) -> Result<Vec<AuthorRecord>> {
    let file = File::open(path).map_err(|e| LinkError::io(path, e))?;
    let mut authors: Vec<AuthorRecord> = serde_json::from_reader(std::io::BufReader::new(file))?;
    authors.retain(|a| !a.full_name.trim().is_empty());
    sort_longest_first(&mut authors);
    tracing::info!(path = %path.display(), authors = authors.len(), "loaded authors");
    Ok(authors)
}

pub fn write_authors(path: &Path, authors: &[AuthorRecord]) -> Result<()> {
    let file = File::create(path).map_err(|e| LinkError::io(path, e))?;
    serde_json::to_writer_pretty(file, authors)?;
    tracing::info!(path = %path.display(), authors = authors.len(), "wrote authors");
    Ok(())
}

// ==================== RULE TIERS ====================

/// Build tiered author rules.
///
/// Tier 1: full names, longest first. Tier 2: unshared surnames, longest
/// first. Surnames shorter than `MIN_SURNAME_LEN`, or identical to the
/// full name, produce no rule.
pub fn author_rules(authors: &[AuthorRecord], case_insensitive: bool) -> AuthorRules {
    let finish = |rule: MatchRule| {
        if case_insensitive { rule } else { rule.case_sensitive() }
    };

    let mut people = authors.to_vec();
    sort_longest_first(&mut people);
    people.dedup_by(|a, b| a.full_name == b.full_name);

    let mut rules: Vec<MatchRule> = people
        .iter()
        .map(|p| finish(MatchRule::name(&p.full_name, &p.full_name)))
        .collect();

    let mut by_surname: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for person in &people {
        let last = person.last_name.trim();
        if last.chars().count() < MIN_SURNAME_LEN || last == person.full_name {
            continue;
        }
        by_surname.entry(last).or_default().insert(person.full_name.as_str());
    }

    let mut surnames: Vec<(&str, &str)> = Vec::new();
    let mut shared_surnames = Vec::new();
    for (last, owners) in &by_surname {
        if owners.len() > 1 {
            let candidates: Vec<String> = owners.iter().map(|s| s.to_string()).collect();
            shared_surnames.push(AmbiguousEntry {
                alias: last.to_string(),
                source_terms: candidates.clone(),
                candidates,
                clusters: Vec::new(),
            });
        } else if let Some(owner) = owners.iter().next() {
            surnames.push((*last, *owner));
        }
    }
    surnames.sort_by(|a, b| {
        b.0.chars()
            .count()
            .cmp(&a.0.chars().count())
            .then_with(|| a.0.cmp(b.0))
    });
    rules.extend(surnames.into_iter().map(|(last, full)| finish(MatchRule::name(last, full))));

    if !shared_surnames.is_empty() {
        tracing::info!(count = shared_surnames.len(), "surnames shared by several authors left for disambiguation");
    }

    AuthorRules {
        rules,
        shared_surnames,
    }
}

// ==================== TESTS ====================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::rewriter::Rewriter;

    fn person(name: &str) -> AuthorRecord {
        AuthorRecord::parse_name(name).unwrap()
    }

    fn link(text: &str, authors: &[AuthorRecord]) -> String {
        let plan = author_rules(authors, false).plan().unwrap();
        Rewriter::new().rewrite(text, &plan).text
    }

    // -------------------------------------------------------------------------
    // Requirement 1: Name parsing
    // -------------------------------------------------------------------------
    #[test]
    fn test_parse_first_last() {
        let p = person("Jane Q. Smith");
        assert_eq!(p.full_name, "Jane Q. Smith");
        assert_eq!(p.first_name, "Jane Q.");
        assert_eq!(p.last_name, "Smith");
    }

    #[test]
    fn test_parse_last_comma_first() {
        let p = person("Smith,  Jane Q.");
        assert_eq!(p.full_name, "Jane Q. Smith");
        assert_eq!(p.last_name, "Smith");

        let p = person("King, Jr., Martin Luther");
        assert_eq!(p.full_name, "Martin Luther King");
        assert_eq!(p.first_name, "Martin Luther");
    }

    #[test]
    fn test_parse_particles() {
        let p = person("Ludwig van Beethoven");
        assert_eq!(p.last_name, "van Beethoven");
        assert_eq!(p.first_name, "Ludwig");

        let p = person("van der Waals, Johannes");
        assert_eq!(p.full_name, "Johannes van der Waals");
        assert_eq!(p.last_name, "van der Waals");
    }

    #[test]
    fn test_parse_single_name() {
        let p = person("Plato");
        assert_eq!(p.full_name, "Plato");
        assert_eq!(p.last_name, "Plato");
        assert_eq!(p.first_name, "");
        assert!(AuthorRecord::parse_name("  ").is_none());
    }

    #[test]
    fn test_parse_author_names_dedup_sorted() {
        let authors = parse_author_names("Smith, Jane Q.\n# comment\n\nJane Q. Smith\nAda Lovelace\n");
        let names: Vec<&str> = authors.iter().map(|a| a.full_name.as_str()).collect();
        assert_eq!(names, vec!["Ada Lovelace", "Jane Q. Smith"]);
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_string(&person("Ada Lovelace")).unwrap();
        assert_eq!(json, r#"{"fullName":"Ada Lovelace","firstName":"Ada","lastName":"Lovelace"}"#);
    }

    #[test]
    fn test_load_sorts_longest_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("authors.json");
        write_authors(&path, &[person("Jo Li"), person("Jane Q. Smith"), person("Ada Lovelace")]).unwrap();
        let loaded = load_authors(&path).unwrap();
        let names: Vec<&str> = loaded.iter().map(|a| a.full_name.as_str()).collect();
        assert_eq!(names, vec!["Jane Q. Smith", "Ada Lovelace", "Jo Li"]);
    }

    // -------------------------------------------------------------------------
    // Requirement 2: Two-tier rules (Scenario D)
    // -------------------------------------------------------------------------
    #[test]
    fn test_scenario_d() {
        let out = link("Smith and Jane Q. Smith agree.", &[person("Jane Q. Smith")]);
        assert_eq!(out, "[[Jane Q. Smith|Smith]] and [[Jane Q. Smith]] agree.");
    }

    #[test]
    fn test_full_names_precede_all_surnames() {
        // "Lee" must not claim the tail of "Ann Lee Park"
        let authors = [person("Ann Lee Park"), person("Bo Lee")];
        let rules = author_rules(&authors, false);
        let patterns: Vec<&str> = rules.rules.iter().map(|r| r.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["Ann Lee Park", "Bo Lee", "Park", "Lee"]);

        let out = link("Ann Lee Park met Lee.", &authors);
        assert_eq!(out, "[[Ann Lee Park]] met [[Bo Lee|Lee]].");
    }

    #[test]
    fn test_citation_keys_untouched() {
        let out = link("As @Smith2020 and @Smith note.", &[person("Jane Q. Smith")]);
        assert_eq!(out, "As @Smith2020 and @Smith note.");
    }

    #[test]
    fn test_case_sensitive_by_request() {
        let authors = [person("Rose Tyler")];
        assert_eq!(link("a tyler", &authors), "a tyler");

        let plan = author_rules(&authors, true).plan().unwrap();
        let out = Rewriter::new().rewrite("a tyler", &plan).text;
        assert_eq!(out, "a [[Rose Tyler|tyler]]");
    }

    // -------------------------------------------------------------------------
    // Requirement 3: Shared and degenerate surnames
    // -------------------------------------------------------------------------
    #[test]
    fn test_shared_surname_goes_to_registry() {
        let authors = [person("Jane Smith"), person("John Smith"), person("Ada Lovelace")];
        let rules = author_rules(&authors, false);
        assert!(!rules.rules.iter().any(|r| r.pattern == "Smith"));
        assert_eq!(rules.shared_surnames.len(), 1);
        assert_eq!(rules.shared_surnames[0].alias, "Smith");
        assert_eq!(rules.shared_surnames[0].candidates, vec!["Jane Smith", "John Smith"]);

        let out = link("Smith cites Lovelace.", &authors);
        assert_eq!(out, "Smith cites [[Ada Lovelace|Lovelace]].");
    }

    #[test]
    fn test_short_and_single_surnames_skipped() {
        let rules = author_rules(&[person("Wu X"), person("Plato")], false);
        let patterns: Vec<&str> = rules.rules.iter().map(|r| r.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["Plato", "Wu X"]);
    }
}
