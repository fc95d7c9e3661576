//! AliasIndex: Variant → Target Multimap
//!
//! Every vocabulary entry registers all of its variants against its term.
//! After the last entry, the multimap partitions into:
//! - the **unambiguous table** (alias → exactly one target)
//! - the **ambiguous registry** (alias → two or more candidate targets)
//!
//! "MIT" as a bare term and "MIT" as the alias of
//! "Massachusetts Institute of Technology (MIT)" collide on purpose: the
//! alias lands in the registry instead of silently picking a winner.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};
use crate::linker::planner::MatchRule;
use crate::linker::variants::{connector_variants, generate_variants, ParentheticalSplitter};
use crate::linker::vocabulary::VocabularyEntry;

// =============================================================================
// Types
// =============================================================================

/// All targets and source lines registered for one alias
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AliasIndexEntry {
    pub alias: String,
    pub targets: BTreeSet<String>,
    pub source_terms: BTreeSet<String>,
}

impl AliasIndexEntry {
    pub fn is_ambiguous(&self) -> bool {
        self.targets.len() > 1
    }
}

/// One row of the unambiguous table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRow {
    pub alias: String,
    pub target: String,
    pub clusters: Vec<String>,
}

/// One record of the ambiguous registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguousEntry {
    pub alias: String,
    pub candidates: Vec<String>,
    pub source_terms: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<String>,
}

// =============================================================================
// AliasIndex
// =============================================================================

/// Running multimap from variant to targets
pub struct AliasIndex {
    entries: BTreeMap<String, AliasIndexEntry>,
    clusters: BTreeMap<String, BTreeSet<String>>,
    splitter: ParentheticalSplitter,
    term_count: usize,
}

impl Default for AliasIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl AliasIndex {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            clusters: BTreeMap::new(),
            splitter: ParentheticalSplitter::new(),
            term_count: 0,
        }
    }

    /// Build an index from a whole vocabulary
    pub fn build<I>(vocabulary: I) -> Self
    where
        I: IntoIterator<Item = VocabularyEntry>,
    {
        let mut index = Self::new();
        for entry in vocabulary {
            index.register(&entry);
        }
        tracing::debug!(
            terms = index.term_count,
            aliases = index.entries.len(),
            "alias index built"
        );
        index
    }

    /// Register every variant of one entry against its term.
    /// Registering the same entry twice changes nothing.
    pub fn register(&mut self, entry: &VocabularyEntry) {
        if entry.term.is_empty() {
            return;
        }
        self.term_count += 1;

        let mut variants = generate_variants(&entry.term, &self.splitter);
        for alias in &entry.aliases {
            variants.extend(connector_variants(alias));
        }

        for variant in variants {
            let slot = self
                .entries
                .entry(variant.clone())
                .or_insert_with(|| AliasIndexEntry {
                    alias: variant,
                    ..AliasIndexEntry::default()
                });
            slot.targets.insert(entry.term.clone());
            slot.source_terms.insert(entry.source.clone());
        }

        if !entry.clusters.is_empty() {
            self.clusters
                .entry(entry.term.clone())
                .or_default()
                .extend(entry.clusters.iter().cloned());
        }
    }

    /// Number of distinct aliases
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, alias: &str) -> Option<&AliasIndexEntry> {
        self.entries.get(alias)
    }

    fn clusters_for<'a, I>(&self, terms: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        terms
            .into_iter()
            .filter_map(|t| self.clusters.get(t))
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Split into the unambiguous table and the ambiguous registry.
    /// Both come out sorted by alias.
    pub fn partition(&self) -> (UnambiguousTable, Vec<AmbiguousEntry>) {
        let mut table = UnambiguousTable::default();
        let mut ambiguous = Vec::new();

        for (alias, entry) in &self.entries {
            if entry.is_ambiguous() {
                ambiguous.push(AmbiguousEntry {
                    alias: alias.clone(),
                    candidates: entry.targets.iter().cloned().collect(),
                    source_terms: entry.source_terms.iter().cloned().collect(),
                    clusters: self.clusters_for(&entry.targets),
                });
            } else if let Some(target) = entry.targets.iter().next() {
                table.insert(KeywordRow {
                    alias: alias.clone(),
                    target: target.clone(),
                    clusters: self.clusters_for(std::iter::once(target)),
                });
            }
        }

        (table, ambiguous)
    }
}

// =============================================================================
// Unambiguous table
// =============================================================================

const HEADER_ALIAS: &str = "Alias";
const HEADER_TARGET: &str = "LinkTarget";
const HEADER_CLUSTERS: &str = "Clusters";
const CLUSTER_SEPARATOR: &str = "; ";

/// Alias → single target, sorted by alias
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnambiguousTable {
    rows: BTreeMap<String, KeywordRow>,
}

impl UnambiguousTable {
    pub fn insert(&mut self, row: KeywordRow) {
        self.rows.insert(row.alias.clone(), row);
    }

    pub fn get(&self, alias: &str) -> Option<&str> {
        self.rows.get(alias).map(|r| r.target.as_str())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &KeywordRow> {
        self.rows.values()
    }

    /// One match rule per row
    pub fn to_rules(&self) -> Vec<MatchRule> {
        self.rows
            .values()
            .map(|row| MatchRule::new(&row.alias, &row.target))
            .collect()
    }

    /// Write as CSV with a header row. The `Clusters` column is present
    /// only when some row carries cluster tags.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| LinkError::io(path, e))?;
        self.write_to(file)?;
        tracing::info!(path = %path.display(), rows = self.len(), "wrote unambiguous table");
        Ok(())
    }

    pub fn write_to<W: std::io::Write>(&self, writer: W) -> Result<()> {
        let with_clusters = self.rows.values().any(|r| !r.clusters.is_empty());
        let mut out = csv::Writer::from_writer(writer);
        if with_clusters {
            out.write_record([HEADER_ALIAS, HEADER_TARGET, HEADER_CLUSTERS])?;
        } else {
            out.write_record([HEADER_ALIAS, HEADER_TARGET])?;
        }
        for row in self.rows.values() {
            if with_clusters {
                let clusters = row.clusters.join(CLUSTER_SEPARATOR);
                out.write_record([row.alias.as_str(), row.target.as_str(), clusters.as_str()])?;
            } else {
                out.write_record([row.alias.as_str(), row.target.as_str()])?;
            }
        }
        out.flush().map_err(|e| LinkError::io("<csv>", e))?;
        Ok(())
    }

    /// Read a table written by `write_csv`. Rows with fewer than two
    /// columns are skipped.
    pub fn read_csv(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| LinkError::io(path, e))?;
        let table = Self::read_from(file)?;
        tracing::info!(path = %path.display(), rows = table.len(), "loaded unambiguous table");
        Ok(table)
    }

    pub fn read_from<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut input = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let mut table = Self::default();
        for record in input.records() {
            let record = record?;
            let (Some(alias), Some(target)) = (record.get(0), record.get(1)) else {
                continue;
            };
            if alias.is_empty() || target.is_empty() {
                continue;
            }
            let clusters = record
                .get(2)
                .map(|c| {
                    c.split(';')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();
            table.insert(KeywordRow {
                alias: alias.to_string(),
                target: target.to_string(),
                clusters,
            });
        }
        Ok(table)
    }
}

// =============================================================================
// Ambiguous registry
// =============================================================================

/// Write the registry as pretty JSON, sorted by alias
pub fn write_ambiguous(path: &Path, entries: &[AmbiguousEntry]) -> Result<()> {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| a.alias.cmp(&b.alias));
    let file = File::create(path).map_err(|e| LinkError::io(path, e))?;
    serde_json::to_writer_pretty(file, &sorted)?;
    tracing::info!(path = %path.display(), entries = sorted.len(), "wrote ambiguous registry");
    Ok(())
}

/// Read a registry written by `write_ambiguous`
pub fn read_ambiguous(path: &Path) -> Result<Vec<AmbiguousEntry>> {
    let file = File::open(path).map_err(|e| LinkError::io(path, e))?;
    let entries: Vec<AmbiguousEntry> = serde_json::from_reader(std::io::BufReader::new(file))?;
    Ok(entries)
}

/// Reserve-only rules for every registry alias. Planned alongside the
/// unambiguous table, they keep shorter aliases out of spans the contextual
/// stage has yet to decide.
pub fn reserve_rules(entries: &[AmbiguousEntry]) -> Vec<MatchRule> {
    entries.iter().map(|e| MatchRule::reserve(&e.alias)).collect()
}

// =============================================================================
// Tests
// =============================================================================
