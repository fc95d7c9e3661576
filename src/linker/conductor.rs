//! LinkConductor: Pipeline Stages over a Corpus
//!
//! Orchestrates the linking stages the way a run is actually driven:
//!
//! ```text
//! vocabulary ──generate──► keywords.csv + ambiguous.json
//! name list ───authors───► authors.json
//! keywords.csv ─link_keywords─► documents
//! authors.json ─link_authors──► documents
//! ambiguous.json ─smart_link (Disambiguator)─► documents
//! ```
//!
//! Every stage takes its inputs from the one `LinkerConfig` the conductor
//! was built with. Per-document failures land in the `RunReport`; only a
//! missing stage input aborts a stage.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::config::LinkerConfig;
use crate::corpus::{read_document, write_document, Corpus, StageError};
use crate::error::{LinkError, Result};
use crate::linker::authors::{author_rules, load_authors, parse_author_names, write_authors};
use crate::linker::gateway::{ContextualLinker, ContextualOptions, Disambiguator, ResolutionCache};
use crate::linker::index::{
    read_ambiguous, reserve_rules, write_ambiguous, AliasIndex, AmbiguousEntry, UnambiguousTable,
};
use crate::linker::planner::RulePlan;
use crate::linker::rewriter::{RewriteOutcome, Rewriter};
use crate::linker::vocabulary::{harvest_terminology, load_vocabulary, VocabularyEntry};

// =============================================================================
// Reports
// =============================================================================

/// Outcome of one linking stage over the corpus
#[derive(Debug, Clone)]
pub struct RunReport {
    pub stage: String,
    pub started_at: DateTime<Utc>,
    pub scanned: usize,
    pub modified: usize,
    pub links_added: usize,
    pub errors: Vec<StageError>,
    pub elapsed_ms: u64,
    pub dry_run: bool,
}

impl RunReport {
    fn new(stage: &str, dry_run: bool) -> Self {
        Self {
            stage: stage.to_string(),
            started_at: Utc::now(),
            scanned: 0,
            modified: 0,
            links_added: 0,
            errors: Vec::new(),
            elapsed_ms: 0,
            dry_run,
        }
    }

    fn finish(mut self, started: instant::Instant) -> Self {
        self.elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            stage = %self.stage,
            scanned = self.scanned,
            modified = self.modified,
            links = self.links_added,
            errors = self.errors.len(),
            elapsed_ms = self.elapsed_ms,
            dry_run = self.dry_run,
            "stage complete"
        );
        self
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        let verb = if self.dry_run { "would modify" } else { "modified" };
        format!(
            "[{}] scanned {} documents, {} {}, {} links added, {} errors ({} ms)",
            self.stage,
            self.scanned,
            verb,
            self.modified,
            self.links_added,
            self.errors.len(),
            self.elapsed_ms
        )
    }
}

/// Outcome of vocabulary → table/registry generation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateReport {
    pub terms: usize,
    pub aliases: usize,
    pub unambiguous: usize,
    pub ambiguous: usize,
}

// =============================================================================
// LinkConductor
// =============================================================================

pub struct LinkConductor {
    config: LinkerConfig,
    dry_run: bool,
    rewriter: Rewriter,
}

impl LinkConductor {
    pub fn new(config: LinkerConfig) -> Self {
        Self {
            config,
            dry_run: false,
            rewriter: Rewriter::new(),
        }
    }

    /// Plan and report without writing any file
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn config(&self) -> &LinkerConfig {
        &self.config
    }

    fn corpus(&self) -> Result<Corpus> {
        let roots = self.config.require_scan_directories()?;
        Ok(Corpus::new(roots, &self.config.document_extension))
    }

    // -------------------------------------------------------------------------
    // Generation
    // -------------------------------------------------------------------------

    /// Every vocabulary entry from the flat term file and terminology notes
    pub fn load_vocabulary(&self) -> Result<Vec<VocabularyEntry>> {
        if self.config.vocabulary_file.is_none() && self.config.terminology_directories.is_empty() {
            return Err(LinkError::invalid_input(
                "'vocabulary_file' or 'terminology_directories' must be set",
            ));
        }
        let mut entries = Vec::new();
        if let Some(path) = &self.config.vocabulary_file {
            entries.extend(load_vocabulary(path)?);
        }
        for dir in &self.config.terminology_directories {
            entries.extend(harvest_terminology(dir, &self.config.document_extension)?);
        }
        Ok(entries)
    }

    /// Build the alias index and write the unambiguous table and the
    /// ambiguous registry
    pub fn generate(&self) -> Result<GenerateReport> {
        let csv_path = LinkerConfig::require(&self.config.keywords_csv_file, "keywords_csv_file")?;
        let vocabulary = self.load_vocabulary()?;
        let terms = vocabulary.len();

        let index = AliasIndex::build(vocabulary);
        let (table, ambiguous) = index.partition();
        let report = GenerateReport {
            terms,
            aliases: index.len(),
            unambiguous: table.len(),
            ambiguous: ambiguous.len(),
        };

        if self.dry_run {
            tracing::info!(?report, "dry run, tables not written");
            return Ok(report);
        }
        table.write_csv(csv_path)?;
        match &self.config.ambiguous_json_file {
            Some(path) => write_ambiguous(path, &ambiguous)?,
            None if !ambiguous.is_empty() => tracing::warn!(
                count = ambiguous.len(),
                "'ambiguous_json_file' not set, ambiguous aliases not saved"
            ),
            None => {}
        }
        Ok(report)
    }

    /// Turn the configured name list into the authors JSON.
    /// Returns the number of distinct authors.
    pub fn generate_authors(&self) -> Result<usize> {
        let names_path = LinkerConfig::require(&self.config.author_names_file, "author_names_file")?;
        let json_path = LinkerConfig::require(&self.config.authors_json_file, "authors_json_file")?;
        let authors = parse_author_names(&read_document(names_path)?);
        if !self.dry_run {
            write_authors(json_path, &authors)?;
        }
        Ok(authors.len())
    }

    // -------------------------------------------------------------------------
    // Plans
    // -------------------------------------------------------------------------

    /// Rules from the saved unambiguous table, longest first. Aliases in
    /// the ambiguous registry are planned as reserve-only rules so a
    /// shorter alias never links inside one.
    pub fn keyword_plan(&self) -> Result<RulePlan> {
        let path = LinkerConfig::require(&self.config.keywords_csv_file, "keywords_csv_file")?;
        let mut rules = UnambiguousTable::read_csv(path)?.to_rules();
        if let Some(registry) = &self.config.ambiguous_json_file {
            if registry.exists() {
                rules.extend(reserve_rules(&read_ambiguous(registry)?));
            }
        }
        RulePlan::longest_first(rules)
    }

    /// Tiered author rules, plus surnames shared by several authors
    pub fn author_plan(&self) -> Result<(RulePlan, Vec<AmbiguousEntry>)> {
        let path = LinkerConfig::require(&self.config.authors_json_file, "authors_json_file")?;
        let authors = load_authors(path)?;
        let rules = author_rules(&authors, self.config.link_authors_case_insensitive);
        Ok((rules.plan()?, rules.shared_surnames))
    }

    /// Rewrite one in-memory text with `plan`
    pub fn link_text(&self, text: &str, plan: &RulePlan) -> RewriteOutcome {
        self.rewriter.rewrite(text, plan)
    }

    // -------------------------------------------------------------------------
    // Corpus stages
    // -------------------------------------------------------------------------

    /// Direct path: unambiguous table over every document
    pub fn link_keywords(&self) -> Result<RunReport> {
        let plan = self.keyword_plan()?;
        tracing::info!(rules = plan.len(), dropped = plan.dropped(), "keyword plan ready");
        self.rewrite_corpus("link-keywords", |_, text| self.rewriter.rewrite(text, &plan))
    }

    /// Direct path: author names over every document
    pub fn link_authors(&self) -> Result<RunReport> {
        let (plan, shared) = self.author_plan()?;
        tracing::info!(rules = plan.len(), shared_surnames = shared.len(), "author plan ready");
        self.rewrite_corpus("link-authors", |_, text| self.rewriter.rewrite(text, &plan))
    }

    /// Contextual path: ambiguous keyword aliases, then shared author
    /// surnames, each occurrence decided by `chooser`
    pub async fn smart_link(&self, chooser: &dyn Disambiguator) -> Result<RunReport> {
        let started = instant::Instant::now();
        let registry = match &self.config.ambiguous_json_file {
            Some(path) => read_ambiguous(path)?,
            None => Vec::new(),
        };
        let surnames = match &self.config.authors_json_file {
            Some(path) if path.exists() => {
                let authors = load_authors(path)?;
                author_rules(&authors, self.config.link_authors_case_insensitive).shared_surnames
            }
            _ => Vec::new(),
        };
        if registry.is_empty() && surnames.is_empty() {
            if self.config.ambiguous_json_file.is_none() {
                return Err(LinkError::invalid_input("'ambiguous_json_file' not set"));
            }
            tracing::info!("no ambiguous aliases to resolve");
        }

        let options = ContextualOptions {
            window_chars: self.config.context_window_chars,
            max_concurrency: self.config.llm.max_concurrency,
            guard_citations: false,
            case_insensitive: true,
        };
        let keywords = ContextualLinker::new(&registry, chooser, options.clone())?;
        let names = ContextualLinker::new(
            &surnames,
            chooser,
            ContextualOptions {
                guard_citations: true,
                case_insensitive: self.config.link_authors_case_insensitive,
                ..options
            },
        )?;
        tracing::info!(
            keyword_aliases = keywords.len(),
            surnames = names.len(),
            chooser = chooser.name(),
            "contextual linking ready"
        );

        let mut report = RunReport::new("smart-link", self.dry_run);
        let (documents, walk_errors) = self.corpus()?.documents();
        report.errors.extend(walk_errors);

        let mut cache = ResolutionCache::new();
        let mut requests = 0;
        for path in documents {
            report.scanned += 1;
            let Some(original) = self.read(&path, &mut report) else {
                continue;
            };

            let mut text = original.clone();
            let mut links = 0;
            for linker in [&keywords, &names] {
                if linker.is_empty() {
                    continue;
                }
                let outcome = linker.link(&text, &mut cache).await;
                requests += outcome.requests;
                for failure in outcome.failures {
                    report.errors.push(StageError::new(&path, "disambiguate", failure));
                }
                links += outcome.rewrite.links.len();
                text = outcome.rewrite.text;
            }
            self.commit(&path, &original, &text, links, &mut report);
        }

        tracing::info!(requests, cache_hits = cache.hits(), "disambiguation calls");
        Ok(report.finish(started))
    }

    /// Shared per-document loop for the direct stages
    fn rewrite_corpus<F>(&self, stage: &str, mut rewrite: F) -> Result<RunReport>
    where
        F: FnMut(&Path, &str) -> RewriteOutcome,
    {
        let started = instant::Instant::now();
        let mut report = RunReport::new(stage, self.dry_run);
        let (documents, walk_errors) = self.corpus()?.documents();
        report.errors.extend(walk_errors);

        for path in documents {
            report.scanned += 1;
            let Some(original) = self.read(&path, &mut report) else {
                continue;
            };
            let outcome = rewrite(&path, &original);
            self.commit(&path, &original, &outcome.text, outcome.links.len(), &mut report);
        }

        Ok(report.finish(started))
    }

    fn read(&self, path: &Path, report: &mut RunReport) -> Option<String> {
        match read_document(path) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read document");
                report.errors.push(StageError::new(path, "read", e));
                None
            }
        }
    }

    /// Write `text` back if it differs from `original`
    fn commit(&self, path: &Path, original: &str, text: &str, links: usize, report: &mut RunReport) {
        if text == original {
            tracing::debug!(path = %path.display(), "no changes");
            return;
        }
        if !self.dry_run {
            if let Err(e) = write_document(path, text) {
                tracing::warn!(path = %path.display(), error = %e, "could not write document");
                report.errors.push(StageError::new(path, "write", e));
                return;
            }
        }
        tracing::debug!(path = %path.display(), links, "linked");
        report.modified += 1;
        report.links_added += links;
    }
}

// =============================================================================
// Tests
// =============================================================================
