//! GatewayCortex: Contextual Linking of Ambiguous Aliases
//!
//! The engine never decides an ambiguous alias on its own. For every
//! occurrence it cuts a bounded context window and asks a `Disambiguator`
//! to pick one candidate or abstain.
//!
//! # Contract
//! - Request: `{alias, candidates, source_terms, context}`
//! - Answer: one candidate, verbatim, or `NONE`. Anything else is `NONE`.
//! - A failed call leaves that occurrence unlinked and is never cached
//! - Answers are cached per `(alias, context)` by the caller-owned
//!   `ResolutionCache`, so one run never asks the same question twice
//!
//! # Order
//! Entries run longest alias first. An occurrence the chooser abstains on
//! is still reserved, so a shorter alias cannot link inside it.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::linker::context::context_window;
use crate::linker::index::AmbiguousEntry;
use crate::linker::planner::{CompiledRule, MatchRule};
use crate::linker::rewriter::{RewriteOutcome, Rewriter};
use crate::linker::syntax::is_linkable_target;

/// Literal answer meaning "none of the candidates"
pub const ABSTAIN_TOKEN: &str = "NONE";

// =============================================================================
// Types
// =============================================================================

/// What the chooser is shown for one occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisambiguationRequest {
    pub alias: String,
    pub candidates: Vec<String>,
    pub source_terms: Vec<String>,
    /// `before⟦found⟧after`
    pub context: String,
}

/// External capability that picks a candidate for one occurrence.
///
/// Implementations return the raw answer from `choose`; `resolve` applies
/// the acceptance rules.
#[async_trait]
pub trait Disambiguator: Send + Sync {
    async fn choose(&self, request: &DisambiguationRequest) -> Result<String>;

    /// The chosen candidate, or `None` on abstention or an unrecognised answer
    async fn resolve(&self, request: &DisambiguationRequest) -> Result<Option<String>> {
        let raw = self.choose(request).await?;
        let decision = interpret_answer(&raw, &request.candidates);
        tracing::debug!(
            alias = %request.alias,
            answer = %raw.trim(),
            accepted = decision.is_some(),
            "disambiguation answer"
        );
        Ok(decision)
    }

    /// Short label for logs
    fn name(&self) -> &str {
        "disambiguator"
    }
}

/// Accept `answer` only if it names one candidate exactly (after trimming
/// whitespace and surrounding quotes). The abstain token and anything
/// unrecognised yield `None`.
pub fn interpret_answer(answer: &str, candidates: &[String]) -> Option<String> {
    let cleaned = answer
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`'))
        .trim();
    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case(ABSTAIN_TOKEN) {
        return None;
    }
    candidates.iter().find(|c| c.as_str() == cleaned).cloned()
}

// =============================================================================
// ResolutionCache
// =============================================================================

/// Decisions keyed by `(alias, context)`, owned by the caller for one run
#[derive(Debug, Default)]
pub struct ResolutionCache {
    decisions: HashMap<(String, String), Option<String>>,
    hits: usize,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&mut self, alias: &str, context: &str) -> Option<Option<String>> {
        let found = self
            .decisions
            .get(&(alias.to_string(), context.to_string()))
            .cloned();
        if found.is_some() {
            self.hits += 1;
        }
        found
    }

    fn contains(&self, alias: &str, context: &str) -> bool {
        self.decisions
            .contains_key(&(alias.to_string(), context.to_string()))
    }

    pub fn insert(&mut self, alias: &str, context: &str, decision: Option<String>) {
        self.decisions
            .insert((alias.to_string(), context.to_string()), decision);
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// Lookups answered without an external call
    pub fn hits(&self) -> usize {
        self.hits
    }
}

// =============================================================================
// ContextualLinker
// =============================================================================

#[derive(Debug, Clone)]
pub struct ContextualOptions {
    /// Context window budget in characters
    pub window_chars: usize,
    /// Simultaneous chooser calls per document
    pub max_concurrency: usize,
    /// Reject occurrences right after `@` (person-name registries)
    pub guard_citations: bool,
    pub case_insensitive: bool,
}

impl Default for ContextualOptions {
    fn default() -> Self {
        Self {
            window_chars: 240,
            max_concurrency: 4,
            guard_citations: false,
            case_insensitive: true,
        }
    }
}

/// Result of contextual linking over one document
#[derive(Debug, Clone, Default)]
pub struct ContextualOutcome {
    pub rewrite: RewriteOutcome,
    pub occurrences: usize,
    /// External calls made
    pub requests: usize,
    pub abstained: usize,
    /// One message per failed call
    pub failures: Vec<String>,
}

struct PreparedEntry {
    entry: AmbiguousEntry,
    rule: CompiledRule,
}

/// Links ambiguous-registry aliases through a `Disambiguator`
pub struct ContextualLinker<'a> {
    entries: Vec<PreparedEntry>,
    chooser: &'a dyn Disambiguator,
    options: ContextualOptions,
    rewriter: Rewriter,
}

impl<'a> ContextualLinker<'a> {
    pub fn new(
        entries: &[AmbiguousEntry],
        chooser: &'a dyn Disambiguator,
        options: ContextualOptions,
    ) -> Result<Self> {
        let mut sorted: Vec<&AmbiguousEntry> = entries.iter().collect();
        sorted.sort_by(|a, b| {
            b.alias
                .chars()
                .count()
                .cmp(&a.alias.chars().count())
                .then_with(|| a.alias.cmp(&b.alias))
        });

        let mut prepared = Vec::with_capacity(sorted.len());
        for entry in sorted {
            let candidates: Vec<String> = entry
                .candidates
                .iter()
                .filter(|c| is_linkable_target(c))
                .cloned()
                .collect();
            if candidates.is_empty() || !is_linkable_target(&entry.alias) {
                tracing::warn!(alias = %entry.alias, "skipping ambiguous entry with no linkable candidates");
                continue;
            }

            let mut rule = if options.guard_citations {
                MatchRule::name(&entry.alias, &entry.alias)
            } else {
                MatchRule::new(&entry.alias, &entry.alias)
            };
            if !options.case_insensitive {
                rule = rule.case_sensitive();
            }
            prepared.push(PreparedEntry {
                entry: AmbiguousEntry {
                    candidates,
                    ..entry.clone()
                },
                rule: CompiledRule::compile(rule)?,
            });
        }

        Ok(Self {
            entries: prepared,
            chooser,
            options,
            rewriter: Rewriter::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve every ambiguous occurrence in `text`
    pub async fn link(&self, text: &str, cache: &mut ResolutionCache) -> ContextualOutcome {
        let started = instant::Instant::now();
        let mut session = self.rewriter.session(text);
        let mut outcome = ContextualOutcome::default();

        for prepared in &self.entries {
            let ranges = session.occurrences(&prepared.rule);
            if ranges.is_empty() {
                continue;
            }
            outcome.occurrences += ranges.len();

            let contexts: Vec<String> = ranges
                .iter()
                .map(|r| context_window(text, r.clone(), self.options.window_chars).render())
                .collect();

            // Distinct questions the cache cannot answer yet
            let mut pending: Vec<DisambiguationRequest> = Vec::new();
            for context in &contexts {
                let asked = pending.iter().any(|p| &p.context == context);
                if !asked && !cache.contains(&prepared.entry.alias, context) {
                    pending.push(DisambiguationRequest {
                        alias: prepared.entry.alias.clone(),
                        candidates: prepared.entry.candidates.clone(),
                        source_terms: prepared.entry.source_terms.clone(),
                        context: context.clone(),
                    });
                }
            }
            outcome.requests += pending.len();

            let chooser = self.chooser;
            let answers: Vec<(DisambiguationRequest, Result<Option<String>>)> = stream::iter(pending)
                .map(|request| async move {
                    let answer = chooser.resolve(&request).await;
                    (request, answer)
                })
                .buffer_unordered(self.options.max_concurrency.max(1))
                .collect()
                .await;

            for (request, answer) in answers {
                match answer {
                    Ok(decision) => cache.insert(&request.alias, &request.context, decision),
                    Err(e) => {
                        tracing::warn!(
                            chooser = chooser.name(),
                            alias = %request.alias,
                            error = %e,
                            "disambiguation failed, leaving occurrence unlinked"
                        );
                        outcome.failures.push(format!("{}: {}", request.alias, e));
                    }
                }
            }

            for (range, context) in ranges.into_iter().zip(&contexts) {
                match cache.lookup(&prepared.entry.alias, context).flatten() {
                    Some(target) => session.claim(range, &target),
                    None => {
                        outcome.abstained += 1;
                        session.reserve(range);
                    }
                }
            }
        }

        outcome.rewrite = session.finish();
        outcome.rewrite.stats.rules_in_plan = self.entries.len();
        outcome.rewrite.stats.elapsed_us = started.elapsed().as_micros() as u64;
        outcome
    }
}

// =============================================================================
// Tests
// =============================================================================
