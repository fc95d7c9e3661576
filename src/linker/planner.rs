//! RulePlan: Ordered, Compiled Match Rules
//!
//! Turns a set of alias → target rules into an application order plus one
//! compiled matcher per rule.
//!
//! # Ordering
//! - `longest_first`: alias length descending, then most descriptive target,
//!   so "Massachusetts Institute of Technology" claims its span before "MIT"
//! - `in_order`: caller-defined order (author tiers)
//!
//! # Reserved aliases
//! A reserve-only rule matches like any other but links nothing: it holds
//! its span so shorter aliases cannot link inside an alias that a later
//! stage still has to decide.
//!
//! # Prefilter
//! An ASCII case-insensitive Aho-Corasick automaton finds which rules can
//! fire in a document at all; only those run their regex. Case-insensitive
//! rules with non-ASCII patterns have fold classes the automaton cannot
//! mirror, so they always run.

use std::borrow::Cow;
use std::collections::HashMap;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};
use crate::linker::syntax::{is_linkable_target, is_word_char};

// =============================================================================
// Types
// =============================================================================

/// One alias → target rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchRule {
    pub pattern: String,
    pub target: String,
    /// Reject matches right after a citation-key marker (`@smith`)
    #[serde(default)]
    pub guard_citations: bool,
    #[serde(default = "default_true")]
    pub case_insensitive: bool,
    /// Occupy matches without linking them
    #[serde(default)]
    pub reserve_only: bool,
}

fn default_true() -> bool { true }

impl MatchRule {
    /// Keyword rule
    pub fn new(pattern: &str, target: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            target: target.to_string(),
            guard_citations: false,
            case_insensitive: true,
            reserve_only: false,
        }
    }

    /// Reserve-only rule for an alias decided elsewhere
    pub fn reserve(pattern: &str) -> Self {
        Self {
            reserve_only: true,
            ..Self::new(pattern, pattern)
        }
    }

    /// Person-name rule (citation keys are guarded)
    pub fn name(pattern: &str, target: &str) -> Self {
        Self {
            guard_citations: true,
            ..Self::new(pattern, target)
        }
    }

    pub fn case_sensitive(mut self) -> Self {
        self.case_insensitive = false;
        self
    }

    fn char_len(&self) -> usize {
        self.pattern.chars().count()
    }
}

/// A rule with its compiled matcher
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: MatchRule,
    matcher: Regex,
    /// Alias starts with a word character, so its left side needs a boundary
    bounded_start: bool,
    /// Alias ends with a word character, so its right side needs a boundary
    bounded_end: bool,
}

impl CompiledRule {
    pub fn compile(rule: MatchRule) -> Result<Self> {
        if rule.pattern.is_empty() {
            return Err(LinkError::invalid_input("empty match pattern"));
        }
        let matcher = RegexBuilder::new(&regex::escape(&rule.pattern))
            .case_insensitive(rule.case_insensitive)
            .build()
            .map_err(|e| LinkError::pattern(format!("'{}': {}", rule.pattern, e)))?;
        let bounded_start = rule.pattern.chars().next().map_or(false, is_word_char);
        let bounded_end = rule.pattern.chars().next_back().map_or(false, is_word_char);
        Ok(Self {
            rule,
            matcher,
            bounded_start,
            bounded_end,
        })
    }

    pub fn matcher(&self) -> &Regex {
        &self.matcher
    }

    pub fn bounded_start(&self) -> bool {
        self.bounded_start
    }

    pub fn bounded_end(&self) -> bool {
        self.bounded_end
    }
}

// =============================================================================
// RulePlan
// =============================================================================

/// Characters outside ASCII whose simple case fold lands on an ASCII letter
fn fold_to_ascii(c: char) -> char {
    match c {
        '\u{017F}' => 's', // long s
        '\u{212A}' => 'k', // Kelvin sign
        _ => c,
    }
}

/// Text as the prefilter sees it
fn prefilter_form(text: &str) -> Cow<'_, str> {
    if text.chars().any(|c| fold_to_ascii(c) != c) {
        Cow::Owned(text.chars().map(fold_to_ascii).collect())
    } else {
        Cow::Borrowed(text)
    }
}

/// Ordered, compiled rule set
pub struct RulePlan {
    rules: Vec<CompiledRule>,
    prefilter: Option<AhoCorasick>,
    /// Rule indices behind each distinct needle
    needle_rules: Vec<Vec<usize>>,
    /// Rules the prefilter cannot vouch for
    unfiltered: Vec<bool>,
    dropped: usize,
}

impl RulePlan {
    /// Sort by alias length (chars) descending. Ties go to the longer
    /// target, then alphabetical alias, then alphabetical target.
    pub fn longest_first(mut rules: Vec<MatchRule>) -> Result<Self> {
        rules.sort_by(|a, b| {
            b.char_len()
                .cmp(&a.char_len())
                .then_with(|| b.target.chars().count().cmp(&a.target.chars().count()))
                .then_with(|| a.pattern.cmp(&b.pattern))
                .then_with(|| a.target.cmp(&b.target))
        });
        Self::in_order(rules)
    }

    /// Keep the caller's order
    pub fn in_order(rules: Vec<MatchRule>) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());
        let mut dropped = 0;
        for rule in rules {
            if !is_linkable_target(&rule.target) || !is_linkable_target(&rule.pattern) {
                tracing::warn!(
                    pattern = %rule.pattern,
                    target = %rule.target,
                    "dropping rule that cannot be written as link markup"
                );
                dropped += 1;
                continue;
            }
            compiled.push(CompiledRule::compile(rule)?);
        }

        let mut needles: Vec<String> = Vec::new();
        let mut needle_rules: Vec<Vec<usize>> = Vec::new();
        let mut unfiltered = vec![false; compiled.len()];
        let mut seen: HashMap<String, usize> = HashMap::new();
        for (idx, c) in compiled.iter().enumerate() {
            if c.rule.case_insensitive && !c.rule.pattern.is_ascii() {
                unfiltered[idx] = true;
                continue;
            }
            let needle = prefilter_form(&c.rule.pattern).to_ascii_lowercase();
            match seen.get(&needle) {
                Some(&slot) => needle_rules[slot].push(idx),
                None => {
                    seen.insert(needle.clone(), needles.len());
                    needles.push(needle);
                    needle_rules.push(vec![idx]);
                }
            }
        }

        let prefilter = if needles.is_empty() {
            None
        } else {
            let automaton = AhoCorasickBuilder::new()
                .match_kind(MatchKind::Standard)
                .ascii_case_insensitive(true)
                .build(&needles)
                .map_err(|e| LinkError::pattern(format!("Failed to build automaton: {}", e)))?;
            Some(automaton)
        };

        Ok(Self {
            rules: compiled,
            prefilter,
            needle_rules,
            unfiltered,
            dropped,
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules rejected at plan time
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Rules that may match somewhere in `text`, in application order
    pub fn candidates<'p>(&'p self, text: &str) -> Vec<&'p CompiledRule> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut present = self.unfiltered.clone();
        if let Some(automaton) = &self.prefilter {
            let folded = prefilter_form(text);
            for mat in automaton.find_overlapping_iter(&*folded) {
                for &idx in &self.needle_rules[mat.pattern().as_usize()] {
                    present[idx] = true;
                }
            }
        }

        self.rules
            .iter()
            .zip(present)
            .filter_map(|(rule, hit)| hit.then_some(rule))
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(plan: &RulePlan) -> Vec<&str> {
        plan.rules().iter().map(|r| r.rule.pattern.as_str()).collect()
    }

    #[test]
    fn test_longest_first_ordering() {
        let plan = RulePlan::longest_first(vec![
            MatchRule::new("MIT", "MIT"),
            MatchRule::new("Massachusetts Institute of Technology", "Massachusetts Institute of Technology (MIT)"),
            MatchRule::new("CLT", "Cognitive Load Theory (CLT)"),
        ])
        .unwrap();
        assert_eq!(
            patterns(&plan),
            vec!["Massachusetts Institute of Technology", "CLT", "MIT"]
        );
    }

    #[test]
    fn test_tie_prefers_descriptive_target() {
        let plan = RulePlan::longest_first(vec![
            MatchRule::new("abc", "abc"),
            MatchRule::new("xyz", "Xylophone Zone (xyz)"),
        ])
        .unwrap();
        assert_eq!(patterns(&plan), vec!["xyz", "abc"]);
    }

    #[test]
    fn test_length_counts_chars_not_bytes() {
        let plan = RulePlan::longest_first(vec![
            MatchRule::new("éé", "e"),
            MatchRule::new("abc", "a"),
        ])
        .unwrap();
        assert_eq!(patterns(&plan), vec!["abc", "éé"]);
    }

    #[test]
    fn test_in_order_keeps_order() {
        let plan = RulePlan::in_order(vec![
            MatchRule::name("Smith", "Jane Q. Smith"),
            MatchRule::name("Jane Q. Smith", "Jane Q. Smith"),
        ])
        .unwrap();
        assert_eq!(patterns(&plan), vec!["Smith", "Jane Q. Smith"]);
        assert!(plan.rules()[0].rule.guard_citations);
    }

    #[test]
    fn test_unlinkable_rules_dropped() {
        let plan = RulePlan::longest_first(vec![
            MatchRule::new("ok", "fine"),
            MatchRule::new("pipe", "a|b"),
            MatchRule::new("x]]", "x"),
        ])
        .unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.dropped(), 2);
    }

    #[test]
    fn test_prefilter_candidates() {
        let plan = RulePlan::longest_first(vec![
            MatchRule::new("robotics", "robotics"),
            MatchRule::new("VR", "Virtual Reality (VR)"),
        ])
        .unwrap();
        let hits = plan.candidates("We tried vr headsets.");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].rule.pattern, "VR");
        assert!(plan.candidates("").is_empty());
    }

    #[test]
    fn test_prefilter_shares_needles() {
        let plan = RulePlan::longest_first(vec![
            MatchRule::new("MIT", "MIT"),
            MatchRule::new("mit", "Mitochondrion (mit)"),
        ])
        .unwrap();
        assert_eq!(plan.candidates("the MIT lab").len(), 2);
    }

    #[test]
    fn test_prefilter_follows_case_folding() {
        let plan = RulePlan::longest_first(vec![
            MatchRule::new("sun", "Sun"),
            MatchRule::new("Kelvin", "Kelvin"),
        ])
        .unwrap();
        // Long s and the Kelvin sign fold onto ASCII letters
        assert_eq!(plan.candidates("the \u{017F}un rises").len(), 1);
        assert_eq!(plan.candidates("\u{212A}elvin scale").len(), 1);
        assert!(plan.candidates("the moon rises").is_empty());
    }

    #[test]
    fn test_non_ascii_rules_skip_prefilter() {
        let plan = RulePlan::longest_first(vec![
            MatchRule::new("\u{3A3}\u{3BF}\u{3C6}\u{3AF}\u{3B1}", "Sophia"),
            MatchRule::new("robotics", "robotics"),
        ])
        .unwrap();
        let hits = plan.candidates("nothing relevant");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].rule.target, "Sophia");
    }

    #[test]
    fn test_reserve_rule() {
        let rule = MatchRule::reserve("New York");
        assert!(rule.reserve_only);
        assert_eq!(rule.target, "New York");
        let plan = RulePlan::longest_first(vec![
            MatchRule::new("York", "York"),
            MatchRule::reserve("New York"),
        ])
        .unwrap();
        assert_eq!(patterns(&plan), vec!["New York", "York"]);
    }

    #[test]
    fn test_boundary_flags() {
        let rule = CompiledRule::compile(MatchRule::new("(CLT)", "x")).unwrap();
        assert!(!rule.bounded_start());
        assert!(!rule.bounded_end());
        let rule = CompiledRule::compile(MatchRule::new("C++", "x")).unwrap();
        assert!(rule.bounded_start());
        assert!(!rule.bounded_end());
    }

    #[test]
    fn test_empty_plan() {
        let plan = RulePlan::longest_first(Vec::new()).unwrap();
        assert!(plan.is_empty());
        assert!(plan.candidates("anything").is_empty());
    }
}
