//! RewriteCortex: Ordered Rule Interpreter over one Document
//!
//! Applies a `RulePlan` to text in a single planning pass:
//! 1. Existing Link Markup is marked opaque before any rule runs
//! 2. Each rule, in plan order, scans left to right for whole-word matches
//!    that do not touch an occupied span and pass the link guards
//! 3. Accepted matches are claimed; later rules see a claimed span exactly
//!    as they would see the Link Markup it becomes. Matches of a
//!    reserve-only rule are held back unlinked
//! 4. Claims are spliced into the output in one go
//!
//! Re-running over the output changes nothing: every claim is now opaque
//! markup, and everything outside it reads the same as before.

use std::collections::{BTreeMap, HashSet};
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::linker::planner::{CompiledRule, RulePlan};
use crate::linker::syntax::{
    is_word_char, render_link, LinkSyntax, CITATION_MARKER, LINK_CLOSE, LINK_OPEN, LINK_PIPE,
};

// =============================================================================
// Types
// =============================================================================

/// One link produced by a rewrite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEdit {
    /// Byte offsets in the input text
    pub start: usize,
    pub end: usize,
    pub target: String,
    /// Text as found in the document, casing preserved
    pub found: String,
}

/// Timing + counters for one rewrite
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewriteStats {
    pub rules_in_plan: usize,
    pub rules_considered: usize,
    pub rules_fired: usize,
    pub links_added: usize,
    pub elapsed_us: u64,
}

/// Result of rewriting one document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewriteOutcome {
    pub text: String,
    pub changed: bool,
    pub links: Vec<LinkEdit>,
    pub stats: RewriteStats,
}

// =============================================================================
// Occupancy
// =============================================================================

/// Spans no rule may touch: existing markup, claims, reserved occurrences
#[derive(Debug, Default)]
struct Occupancy {
    /// start → end, non-overlapping
    spans: BTreeMap<usize, usize>,
    claim_starts: HashSet<usize>,
    claim_ends: HashSet<usize>,
}

impl Occupancy {
    fn overlaps(&self, range: &Range<usize>) -> bool {
        // Last span starting before the candidate ends
        match self.spans.range(..range.end).next_back() {
            Some((_, &end)) => end > range.start,
            None => false,
        }
    }

    fn occupy(&mut self, range: &Range<usize>) {
        self.spans.insert(range.start, range.end);
    }

    fn claim(&mut self, range: &Range<usize>) {
        self.occupy(range);
        self.claim_starts.insert(range.start);
        self.claim_ends.insert(range.end);
    }
}

// =============================================================================
// RewriteSession
// =============================================================================

/// Planning state for one document.
///
/// Used directly by the contextual stage, which decides occurrence by
/// occurrence instead of rule by rule.
pub struct RewriteSession<'t> {
    text: &'t str,
    occupancy: Occupancy,
    edits: Vec<LinkEdit>,
}

impl<'t> RewriteSession<'t> {
    pub fn new(text: &'t str, syntax: &LinkSyntax) -> Self {
        let mut occupancy = Occupancy::default();
        for (start, end) in syntax.opaque_ranges(text) {
            occupancy.occupy(&(start..end));
        }
        Self {
            text,
            occupancy,
            edits: Vec::new(),
        }
    }

    pub fn text(&self) -> &'t str {
        self.text
    }

    /// Character left of `pos`, reading a claimed span as its closing `]`
    fn char_before(&self, pos: usize) -> Option<char> {
        if self.occupancy.claim_ends.contains(&pos) {
            return Some(']');
        }
        self.text[..pos].chars().next_back()
    }

    /// Character right of `pos`, reading a claimed span as its opening `[`
    fn char_after(&self, pos: usize) -> Option<char> {
        if self.occupancy.claim_starts.contains(&pos) {
            return Some('[');
        }
        self.text[pos..].chars().next()
    }

    /// Whole-word + link-opacity guard for one candidate span
    fn accepts(&self, rule: &CompiledRule, range: &Range<usize>) -> bool {
        if self.occupancy.overlaps(range) {
            return false;
        }
        if rule.bounded_start() && self.char_before(range.start).map_or(false, is_word_char) {
            return false;
        }
        if rule.bounded_end() && self.char_after(range.end).map_or(false, is_word_char) {
            return false;
        }

        let after_claim = self.occupancy.claim_ends.contains(&range.start);
        let before_claim = self.occupancy.claim_starts.contains(&range.end);

        if !after_claim && self.text[..range.start].ends_with(LINK_OPEN) {
            return false;
        }
        if !before_claim {
            let rest = &self.text[range.end..];
            if rest.starts_with(LINK_PIPE) || rest.starts_with(LINK_CLOSE) {
                return false;
            }
        }
        if rule.rule.guard_citations && self.char_before(range.start) == Some(CITATION_MARKER) {
            return false;
        }
        true
    }

    /// Accepted, mutually non-overlapping occurrences of `rule`, left to right
    pub fn occurrences(&self, rule: &CompiledRule) -> Vec<Range<usize>> {
        let text = self.text;
        let mut found = Vec::new();
        let mut pos = 0;
        while pos < text.len() {
            let Some(m) = rule.matcher().find_at(text, pos) else {
                break;
            };
            let range = m.range();
            if range.is_empty() {
                break;
            }
            if self.accepts(rule, &range) {
                pos = range.end;
                found.push(range);
            } else {
                // Retry one character further on
                pos = range.start
                    + text[range.start..]
                        .chars()
                        .next()
                        .map_or(1, char::len_utf8);
            }
        }
        found
    }

    /// Claim `range` as a link to `target`
    pub fn claim(&mut self, range: Range<usize>, target: &str) {
        self.occupancy.claim(&range);
        self.edits.push(LinkEdit {
            start: range.start,
            end: range.end,
            target: target.to_string(),
            found: self.text[range.clone()].to_string(),
        });
    }

    /// Mark `range` as seen but left unlinked, so no shorter alias claims inside it
    pub fn reserve(&mut self, range: Range<usize>) {
        self.occupancy.occupy(&range);
    }

    /// Claim every occurrence of one rule (reserve it, for a reserve-only
    /// rule). Returns how many were claimed.
    pub fn apply_rule(&mut self, rule: &CompiledRule) -> usize {
        let hits = self.occurrences(rule);
        if rule.rule.reserve_only {
            for range in hits {
                self.reserve(range);
            }
            return 0;
        }
        let count = hits.len();
        for range in hits {
            self.claim(range, &rule.rule.target);
        }
        count
    }

    pub fn edit_count(&self) -> usize {
        self.edits.len()
    }

    /// Splice all claims into the text
    pub fn finish(self) -> RewriteOutcome {
        let mut edits = self.edits;
        edits.sort_by_key(|e| e.start);

        let mut out = String::with_capacity(self.text.len() + edits.len() * 8);
        let mut cursor = 0;
        for edit in &edits {
            out.push_str(&self.text[cursor..edit.start]);
            out.push_str(&render_link(&edit.target, &edit.found));
            cursor = edit.end;
        }
        out.push_str(&self.text[cursor..]);

        let changed = out != self.text;
        RewriteOutcome {
            text: out,
            changed,
            stats: RewriteStats {
                links_added: edits.len(),
                ..RewriteStats::default()
            },
            links: edits,
        }
    }
}

// =============================================================================
// Rewriter
// =============================================================================

/// Applies rule plans to documents. Holds no per-document state.
#[derive(Default)]
pub struct Rewriter {
    syntax: LinkSyntax,
}

impl Rewriter {
    pub fn new() -> Self {
        Self {
            syntax: LinkSyntax::new(),
        }
    }

    pub fn syntax(&self) -> &LinkSyntax {
        &self.syntax
    }

    /// Start a session for manual, occurrence-level planning
    pub fn session<'t>(&self, text: &'t str) -> RewriteSession<'t> {
        RewriteSession::new(text, &self.syntax)
    }

    /// Apply every rule of `plan`, in order, to `text`
    pub fn rewrite(&self, text: &str, plan: &RulePlan) -> RewriteOutcome {
        let started = instant::Instant::now();
        let candidates = plan.candidates(text);

        let mut session = self.session(text);
        let mut fired = 0;
        for rule in &candidates {
            if session.apply_rule(rule) > 0 {
                fired += 1;
            }
        }

        let mut outcome = session.finish();
        outcome.stats.rules_in_plan = plan.len();
        outcome.stats.rules_considered = candidates.len();
        outcome.stats.rules_fired = fired;
        outcome.stats.elapsed_us = started.elapsed().as_micros() as u64;
        outcome
    }
}

// =============================================================================
// Tests (one per contract clause)
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::index::AliasIndex;
    use crate::linker::planner::MatchRule;
    use crate::linker::vocabulary::parse_vocabulary;

    fn scenario_plan() -> RulePlan {
        let index = AliasIndex::build(parse_vocabulary(
            "Cognitive Load Theory (CLT)\nMassachusetts Institute of Technology (MIT)\nMIT\nrobotics",
        ));
        let (table, _) = index.partition();
        RulePlan::longest_first(table.to_rules()).unwrap()
    }

    fn rewrite(text: &str, rules: Vec<MatchRule>) -> String {
        let plan = RulePlan::longest_first(rules).unwrap();
        Rewriter::new().rewrite(text, &plan).text
    }

    // -------------------------------------------------------------------------
    // Requirement 1: Scenario B - piped alias link
    // -------------------------------------------------------------------------
    #[test]
    fn test_scenario_b() {
        let outcome = Rewriter::new().rewrite("We discussed CLT today.", &scenario_plan());
        assert_eq!(outcome.text, "We discussed [[Cognitive Load Theory (CLT)|CLT]] today.");
        assert!(outcome.changed);
        assert_eq!(outcome.links.len(), 1);
        assert_eq!(outcome.links[0].found, "CLT");
    }

    // -------------------------------------------------------------------------
    // Requirement 2: Scenario C - existing markup is opaque
    // -------------------------------------------------------------------------
    #[test]
    fn test_scenario_c() {
        let text = "Notes on [[Cognitive Load Theory (CLT)|CLT]] and more.";
        let outcome = Rewriter::new().rewrite(text, &scenario_plan());
        assert_eq!(outcome.text, text);
        assert!(!outcome.changed);
    }

    // -------------------------------------------------------------------------
    // Requirement 3: Longest match wins
    // -------------------------------------------------------------------------
    #[test]
    fn test_longest_match_precedence() {
        let outcome = Rewriter::new().rewrite(
            "She studied at the Massachusetts Institute of Technology in 1990.",
            &scenario_plan(),
        );
        assert_eq!(
            outcome.text,
            "She studied at the [[Massachusetts Institute of Technology (MIT)|Massachusetts Institute of Technology]] in 1990."
        );
    }

    #[test]
    fn test_full_line_alias_links_direct() {
        let outcome = Rewriter::new().rewrite(
            "Read about Cognitive Load Theory (CLT), then robotics.",
            &scenario_plan(),
        );
        assert_eq!(
            outcome.text,
            "Read about [[Cognitive Load Theory (CLT)]], then [[robotics]]."
        );
    }

    // -------------------------------------------------------------------------
    // Requirement 4: Whole words only
    // -------------------------------------------------------------------------
    #[test]
    fn test_no_partial_words() {
        let rules = vec![MatchRule::new("art", "Art")];
        assert_eq!(rewrite("smart art artist", rules), "smart [[Art]] artist");
    }

    #[test]
    fn test_punctuation_edge_is_its_own_boundary() {
        let rules = vec![MatchRule::new("C++", "C++ (language)")];
        assert_eq!(rewrite("I like C++!", rules.clone()), "I like [[C++ (language)|C++]]!");
        assert_eq!(rewrite("xC++", rules), "xC++");
    }

    // -------------------------------------------------------------------------
    // Requirement 5: Case-insensitive match, case-preserving output
    // -------------------------------------------------------------------------
    #[test]
    fn test_case_preservation() {
        let rules = vec![MatchRule::new("VR", "Virtual Reality (VR)")];
        assert_eq!(
            rewrite("VR and vr and Vr", rules),
            "[[Virtual Reality (VR)|VR]] and [[Virtual Reality (VR)|vr]] and [[Virtual Reality (VR)|Vr]]"
        );
    }

    #[test]
    fn test_target_equality_fold() {
        let rules = vec![MatchRule::new("robotics", "robotics")];
        assert_eq!(rewrite("Robotics rocks", rules), "[[robotics]] rocks");
    }

    #[test]
    fn test_case_sensitive_rule() {
        let rules = vec![MatchRule::new("Rose", "Rose Smith").case_sensitive()];
        assert_eq!(rewrite("a rose and Rose", rules), "a rose and [[Rose Smith|Rose]]");
    }

    // -------------------------------------------------------------------------
    // Requirement 6: Link-opacity guard
    // -------------------------------------------------------------------------
    #[test]
    fn test_adjacent_markup_guards() {
        let rules = vec![MatchRule::new("CLT", "Cognitive Load Theory (CLT)")];
        // Immediately followed by a pipe: table cell glued to text
        assert_eq!(rewrite("CLT|x", rules.clone()), "CLT|x");
        // Inside an existing link body
        assert_eq!(rewrite("[[CLT]]", rules.clone()), "[[CLT]]");
        assert_eq!(rewrite("[[Other|CLT]]", rules), "[[Other|CLT]]");
    }

    #[test]
    fn test_citation_guard_only_for_names() {
        let name = vec![MatchRule::name("Smith", "Jane Q. Smith")];
        assert_eq!(rewrite("see @Smith2020 and @Smith", name), "see @Smith2020 and @Smith");

        let keyword = vec![MatchRule::new("rust", "Rust")];
        assert_eq!(rewrite("@rust", keyword), "@[[Rust]]");
    }

    #[test]
    fn test_no_nesting_in_fresh_links() {
        // "Theory" is shorter and would sit inside the fresh link
        let rules = vec![
            MatchRule::new("Cognitive Load Theory", "Cognitive Load Theory (CLT)"),
            MatchRule::new("Theory", "Theory"),
            MatchRule::new("CLT", "Cognitive Load Theory (CLT)"),
        ];
        let out = rewrite("Cognitive Load Theory is not a Theory of CLT", rules);
        assert_eq!(
            out,
            "[[Cognitive Load Theory (CLT)|Cognitive Load Theory]] is not a [[Theory]] of [[Cognitive Load Theory (CLT)|CLT]]"
        );
    }

    // -------------------------------------------------------------------------
    // Requirement 7: Idempotence
    // -------------------------------------------------------------------------
    #[test]
    fn test_idempotent() {
        let plan = scenario_plan();
        let rewriter = Rewriter::new();
        let text = "CLT at MIT, Massachusetts Institute of Technology and robotics; cognitive load theory.";
        let once = rewriter.rewrite(text, &plan);
        let twice = rewriter.rewrite(&once.text, &plan);
        assert!(once.changed);
        assert_eq!(twice.text, once.text);
        assert!(!twice.changed);
    }

    #[test]
    fn test_idempotent_with_adjacent_claims() {
        let rules = vec![
            MatchRule::new("Theory.", "Theory"),
            MatchRule::new("AB", "AB"),
        ];
        let once = rewrite("Theory.AB", rules.clone());
        let twice = rewrite(&once, rules);
        assert_eq!(once, twice);
    }

    // -------------------------------------------------------------------------
    // Requirement 8: Stats + unchanged verdict
    // -------------------------------------------------------------------------
    #[test]
    fn test_unchanged_document() {
        let outcome = Rewriter::new().rewrite("Nothing to see.", &scenario_plan());
        assert!(!outcome.changed);
        assert_eq!(outcome.stats.links_added, 0);
        assert_eq!(outcome.stats.rules_considered, 0);
        assert!(outcome.stats.rules_in_plan > 0);
    }

    #[test]
    fn test_unicode_offsets() {
        let rules = vec![MatchRule::new("Café", "Café (place)")];
        assert_eq!(
            rewrite("Ünïcode café ünd CAFÉ", rules),
            "Ünïcode [[Café (place)|café]] ünd [[Café (place)|CAFÉ]]"
        );
    }

    #[test]
    fn test_reserved_span_blocks_shorter_rules() {
        let rewriter = Rewriter::new();
        let text = "New York is big";
        let long = CompiledRule::compile(MatchRule::new("New York", "x")).unwrap();
        let short = CompiledRule::compile(MatchRule::new("York", "York")).unwrap();

        let mut session = rewriter.session(text);
        for range in session.occurrences(&long) {
            session.reserve(range);
        }
        assert!(session.occurrences(&short).is_empty());
        assert!(!session.finish().changed);
    }

    #[test]
    fn test_reserve_only_rule_holds_span_unlinked() {
        let rules = vec![MatchRule::new("York", "York"), MatchRule::reserve("New York")];
        let plan = RulePlan::longest_first(rules).unwrap();
        let rewriter = Rewriter::new();

        let outcome = rewriter.rewrite("I moved to New York last year.", &plan);
        assert_eq!(outcome.text, "I moved to New York last year.");
        assert!(!outcome.changed);
        assert_eq!(outcome.stats.rules_fired, 0);

        let outcome = rewriter.rewrite("New York, not York.", &plan);
        assert_eq!(outcome.text, "New York, not [[York]].");
        assert_eq!(rewriter.rewrite(&outcome.text, &plan).text, outcome.text);
    }

    #[test]
    fn test_folded_spelling_reaches_the_matcher() {
        let rules = vec![MatchRule::new("sun", "Sun")];
        assert_eq!(rewrite("the \u{017F}un rises", rules), "the [[Sun|\u{017F}un]] rises");
    }
}
