//! LinkCortex: In-Browser Linking Facade
//!
//! Wraps the alias index and the rewriter behind wasm-bindgen so the note
//! editor can link a note as it is saved, without a filesystem.
//!
//! ```javascript,ignore
//! const cortex = new LinkCortex();
//! cortex.hydrateVocabulary("Cognitive Load Theory (CLT)\nrobotics");
//! cortex.build();
//! const { text, changed, links } = cortex.link("We discussed CLT today.");
//! const ambiguous = cortex.ambiguous();
//! ```

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::error::Result;
use crate::linker::index::{reserve_rules, AliasIndex, AmbiguousEntry};
use crate::linker::planner::RulePlan;
use crate::linker::rewriter::{LinkEdit, RewriteStats, Rewriter};
use crate::linker::vocabulary::{parse_vocabulary, VocabularyEntry};

/// Result of linking one text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkResult {
    pub text: String,
    pub changed: bool,
    pub links: Vec<LinkEdit>,
    pub stats: RewriteStats,
}

#[wasm_bindgen]
pub struct LinkCortex {
    index: AliasIndex,
    plan: Option<RulePlan>,
    ambiguous: Vec<AmbiguousEntry>,
    rewriter: Rewriter,
    needs_rebuild: bool,
}

impl Default for LinkCortex {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl LinkCortex {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            index: AliasIndex::new(),
            plan: None,
            ambiguous: Vec::new(),
            rewriter: Rewriter::new(),
            needs_rebuild: true,
        }
    }

    /// Number of distinct aliases registered
    #[wasm_bindgen(js_name = aliasCount)]
    pub fn alias_count(&self) -> usize {
        self.index.len()
    }

    /// Number of rules in the built plan
    #[wasm_bindgen(js_name = ruleCount)]
    pub fn rule_count(&self) -> usize {
        self.plan.as_ref().map_or(0, RulePlan::len)
    }

    /// Add flat vocabulary lines (one term per line)
    #[wasm_bindgen(js_name = hydrateVocabulary)]
    pub fn js_hydrate_vocabulary(&mut self, text: &str) {
        self.hydrate(parse_vocabulary(text));
    }

    /// Add entries shaped `{ term, source, aliases?, clusters? }`
    #[wasm_bindgen(js_name = hydrateEntries)]
    pub fn js_hydrate_entries(&mut self, entries: JsValue) -> std::result::Result<(), JsValue> {
        let entries: Vec<VocabularyEntry> = serde_wasm_bindgen::from_value(entries)
            .map_err(|e| JsValue::from_str(&format!("Failed to parse entries: {}", e)))?;
        self.hydrate(entries);
        Ok(())
    }

    #[wasm_bindgen(js_name = build)]
    pub fn js_build(&mut self) -> std::result::Result<(), JsValue> {
        self.build()
            .map_err(|e| JsValue::from_str(&format!("LinkCortex Build Error: {}", e)))
    }

    /// Link one text: `{ text, changed, links, stats }`
    #[wasm_bindgen(js_name = link)]
    pub fn js_link(&mut self, text: &str) -> std::result::Result<JsValue, JsValue> {
        let result = self
            .link(text)
            .map_err(|e| JsValue::from_str(&format!("LinkCortex Error: {}", e)))?;
        serde_wasm_bindgen::to_value(&result)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Ambiguous registry as `[{ alias, candidates, source_terms, clusters? }]`
    #[wasm_bindgen(js_name = ambiguous)]
    pub fn js_ambiguous(&mut self) -> JsValue {
        if self.needs_rebuild && self.build().is_err() {
            return JsValue::NULL;
        }
        serde_wasm_bindgen::to_value(&self.ambiguous).unwrap_or(JsValue::NULL)
    }

    #[wasm_bindgen(js_name = reset)]
    pub fn js_reset(&mut self) {
        *self = Self::new();
    }
}

impl LinkCortex {
    pub fn hydrate<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = VocabularyEntry>,
    {
        for entry in entries {
            self.index.register(&entry);
        }
        self.needs_rebuild = true;
    }

    /// Partition the index and compile the unambiguous rules, holding
    /// ambiguous aliases back as reserve-only rules
    pub fn build(&mut self) -> Result<()> {
        let (table, ambiguous) = self.index.partition();
        let mut rules = table.to_rules();
        rules.extend(reserve_rules(&ambiguous));
        self.plan = Some(RulePlan::longest_first(rules)?);
        self.ambiguous = ambiguous;
        self.needs_rebuild = false;
        Ok(())
    }

    /// Link `text` with the unambiguous rules, rebuilding first if needed
    pub fn link(&mut self, text: &str) -> Result<LinkResult> {
        if self.needs_rebuild {
            self.build()?;
        }
        let outcome = match &self.plan {
            Some(plan) => self.rewriter.rewrite(text, plan),
            None => return Ok(LinkResult {
                text: text.to_string(),
                changed: false,
                links: Vec::new(),
                stats: RewriteStats::default(),
            }),
        };
        Ok(LinkResult {
            text: outcome.text,
            changed: outcome.changed,
            links: outcome.links,
            stats: outcome.stats,
        })
    }

    pub fn ambiguous(&self) -> &[AmbiguousEntry] {
        &self.ambiguous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_builds_lazily() {
        let mut cortex = LinkCortex::new();
        cortex.js_hydrate_vocabulary("Cognitive Load Theory (CLT)\nMassachusetts Institute of Technology (MIT)\nMIT");
        let result = cortex.link("We discussed CLT at MIT.").unwrap();
        assert_eq!(result.text, "We discussed [[Cognitive Load Theory (CLT)|CLT]] at MIT.");
        assert!(result.changed);
        assert_eq!(result.links.len(), 1);
        assert_eq!(cortex.ambiguous().len(), 1);
        assert_eq!(cortex.ambiguous()[0].alias, "MIT");
    }

    #[test]
    fn test_hydrating_again_rebuilds() {
        let mut cortex = LinkCortex::new();
        cortex.js_hydrate_vocabulary("robotics");
        cortex.build().unwrap();
        assert_eq!(cortex.rule_count(), 1);

        cortex.js_hydrate_vocabulary("off-site");
        let result = cortex.link("robotics off site").unwrap();
        assert_eq!(result.text, "[[robotics]] [[off-site|off site]]");
        assert_eq!(cortex.rule_count(), 4);
    }

    #[test]
    fn test_ambiguous_alias_is_held_back() {
        let mut cortex = LinkCortex::new();
        cortex.js_hydrate_vocabulary("New York (city)\nNew York (state)\nYork");
        let result = cortex.link("From New York to York.").unwrap();
        assert_eq!(result.text, "From New York to [[York]].");
        assert_eq!(cortex.ambiguous()[0].alias, "New York");
    }

    #[test]
    fn test_empty_cortex_is_identity() {
        let mut cortex = LinkCortex::new();
        let result = cortex.link("plain text").unwrap();
        assert_eq!(result.text, "plain text");
        assert!(!result.changed);
        assert_eq!(cortex.alias_count(), 0);
    }
}
