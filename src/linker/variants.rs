//! VariantCortex: Surface Variants of a Vocabulary Term
//!
//! Expands one canonical term into every spelling that should resolve to it.
//! "Off-site" → "Off-site", "Off site", "Off/site".
//! "Cognitive Load Theory (CLT)" → the full line, "Cognitive Load Theory", "CLT".
//!
//! Case is preserved here; case-insensitivity is the matcher's job.

use std::collections::BTreeSet;

use regex::Regex;

// =============================================================================
// Connector table
// =============================================================================

/// Each connector and the characters it may be written as
const CONNECTOR_VARIANTS: &[(char, &[char])] = &[
    ('-', &['-', ' ', '/']),
    ('\u{2013}', &['\u{2013}', '-', ' ', '/']), // en dash
    ('\u{2014}', &['\u{2014}', '-', ' ', '/']), // em dash
    ('/', &['/', '-', ' ']),
];

/// Upper bound on Cartesian-product forms per base string
const MAX_PRODUCT_FORMS: usize = 1024;

fn connector_options(c: char) -> Option<&'static [char]> {
    CONNECTOR_VARIANTS
        .iter()
        .find(|(connector, _)| *connector == c)
        .map(|(_, options)| *options)
}

/// Is `c` one of the recognised connector characters
pub fn is_connector(c: char) -> bool {
    connector_options(c).is_some()
}

// =============================================================================
// Normalization
// =============================================================================

/// Collapse internal whitespace runs to one space and trim the ends
pub fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits `"<head> (<parenthetical>)"` where the parenthetical is the single
/// trailing group. Nested groups do not decompose.
pub struct ParentheticalSplitter {
    re: Regex,
}

impl Default for ParentheticalSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl ParentheticalSplitter {
    pub fn new() -> Self {
        // Group 1: head (lazy, so the LAST " (" opens the group)
        // Group 2: parenthetical, no nested parens
        let re = Regex::new(r"^(.+?) \(([^()]*)\)$").expect("parenthetical regex is valid");
        Self { re }
    }

    /// Returns `(head, parenthetical)`, both trimmed and non-empty
    pub fn split(&self, term: &str) -> Option<(String, String)> {
        let caps = self.re.captures(term)?;
        let head = normalize_whitespace(caps.get(1)?.as_str());
        let inner = normalize_whitespace(caps.get(2)?.as_str());
        if head.is_empty() || inner.is_empty() {
            return None;
        }
        Some((head, inner))
    }
}

// =============================================================================
// Variant generation
// =============================================================================

/// Connector variants of one base form.
///
/// Every connector occurrence is substituted independently (full Cartesian
/// product), plus one form with all connectors replaced by spaces.
pub fn connector_variants(base: &str) -> BTreeSet<String> {
    let mut variants = BTreeSet::new();
    let normalized = normalize_whitespace(base);
    if normalized.is_empty() {
        return variants;
    }
    variants.insert(normalized.clone());

    let chars: Vec<char> = normalized.chars().collect();
    let positions: Vec<(usize, &'static [char])> = chars
        .iter()
        .enumerate()
        .filter_map(|(idx, c)| connector_options(*c).map(|opts| (idx, opts)))
        .collect();

    if positions.is_empty() {
        return variants;
    }

    let product_size = positions
        .iter()
        .try_fold(1usize, |acc, (_, opts)| acc.checked_mul(opts.len()));

    match product_size {
        Some(size) if size <= MAX_PRODUCT_FORMS => {
            // Odometer over the option index of every connector position
            let mut counters = vec![0usize; positions.len()];
            loop {
                let mut trial = chars.clone();
                for ((idx, opts), counter) in positions.iter().zip(&counters) {
                    trial[*idx] = opts[*counter];
                }
                push_variant(&mut variants, trial.into_iter().collect());

                let mut wheel = 0;
                loop {
                    if wheel == counters.len() {
                        break;
                    }
                    counters[wheel] += 1;
                    if counters[wheel] < positions[wheel].1.len() {
                        break;
                    }
                    counters[wheel] = 0;
                    wheel += 1;
                }
                if wheel == counters.len() {
                    break;
                }
            }
        }
        _ => {
            tracing::debug!(
                base = %normalized,
                connectors = positions.len(),
                "connector product too large, emitting uniform substitutions only"
            );
            let replacements: BTreeSet<char> =
                positions.iter().flat_map(|(_, opts)| opts.iter().copied()).collect();
            for replacement in replacements {
                let trial: String = chars
                    .iter()
                    .map(|c| if is_connector(*c) { replacement } else { *c })
                    .collect();
                push_variant(&mut variants, trial);
            }
        }
    }

    // Connectors removed entirely
    let stripped: String = chars
        .iter()
        .map(|c| if is_connector(*c) { ' ' } else { *c })
        .collect();
    push_variant(&mut variants, stripped);

    variants
}

fn push_variant(variants: &mut BTreeSet<String>, raw: String) {
    let collapsed = normalize_whitespace(&raw);
    if !collapsed.is_empty() {
        variants.insert(collapsed);
    }
}

/// Base forms of a term: the term itself plus its decomposed head and
/// parenthetical when it ends in a single `" (alias)"` group
pub fn base_forms(term: &str, splitter: &ParentheticalSplitter) -> Vec<String> {
    let normalized = normalize_whitespace(term);
    if normalized.is_empty() {
        return Vec::new();
    }
    let mut forms = vec![normalized.clone()];
    if let Some((head, inner)) = splitter.split(&normalized) {
        forms.push(head);
        forms.push(inner);
    }
    forms
}

/// All variants of a raw term. Never empty for a non-blank term.
pub fn generate_variants(term: &str, splitter: &ParentheticalSplitter) -> BTreeSet<String> {
    base_forms(term, splitter)
        .iter()
        .flat_map(|form| connector_variants(form))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
