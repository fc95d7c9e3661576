//! LinkSyntax - Link Markup detection and rendering
//!
//! The two forms this crate emits, and the only ones it treats as opaque:
//! - Direct: `[[Target]]`
//! - Piped:  `[[Target|FoundText]]`
//!
//! Consumers parse this syntax verbatim, so rendering lives in one place.

use regex::Regex;
use serde::{Deserialize, Serialize};

// ==================== CONSTANTS ====================

pub const LINK_OPEN: &str = "[[";
pub const LINK_CLOSE: &str = "]]";
pub const LINK_PIPE: char = '|';
pub const CITATION_MARKER: char = '@';

// ==================== TYPE DEFINITIONS ====================

/// An existing Link Markup span in a document
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LinkSpan {
    pub start: usize,
    pub end: usize,
    pub target: String,
    pub label: Option<String>,
}

// ==================== MAIN IMPLEMENTATION ====================

/// Link Markup detector
pub struct LinkSyntax {
    link_re: Regex,
}

impl Default for LinkSyntax {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkSyntax {
    pub fn new() -> Self {
        // [[Target]] or [[Target|Label]], single line, shortest span.
        // Group 1: body (target plus optional |label)
        let link_re = Regex::new(r"\[\[([^\n]*?)\]\]").expect("link regex is valid");
        Self { link_re }
    }

    /// Every Link Markup span, in document order
    pub fn find_links(&self, text: &str) -> Vec<LinkSpan> {
        self.link_re
            .captures_iter(text)
            .filter_map(|cap| {
                let full = cap.get(0)?;
                let body = cap.get(1)?.as_str();
                let (target, label) = match body.split_once(LINK_PIPE) {
                    Some((t, l)) => (t.to_string(), Some(l.to_string())),
                    None => (body.to_string(), None),
                };
                Some(LinkSpan {
                    start: full.start(),
                    end: full.end(),
                    target,
                    label,
                })
            })
            .collect()
    }

    /// Byte ranges covered by Link Markup
    pub fn opaque_ranges(&self, text: &str) -> Vec<(usize, usize)> {
        self.link_re
            .find_iter(text)
            .map(|m| (m.start(), m.end()))
            .collect()
    }
}

/// Can `target` be written inside Link Markup without breaking it
pub fn is_linkable_target(target: &str) -> bool {
    !target.trim().is_empty()
        && !target.contains(LINK_OPEN)
        && !target.contains(LINK_CLOSE)
        && !target.contains(LINK_PIPE)
        && !target.contains('\n')
}

/// Render a link for `found` text resolving to `target`.
///
/// Found text equal to the target (ignoring case) gives the direct form;
/// anything else keeps the reader's casing behind a pipe.
pub fn render_link(target: &str, found: &str) -> String {
    if found.to_lowercase() == target.to_lowercase() {
        format!("{LINK_OPEN}{target}{LINK_CLOSE}")
    } else {
        format!("{LINK_OPEN}{target}{LINK_PIPE}{found}{LINK_CLOSE}")
    }
}

/// Word characters for boundary checks (Unicode alphanumeric or `_`)
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

// ==================== TESTS ====================
