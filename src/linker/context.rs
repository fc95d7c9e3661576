// aliaslink/src/linker/context.rs
//
// Bounded context windows around one alias occurrence

use std::ops::Range;

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::linker::syntax::is_word_char;

/// Marks the occurrence inside a rendered window
pub const FOCUS_OPEN: char = '\u{27E6}';
pub const FOCUS_CLOSE: char = '\u{27E7}';

/// Text around one occurrence, cut at word bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextWindow {
    pub before: String,
    pub found: String,
    pub after: String,
}

impl ContextWindow {
    /// `before⟦found⟧after`, the form handed to a disambiguator
    pub fn render(&self) -> String {
        format!(
            "{}{}{}{}{}",
            self.before, FOCUS_OPEN, self.found, FOCUS_CLOSE, self.after
        )
    }
}

/// Collapse whitespace runs (newlines included) to single spaces
fn squash(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_space = false;
    for c in value.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn splits_word(text: &str, pos: usize) -> bool {
    let left = text[..pos].chars().next_back().map_or(false, is_word_char);
    let right = text[pos..].chars().next().map_or(false, is_word_char);
    left && right
}

/// Window of roughly `budget` characters around `range`, split evenly on
/// both sides. A side cut that would split a word moves inward to the
/// nearest word bound, so no partial words leak into the window.
pub fn context_window(text: &str, range: Range<usize>, budget: usize) -> ContextWindow {
    let half = budget / 2;

    // Left cut: `half` chars back from the occurrence
    let mut left = text[..range.start]
        .char_indices()
        .rev()
        .nth(half.saturating_sub(1))
        .map_or(0, |(idx, _)| idx);
    if half == 0 {
        left = range.start;
    }
    if left > 0 && splits_word(text, left) {
        left = text[left..range.start]
            .split_word_bound_indices()
            .nth(1)
            .map_or(range.start, |(idx, _)| left + idx);
    }

    // Right cut: `half` chars on from the occurrence
    let mut right = text[range.end..]
        .char_indices()
        .nth(half)
        .map_or(text.len(), |(idx, _)| range.end + idx);
    if right < text.len() && splits_word(text, right) {
        right = text[range.end..right]
            .split_word_bound_indices()
            .next_back()
            .map_or(range.end, |(idx, _)| range.end + idx);
    }

    ContextWindow {
        before: squash(&text[left..range.start]).trim_start().to_string(),
        found: text[range.clone()].to_string(),
        after: squash(&text[range.end..right]).trim_end().to_string(),
    }
}
