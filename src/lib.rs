//! AliasLink: Vocabulary Alias Expansion + Wikilink Rewriting
//!
//! Turns a flat vocabulary of canonical terms (concepts or people) into an
//! alias table, then rewrites a corpus of Markdown notes so every mention of
//! an alias becomes a `[[Target]]` or `[[Target|Found]]` link.
//!
//! # Architecture
//!
//! ## Linker Components
//! - `variants.rs` - VariantCortex: connector + parenthetical surface variants
//! - `vocabulary.rs` - Flat term files and front-matter terminology notes
//! - `index.rs` - AliasIndex: variant → targets, split into table + registry
//! - `syntax.rs` - LinkSyntax: Link Markup detection and rendering
//! - `planner.rs` - RulePlan: ordered rules with an Aho-Corasick prefilter
//! - `rewriter.rs` - RewriteCortex: claimed-span rule interpreter
//! - `authors.rs` - AuthorCortex: names → tiered full-name/surname rules
//! - `context.rs` - Context windows around one occurrence
//! - `gateway.rs` - GatewayCortex: `Disambiguator` contract + contextual linking
//! - `conductor.rs` - LinkConductor: stages over a corpus, run reports
//!
//! ## Shell
//! - `config.rs` - `LinkerConfig` (YAML)
//! - `corpus.rs` - Directory walk, read, write-if-changed
//! - `llm.rs` - OpenAI-compatible `Disambiguator` (feature `cli`)
//! - `wasm.rs` - `LinkCortex` for the browser
//!
//! # Usage (Rust)
//! ```rust,ignore
//! use aliaslink::{AliasIndex, RulePlan, Rewriter, parse_vocabulary};
//!
//! let index = AliasIndex::build(parse_vocabulary("Cognitive Load Theory (CLT)"));
//! let (table, ambiguous) = index.partition();
//! let plan = RulePlan::longest_first(table.to_rules())?;
//! let outcome = Rewriter::new().rewrite("We discussed CLT today.", &plan);
//! assert_eq!(outcome.text, "We discussed [[Cognitive Load Theory (CLT)|CLT]] today.");
//! ```

pub mod config;
pub mod corpus;
pub mod error;
pub mod linker;
pub mod wasm;

#[cfg(feature = "cli")]
pub mod llm;

// Public exports - Linker
pub use linker::*;

pub use config::{LinkerConfig, LlmConfig};
pub use corpus::{Corpus, StageError};
pub use error::{LinkError, Result};
pub use wasm::{LinkCortex, LinkResult};

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("aliaslink v{}", env!("CARGO_PKG_VERSION"))
}
