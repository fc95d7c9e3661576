pub mod variants;
pub mod vocabulary;
pub mod index;
pub mod syntax;
pub mod planner;
pub mod rewriter;
pub mod authors;
pub mod context;
pub mod gateway;
pub mod conductor;

pub use variants::*;
pub use vocabulary::*;
pub use index::*;
pub use syntax::*;
pub use planner::*;
pub use rewriter::*;
pub use authors::*;
pub use context::*;
pub use gateway::*;
pub use conductor::*;
