//! medpulse-editorial: The two collaborator-backed stages.
//!
//! - `curator`: picks the K most engaging candidates (first-K fallback)
//! - `author`: drafts one bilingual article per selected candidate
//! - `prompts`: the instruction text both stages send

pub mod author;
pub mod curator;
pub mod prompts;

pub use author::{ArticleDraft, Author, AuthorConfig};
pub use curator::{Curator, CuratorConfig, Selection};
