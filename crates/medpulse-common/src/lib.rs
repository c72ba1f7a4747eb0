//! medpulse-common: Shared types and errors used across all MedPulse crates.

pub mod entities;
pub mod error;
pub mod keys;
pub mod sandbox;

pub use entities::{
    ArticleContent, Candidate, Category, CitationCount, ExternalRefs, Provenance, PublishedItem,
    SourceKind,
};
pub use keys::CanonicalKey;
