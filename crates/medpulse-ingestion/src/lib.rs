//! medpulse-ingestion: Fetch, merge and publish pipeline.
//!
//! - Candidate discovery (PubMed, Semantic Scholar)
//! - Cross-source and cross-run deduplication
//! - Orchestration of curation, authoring and persistence
//! - Manual single-PMID publishing

pub mod dedup;
pub mod manual;
pub mod pipeline;
pub mod sources;

pub use dedup::merge;
pub use manual::{publish_pmid, PublishOutcome};
pub use pipeline::{
    DedupedCandidates, Pipeline, PipelineProgress, RunPhase, RunReport, SourceBatch,
};
pub use sources::{CandidateSource, pubmed::PubMedClient, semantic_scholar::SemanticScholarClient};
