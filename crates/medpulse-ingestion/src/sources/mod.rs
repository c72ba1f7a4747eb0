//! Candidate source clients.

pub mod pubmed;
pub mod semantic_scholar;

use async_trait::async_trait;
use chrono::Utc;
use medpulse_common::{Candidate, SourceKind};
use tracing::{info, warn};

/// Common interface for the upstream paper services.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// One search round-trip. Fails wholesale when the service does.
    async fn search(&self) -> anyhow::Result<Vec<Candidate>>;

    /// `search` with a wholesale failure degraded to an empty list.
    async fn fetch_candidates(&self) -> Vec<Candidate> {
        let source = self.kind().as_str();
        match self.search().await {
            Ok(found) => {
                info!(source, n = found.len(), "Candidates retrieved");
                found
            }
            Err(e) => {
                warn!(source, error = %e, "Source unavailable, continuing without it");
                Vec::new()
            }
        }
    }
}

/// Short abstracts make poor articles; both adapters drop them.
pub(crate) fn has_min_abstract(abstract_text: &str, min_chars: usize) -> bool {
    abstract_text.chars().count() >= min_chars
}

/// A four-digit publication year, or the current year when the record's
/// value is missing or not a plain year.
pub(crate) fn year_or_current(year: Option<&str>) -> String {
    year.map(str::trim)
        .filter(|y| y.len() == 4 && y.bytes().all(|b| b.is_ascii_digit()))
        .map(String::from)
        .unwrap_or_else(|| Utc::now().format("%Y").to_string())
}

/// Collapse runs of whitespace left behind by inline markup and line breaks.
pub(crate) fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
