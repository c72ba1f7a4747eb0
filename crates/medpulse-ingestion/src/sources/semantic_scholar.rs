//! Semantic Scholar Graph API client.
//!
//! Uses the bulk search endpoint because it honours `sort=citationCount:desc`;
//! the relevance search endpoint ignores sorting.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use medpulse_common::sandbox::SandboxClient as Client;
use medpulse_common::{Candidate, CitationCount, SourceKind};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{has_min_abstract, squash_whitespace, year_or_current, CandidateSource};

pub const DEFAULT_BASE_URL: &str = "https://api.semanticscholar.org";
pub const DEFAULT_QUERY: &str = "medicine | biology | health | longevity | neuroscience";
const FIELDS: &str = "paperId,title,abstract,year,citationCount,externalIds,url,journal";

#[derive(Debug, Clone)]
pub struct SemanticScholarConfig {
    pub base_url: String,
    pub query: String,
    pub limit: usize,
    /// Only papers published within this many days are returned.
    pub window_days: i64,
    pub api_key: Option<String>,
    pub min_abstract_chars: usize,
}

impl Default for SemanticScholarConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            query: DEFAULT_QUERY.to_string(),
            limit: 20,
            window_days: 365,
            api_key: None,
            min_abstract_chars: 200,
        }
    }
}

pub struct SemanticScholarClient {
    client: Client,
    config: SemanticScholarConfig,
}

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: String,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    year: Option<i32>,
    citation_count: Option<u64>,
    external_ids: Option<S2ExternalIds>,
    url: Option<String>,
    journal: Option<S2Journal>,
}

#[derive(Debug, Deserialize)]
struct S2ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "PubMed")]
    pubmed: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2Journal {
    name: Option<String>,
}

impl SemanticScholarClient {
    pub fn new(config: SemanticScholarConfig) -> anyhow::Result<Self> {
        let mut client = Client::new()?;
        client.allow_url_host(&config.base_url)?;
        Ok(Self { client, config })
    }

    /// Lower bound for `publicationDateOrYear`, open-ended (`YYYY-MM-DD:`).
    fn date_filter(&self) -> String {
        let since = Utc::now() - Duration::days(self.config.window_days);
        format!("{}:", since.format("%Y-%m-%d"))
    }

    #[instrument(skip(self))]
    async fn bulk_search(&self) -> anyhow::Result<Vec<serde_json::Value>> {
        let url = format!(
            "{}/graph/v1/paper/search/bulk",
            self.config.base_url.trim_end_matches('/')
        );
        let params = [
            ("query", self.config.query.clone()),
            ("fields", FIELDS.to_string()),
            ("sort", "citationCount:desc".to_string()),
            ("publicationDateOrYear", self.date_filter()),
        ];

        let mut req = self.client.get(&url)?.query(&params);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            req = req.header("x-api-key", key);
        }

        let resp: BulkResponse = req.send().await?.error_for_status()?.json().await?;
        debug!(n = resp.data.len(), "Semantic Scholar bulk search returned records");
        Ok(resp.data)
    }
}

#[async_trait]
impl CandidateSource for SemanticScholarClient {
    fn kind(&self) -> SourceKind {
        SourceKind::CitationIndex
    }

    async fn search(&self) -> anyhow::Result<Vec<Candidate>> {
        let records = self.bulk_search().await?;
        let min = self.config.min_abstract_chars;
        Ok(records
            .into_iter()
            .take(self.config.limit)
            .filter_map(parse_paper)
            .filter(|c| has_min_abstract(&c.abstract_text, min))
            .collect())
    }
}

/// One record to a candidate. Records that do not deserialize, or lack a
/// title or abstract, are dropped without affecting their siblings.
fn parse_paper(value: serde_json::Value) -> Option<Candidate> {
    let paper: S2Paper = match serde_json::from_value(value) {
        Ok(p) => p,
        Err(e) => {
            debug!(error = %e, "Skipping malformed Semantic Scholar record");
            return None;
        }
    };

    let title = squash_whitespace(paper.title.as_deref().unwrap_or_default());
    let abstract_text = paper.abstract_text.as_deref().map(str::trim).unwrap_or_default().to_string();
    if title.is_empty() || abstract_text.is_empty() {
        debug!(paper_id = %paper.paper_id, "Skipping record without title or abstract");
        return None;
    }

    let (doi, pmid) = match paper.external_ids {
        Some(ids) => (
            ids.doi.filter(|d| !d.trim().is_empty()),
            ids.pubmed.filter(|p| !p.trim().is_empty()),
        ),
        None => (None, None),
    };
    let url = match (paper.url.filter(|u| !u.is_empty()), &doi) {
        (Some(url), _) => url,
        (None, Some(doi)) => format!("https://doi.org/{doi}"),
        (None, None) => format!("https://www.semanticscholar.org/paper/{}", paper.paper_id),
    };

    Some(Candidate {
        source: SourceKind::CitationIndex,
        external_id: paper.paper_id,
        pmid,
        doi,
        title,
        abstract_text,
        citation_count: CitationCount::from(paper.citation_count),
        year: year_or_current(paper.year.map(|y| y.to_string()).as_deref()),
        journal: paper.journal.and_then(|j| j.name).filter(|n| !n.trim().is_empty()),
        url,
    })
}
