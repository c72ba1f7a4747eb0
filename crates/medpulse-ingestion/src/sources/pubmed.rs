//! PubMed E-utilities client.
//!
//! Endpoints used:
//!   esearch: {base}/entrez/eutils/esearch.fcgi (JSON id list)
//!   efetch:  {base}/entrez/eutils/efetch.fcgi  (PubmedArticleSet XML)

use async_trait::async_trait;
use medpulse_common::sandbox::SandboxClient as Client;
use medpulse_common::{Candidate, CitationCount, SourceKind};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, instrument, warn};

use super::{has_min_abstract, squash_whitespace, year_or_current, CandidateSource};

pub const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov";
pub const DEFAULT_TERM: &str = "\"last 5 days\"[dp] AND hasabstract[text]";
/// Abstract text for manually published records that have none.
pub const NO_ABSTRACT: &str = "No abstract available.";

#[derive(Debug, Clone)]
pub struct PubMedConfig {
    pub base_url: String,
    pub term: String,
    pub retmax: usize,
    /// Optional NCBI API key for higher rate limits.
    pub api_key: Option<String>,
    pub min_abstract_chars: usize,
}

impl Default for PubMedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            term: DEFAULT_TERM.to_string(),
            retmax: 20,
            api_key: None,
            min_abstract_chars: 200,
        }
    }
}

pub struct PubMedClient {
    client: Client,
    config: PubMedConfig,
}

impl PubMedClient {
    pub fn new(config: PubMedConfig) -> anyhow::Result<Self> {
        let mut client = Client::new()?;
        client.allow_url_host(&config.base_url)?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/entrez/eutils/{name}", self.config.base_url.trim_end_matches('/'))
    }

    fn with_api_key(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            params.push(("api_key", key.to_string()));
        }
        params
    }

    /// Newest matching PMIDs, most recent first.
    #[instrument(skip(self))]
    async fn esearch(&self) -> anyhow::Result<Vec<String>> {
        let params = self.with_api_key(vec![
            ("db", "pubmed".to_string()),
            ("term", self.config.term.clone()),
            ("retmax", self.config.retmax.to_string()),
            ("sort", "date".to_string()),
            ("retmode", "json".to_string()),
        ]);

        let resp: serde_json::Value = self.client
            .get(&self.endpoint("esearch.fcgi"))?
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let ids: Vec<String> = resp["esearchresult"]["idlist"]
            .as_array()
            .map(|list| list.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();

        debug!(?ids, "PubMed esearch returned PMIDs");
        Ok(ids)
    }

    /// Full records for the given PMIDs, abstract or not. No request is
    /// made for an empty list.
    #[instrument(skip(self), fields(n = pmids.len()))]
    async fn efetch(&self, pmids: &[String]) -> anyhow::Result<Vec<Candidate>> {
        if pmids.is_empty() {
            return Ok(vec![]);
        }

        let params = self.with_api_key(vec![
            ("db", "pubmed".to_string()),
            ("id", pmids.join(",")),
            ("retmode", "xml".to_string()),
        ]);

        let xml = self.client
            .get(&self.endpoint("efetch.fcgi"))?
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(parse_records(&xml))
    }

    /// A single record by PMID, without the abstract-length filter. A
    /// record with no abstract carries [`NO_ABSTRACT`] instead.
    #[instrument(skip(self))]
    pub async fn fetch_by_pmid(&self, pmid: &str) -> anyhow::Result<Option<Candidate>> {
        let pmid = pmid.trim();
        let records = self.efetch(&[pmid.to_string()]).await?;
        Ok(records
            .into_iter()
            .find(|c| c.pmid.as_deref() == Some(pmid))
            .map(|mut c| {
                if c.abstract_text.is_empty() {
                    c.abstract_text = NO_ABSTRACT.to_string();
                }
                c
            }))
    }
}

#[async_trait]
impl CandidateSource for PubMedClient {
    fn kind(&self) -> SourceKind {
        SourceKind::LiteratureIndex
    }

    async fn search(&self) -> anyhow::Result<Vec<Candidate>> {
        let pmids = self.esearch().await?;
        let records = self.efetch(&pmids).await?;
        let min = self.config.min_abstract_chars;
        Ok(records
            .into_iter()
            .filter(|c| {
                let keep = !c.abstract_text.is_empty() && has_min_abstract(&c.abstract_text, min);
                if !keep {
                    debug!(pmid = ?c.pmid, "Abstract too short, skipping");
                }
                keep
            })
            .collect())
    }
}

// ── XML parsing ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Pmid,
    Title,
    Abstract,
    Journal,
    Year,
    MedlineDate,
    Doi,
}

#[derive(Default)]
struct RecordBuilder {
    pmid: String,
    title: String,
    abstract_parts: Vec<String>,
    abstract_segment: String,
    journal: String,
    year: String,
    medline_date: String,
    doi: String,
}

impl RecordBuilder {
    fn push_text(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::Pmid        => &mut self.pmid,
            Field::Title       => &mut self.title,
            Field::Abstract    => &mut self.abstract_segment,
            Field::Journal     => &mut self.journal,
            Field::Year        => &mut self.year,
            Field::MedlineDate => &mut self.medline_date,
            Field::Doi         => &mut self.doi,
        };
        target.push_str(text);
    }

    fn end_abstract_segment(&mut self) {
        let segment = squash_whitespace(&self.abstract_segment);
        if !segment.is_empty() {
            self.abstract_parts.push(segment);
        }
        self.abstract_segment.clear();
    }

    fn build(self) -> Option<Candidate> {
        let pmid = self.pmid.trim().to_string();
        let title = squash_whitespace(&self.title);
        let abstract_text = self.abstract_parts.join(" ");
        if pmid.is_empty() || title.is_empty() {
            debug!(%pmid, "Skipping PubMed record without PMID or title");
            return None;
        }

        // MedlineDate looks like "2024 Nov-Dec" or "Winter 2024".
        let year = match self.year.trim() {
            "" => year_or_current(self.medline_date.trim().get(..4)),
            y => year_or_current(Some(y)),
        };
        let journal = Some(squash_whitespace(&self.journal)).filter(|j| !j.is_empty());
        let doi = Some(self.doi.trim().to_string()).filter(|d| !d.is_empty());

        Some(Candidate {
            source: SourceKind::LiteratureIndex,
            external_id: pmid.clone(),
            url: format!("https://pubmed.ncbi.nlm.nih.gov/{pmid}/"),
            pmid: Some(pmid),
            doi,
            title,
            abstract_text,
            citation_count: CitationCount::Unknown,
            year,
            journal,
        })
    }
}

/// Which builder field, if any, the text at the current element belongs to.
fn route(stack: &[Vec<u8>], doi_id: bool) -> Option<Field> {
    fn within(stack: &[Vec<u8>], name: &[u8]) -> bool {
        stack.iter().any(|n| n.as_slice() == name)
    }
    let at = |depth: usize| stack.len().checked_sub(depth + 1).map(|i| stack[i].as_slice());

    if within(stack, b"ArticleTitle") {
        return Some(Field::Title);
    }
    if within(stack, b"AbstractText") && within(stack, b"Abstract") {
        return Some(Field::Abstract);
    }
    match (at(0)?, at(1)) {
        (b"PMID", Some(b"MedlineCitation"))   => Some(Field::Pmid),
        (b"Title", Some(b"Journal"))          => Some(Field::Journal),
        (b"Year", Some(b"PubDate"))           => Some(Field::Year),
        (b"MedlineDate", Some(b"PubDate"))    => Some(Field::MedlineDate),
        (b"ArticleId", Some(b"ArticleIdList")) if doi_id && at(2) == Some(b"PubmedData".as_slice()) => {
            Some(Field::Doi)
        }
        _ => None,
    }
}

fn is_doi_article_id(e: &BytesStart<'_>) -> bool {
    e.name().as_ref() == b"ArticleId"
        && matches!(
            e.try_get_attribute("IdType"),
            Ok(Some(attr)) if attr.value.as_ref() == b"doi"
        )
}

/// Parse an efetch `PubmedArticleSet` into candidates.
///
/// Records missing a PMID, title or abstract are dropped. A malformed
/// stream keeps every record completed before the error.
pub fn parse_pubmed_xml(xml: &str) -> Vec<Candidate> {
    parse_records(xml)
        .into_iter()
        .filter(|c| {
            if c.abstract_text.is_empty() {
                debug!(pmid = ?c.pmid, "Skipping PubMed record without abstract");
            }
            !c.abstract_text.is_empty()
        })
        .collect()
}

/// Every record with a PMID and title, including those without an abstract.
fn parse_records(xml: &str) -> Vec<Candidate> {
    let mut papers = Vec::new();
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<RecordBuilder> = None;
    let mut doi_id = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.name().as_ref().to_vec();
                if name.as_slice() == b"PubmedArticle" {
                    current = Some(RecordBuilder::default());
                    stack.clear();
                }
                doi_id = is_doi_article_id(e);
                stack.push(name);
            }
            Ok(Event::Text(ref e)) => {
                if let (Some(rec), Some(field)) = (current.as_mut(), route(&stack, doi_id)) {
                    match e.unescape() {
                        Ok(text) => rec.push_text(field, &text),
                        Err(err) => debug!(error = %err, "Skipping undecodable text node"),
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if let (Some(rec), Some(field)) = (current.as_mut(), route(&stack, doi_id)) {
                    rec.push_text(field, &String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                match name.as_ref() {
                    b"AbstractText" => {
                        if let Some(rec) = current.as_mut() {
                            rec.end_abstract_segment();
                        }
                    }
                    b"PubmedArticle" => {
                        if let Some(paper) = current.take().and_then(RecordBuilder::build) {
                            papers.push(paper);
                        }
                    }
                    _ => {}
                }
                stack.pop();
                doi_id = false;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(kept = papers.len(), "PubMed XML parse error: {e}");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    papers
}
