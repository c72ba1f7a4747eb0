//! Fixtures shared by the MedPulse crates' tests: candidate and article
//! builders, canned collaborator payloads, and a scripted `LlmBackend`.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use medpulse_common::{
    ArticleContent, Candidate, Category, CitationCount, ExternalRefs, Provenance, PublishedItem,
    SourceKind,
};
use medpulse_llm::{LlmBackend, LlmError, LlmRequest, LlmResponse};

/// Abstract long enough to pass the adapters' minimum-length filter.
pub const LONG_ABSTRACT: &str = "Background: Sleep duration and timing have been linked to cardiometabolic \
health in several cohorts. Methods: We followed 12,000 adults for eight years with wrist actigraphy. \
Results: Irregular sleep timing was associated with a 26% higher risk of major cardiovascular events \
independent of total sleep duration. Conclusions: Sleep regularity may be a modifiable risk factor.";

// ── Candidates ────────────────────────────────────────────────────────────────

pub fn candidate(source: SourceKind, title: &str) -> Candidate {
    Candidate {
        source,
        external_id: format!("{}-{}", source.as_str(), title.len()),
        pmid: None,
        doi: None,
        title: title.to_string(),
        abstract_text: LONG_ABSTRACT.to_string(),
        citation_count: match source {
            SourceKind::LiteratureIndex => CitationCount::Unknown,
            SourceKind::CitationIndex   => CitationCount::Known(0),
        },
        year: "2025".to_string(),
        journal: None,
        url: "https://example.org/paper".to_string(),
    }
}

/// Builder-style setters for test candidates.
pub trait CandidateExt: Sized {
    fn with_doi(self, doi: &str) -> Self;
    fn with_pmid(self, pmid: &str) -> Self;
    fn with_citations(self, citations: CitationCount) -> Self;
}

impl CandidateExt for Candidate {
    fn with_doi(mut self, doi: &str) -> Self {
        self.doi = Some(doi.to_string());
        self
    }

    fn with_pmid(mut self, pmid: &str) -> Self {
        self.pmid = Some(pmid.to_string());
        self
    }

    fn with_citations(mut self, citations: CitationCount) -> Self {
        self.citation_count = citations;
        self
    }
}

// ── Published items ───────────────────────────────────────────────────────────

pub fn published_item(id: &str, doi: Option<&str>, pmid: Option<&str>) -> PublishedItem {
    PublishedItem {
        id: id.to_string(),
        refs: ExternalRefs { pmid: pmid.map(String::from), doi: doi.map(String::from) },
        content: ArticleContent {
            title_zh: format!("標題 {id}"),
            title_en: format!("Headline {id}"),
            summary: "summary".to_string(),
            key_points: vec!["point".to_string()],
            content_zh: "**重點** 內文".to_string(),
            content_en: "**Key** body".to_string(),
            disclaimer: "not medical advice".to_string(),
        },
        category: Category::General,
        category_zh: Category::General.label_zh().to_string(),
        provenance: Provenance {
            journal: "Test Journal".to_string(),
            year: "2025".to_string(),
            url: "https://example.org/paper".to_string(),
        },
        created_at: Utc::now(),
    }
}

// ── Collaborator payloads ─────────────────────────────────────────────────────

pub fn draft_value(category: &str) -> serde_json::Value {
    serde_json::json!({
        "title_zh": "睡得不規律，心臟更受傷？",
        "title_en": "Irregular Sleep May Strain Your Heart",
        "summary": "一項追蹤八年的研究發現，作息不規律與心血管風險上升有關。",
        "key_points": ["固定就寢時間", "週末也別補眠過度", "規律比時數更重要"],
        "content_zh": "研究發現 **不規律的睡眠時間** 與心血管事件風險 **增加 26%** 相關。",
        "content_en": "Researchers found **irregular sleep timing** was tied to a **26% higher** risk.",
        "category": category,
        "category_zh": "睡眠科學",
        "disclaimer": "本報導僅供參考，非醫療建議。"
    })
}

/// A complete authoring payload as the collaborator would return it.
pub fn draft_json() -> String {
    draft_value("Sleep Science").to_string()
}

/// An authoring payload with one required field removed.
pub fn draft_json_without(field: &str) -> String {
    let mut v = draft_value("Sleep Science");
    if let Some(obj) = v.as_object_mut() {
        obj.remove(field);
    }
    v.to_string()
}

// ── Scripted backend ──────────────────────────────────────────────────────────

/// Replays queued replies in order and records every request. An exhausted
/// script answers `Unavailable`.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    pub fn fail(self, err: LlmError) -> Self {
        self.push(Err(err));
        self
    }

    pub fn push(&self, reply: Result<String, LlmError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Concatenated user-visible text of the n-th request.
    pub fn prompt(&self, n: usize) -> String {
        self.requests.lock().unwrap()[n]
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(req);
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(content)) => Ok(LlmResponse {
                content,
                model: "scripted".to_string(),
                prompt_tokens: 0,
                completion_tokens: 0,
            }),
            Some(Err(e)) => Err(e),
            None => Err(LlmError::Unavailable("script exhausted".to_string())),
        }
    }

    fn model_id(&self) -> &str { "scripted" }
    fn provider(&self) -> &'static str { "scripted" }
}
