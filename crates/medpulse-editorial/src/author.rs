//! Authoring: one collaborator call per selected candidate produces a
//! bilingual draft, which is then stamped into a `PublishedItem`.

use std::sync::Arc;

use chrono::Utc;
use medpulse_common::{ArticleContent, Candidate, Category, Provenance, PublishedItem};
use medpulse_llm::{invoke_json, CallPurpose, CollaboratorOutcome, LlmBackend, LlmRequest, Message};
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::prompts::{authoring_prompt, AUTHOR_SYSTEM};

pub const DEFAULT_DISCLAIMER: &str = "本報導僅供參考，非醫療建議。";

/// The collaborator's authoring payload. Every field except `category_zh`
/// and `disclaimer` must be present for the draft to count.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ArticleDraft {
    pub title_zh: String,
    pub title_en: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub content_zh: String,
    pub content_en: String,
    pub category: String,
    #[serde(default)]
    pub category_zh: Option<String>,
    #[serde(default)]
    pub disclaimer: Option<String>,
}

impl ArticleDraft {
    /// Rejects drafts with blank required text.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("title_zh", &self.title_zh),
            ("title_en", &self.title_en),
            ("summary", &self.summary),
            ("content_zh", &self.content_zh),
            ("content_en", &self.content_en),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(format!("field `{name}` is empty"));
        }
        if self.key_points.iter().all(|p| p.trim().is_empty()) {
            return Err("field `key_points` is empty".to_string());
        }
        Ok(())
    }

    /// The closed category this draft maps to; unrecognized labels fall
    /// back to `General`.
    pub fn category(&self) -> Category {
        Category::parse_loose(&self.category)
            .or_else(|| self.category_zh.as_deref().and_then(Category::parse_loose))
            .unwrap_or_default()
    }

    fn has_bold_markup(&self) -> bool {
        self.content_zh.contains("**") && self.content_en.contains("**")
    }

    /// Stamp the draft with identity, provenance and creation time.
    /// `forced` overrides whatever category the collaborator picked.
    pub fn into_item(self, candidate: &Candidate, id: String, forced: Option<Category>) -> PublishedItem {
        let category = forced.unwrap_or_else(|| self.category());
        let disclaimer = self
            .disclaimer
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DISCLAIMER.to_string());

        PublishedItem {
            id,
            refs: candidate.external_refs(),
            content: ArticleContent {
                title_zh: self.title_zh,
                title_en: self.title_en,
                summary: self.summary,
                key_points: self.key_points.into_iter().filter(|p| !p.trim().is_empty()).collect(),
                content_zh: self.content_zh,
                content_en: self.content_en,
                disclaimer,
            },
            category,
            category_zh: category.label_zh().to_string(),
            provenance: Provenance {
                journal: candidate.journal_label(),
                year: candidate.year.clone(),
                url: candidate.url.clone(),
            },
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthorConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for AuthorConfig {
    fn default() -> Self {
        Self { temperature: 0.7, max_tokens: 4096 }
    }
}

pub struct Author {
    backend: Arc<dyn LlmBackend>,
    config: AuthorConfig,
}

impl Author {
    pub fn new(backend: Arc<dyn LlmBackend>, config: AuthorConfig) -> Self {
        Self { backend, config }
    }

    /// Draft one article. The caller decides what to do with a failed
    /// outcome; nothing is written here.
    #[instrument(skip_all, fields(key = %candidate.canonical_key()))]
    pub async fn write(
        &self,
        candidate: &Candidate,
        forced: Option<Category>,
    ) -> CollaboratorOutcome<ArticleDraft> {
        let req = LlmRequest {
            messages: vec![
                Message::system(AUTHOR_SYSTEM),
                Message::user(authoring_prompt(candidate, forced)),
            ],
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
            json_mode: true,
            ..Default::default()
        };

        let outcome = invoke_json::<ArticleDraft>(self.backend.as_ref(), CallPurpose::Author, req)
            .await
            .and_validate(ArticleDraft::validate);

        if let CollaboratorOutcome::Ok(draft) = &outcome {
            if !draft.has_bold_markup() {
                warn!(title = %draft.title_en, "Draft body has no bold highlights");
            }
        }
        outcome
    }
}
