//! Core entity types: ephemeral candidates and persisted articles.
//! `PublishedItem` serializes to the JSON shape the front-end reads.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MedpulseError;
use crate::keys::CanonicalKey;

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// Which upstream service produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// PubMed: newest publications, no citation data.
    LiteratureIndex,
    /// Semantic Scholar: citation-ranked, counts inline.
    CitationIndex,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::LiteratureIndex => "PubMed",
            SourceKind::CitationIndex   => "Semantic Scholar",
        }
    }

    /// Provenance label used when the record carries no journal title.
    pub fn default_journal_label(&self) -> &'static str {
        match self {
            SourceKind::LiteratureIndex => "PubMed Indexed Journal",
            SourceKind::CitationIndex   => "Semantic Scholar Indexed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CitationCount {
    #[default]
    Unknown,
    Known(u64),
}

impl CitationCount {
    pub fn is_known(&self) -> bool {
        matches!(self, CitationCount::Known(_))
    }
}

impl From<Option<u64>> for CitationCount {
    fn from(value: Option<u64>) -> Self {
        value.map_or(CitationCount::Unknown, CitationCount::Known)
    }
}

impl fmt::Display for CitationCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CitationCount::Unknown  => f.write_str("N/A"),
            CitationCount::Known(n) => write!(f, "{n}"),
        }
    }
}

/// A fetched paper, normalized across sources. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub source: SourceKind,
    pub external_id: String,
    pub pmid: Option<String>,
    pub doi: Option<String>,
    pub title: String,
    pub abstract_text: String,
    pub citation_count: CitationCount,
    pub year: String,
    pub journal: Option<String>,
    pub url: String,
}

impl Candidate {
    pub fn canonical_key(&self) -> CanonicalKey {
        CanonicalKey::for_refs(self.doi.as_deref(), self.pmid.as_deref(), &self.title)
    }

    pub fn journal_label(&self) -> String {
        self.journal
            .as_deref()
            .map(str::trim)
            .filter(|j| !j.is_empty())
            .unwrap_or_else(|| self.source.default_journal_label())
            .to_string()
    }

    pub fn external_refs(&self) -> ExternalRefs {
        ExternalRefs { pmid: self.pmid.clone(), doi: self.doi.clone() }
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Closed set of article categories. Unknown strings in stored data
/// deserialize as `General` so one odd record cannot poison the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum Category {
    SleepScience,
    Longevity,
    MentalHealth,
    #[default]
    General,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::SleepScience,
        Category::Longevity,
        Category::MentalHealth,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::SleepScience => "Sleep Science",
            Category::Longevity    => "Longevity",
            Category::MentalHealth => "Mental Health",
            Category::General      => "General",
        }
    }

    /// Traditional Chinese label shown by the front-end.
    pub fn label_zh(&self) -> &'static str {
        match self {
            Category::SleepScience => "睡眠科學",
            Category::Longevity    => "抗衰老",
            Category::MentalHealth => "心理健康",
            Category::General      => "綜合醫學",
        }
    }

    /// Lenient match used for collaborator output such as
    /// `"Sleep Science/睡眠科學"` and for CLI flags such as `mental-health`.
    pub fn parse_loose(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase().replace(['-', '_'], " ");
        if s.contains("sleep") || s.contains("睡眠") {
            Some(Category::SleepScience)
        } else if s.contains("longevity") || s.contains("抗衰老") {
            Some(Category::Longevity)
        } else if s.contains("mental") || s.contains("心理") {
            Some(Category::MentalHealth)
        } else if s.contains("general") || s.contains("綜合") {
            Some(Category::General)
        } else {
            None
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = MedpulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_loose(s).ok_or_else(|| {
            MedpulseError::Config(format!(
                "unknown category '{s}' (expected sleep, longevity, mental-health or general)"
            ))
        })
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Self::parse_loose(&s).unwrap_or_default()
    }
}

impl From<Category> for &'static str {
    fn from(c: Category) -> Self {
        c.as_str()
    }
}

// ---------------------------------------------------------------------------
// PublishedItem
// ---------------------------------------------------------------------------

/// Cross-reference identifiers carried over from the originating candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRefs {
    #[serde(rename = "pubmed_id", default)]
    pub pmid: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
}

impl ExternalRefs {
    /// Every key these refs answer to. Lookups use the candidate's
    /// priority key, so recording all of them only widens the match.
    pub fn keys(&self) -> Vec<CanonicalKey> {
        let mut keys = Vec::with_capacity(2);
        if let Some(doi) = self.doi.as_deref().filter(|d| !d.trim().is_empty()) {
            keys.push(CanonicalKey::doi(doi));
        }
        if let Some(pmid) = self.pmid.as_deref().filter(|p| !p.trim().is_empty()) {
            keys.push(CanonicalKey::pmid(pmid));
        }
        keys
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleContent {
    pub title_zh: String,
    pub title_en: String,
    pub summary: String,
    pub key_points: Vec<String>,
    /// Markdown, salient facts in `**bold**`.
    pub content_zh: String,
    pub content_en: String,
    pub disclaimer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Provenance {
    pub journal: String,
    pub year: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedItem {
    pub id: String,
    #[serde(flatten)]
    pub refs: ExternalRefs,
    #[serde(flatten)]
    pub content: ArticleContent,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub category_zh: String,
    #[serde(rename = "source", default)]
    pub provenance: Provenance,
    pub created_at: DateTime<Utc>,
}

impl PublishedItem {
    /// `<unix millis><5 random base36 chars>`. Uniqueness against a
    /// particular store is checked by the store.
    pub fn generate_id() -> String {
        const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        let mut bits = Uuid::new_v4().as_u128();
        let suffix: String = (0..5)
            .map(|_| {
                let c = ALPHABET[(bits % 36) as usize] as char;
                bits /= 36;
                c
            })
            .collect();
        format!("{}{}", Utc::now().timestamp_millis(), suffix)
    }

    pub fn keys(&self) -> Vec<CanonicalKey> {
        self.refs.keys()
    }
}
