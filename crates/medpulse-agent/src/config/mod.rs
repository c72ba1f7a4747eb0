//! Configuration loading for MedPulse.
//! Reads medpulse.toml from the current directory or path in MEDPULSE_CONFIG env var.
//! Every field has a default, so a missing file or section is not an error.

use std::path::Path;
use std::time::Duration;

use medpulse_editorial::{AuthorConfig, CuratorConfig};
use medpulse_ingestion::sources::pubmed::{self, PubMedConfig};
use medpulse_ingestion::sources::semantic_scholar::{self, SemanticScholarConfig};
use medpulse_llm::{BackendConfig, BackendKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub pubmed: PubMedSection,
    #[serde(default)]
    pub semantic_scholar: SemanticScholarSection,
    #[serde(default)]
    pub editorial: EditorialConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
    #[serde(default = "default_cap")]
    pub cap: usize,
}

fn default_store_path() -> String { "public/data/news.json".to_string() }
fn default_cap()        -> usize  { medpulse_store::DEFAULT_CAP }

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path(), cap: default_cap() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubMedSection {
    #[serde(default = "default_pubmed_term")]
    pub term: String,
    #[serde(default = "default_twenty")]
    pub retmax: usize,
    pub api_key: Option<String>,
    #[serde(default = "default_pubmed_base")]
    pub base_url: String,
}

fn default_pubmed_term() -> String { pubmed::DEFAULT_TERM.to_string() }
fn default_pubmed_base() -> String { pubmed::DEFAULT_BASE_URL.to_string() }
fn default_twenty()      -> usize  { 20 }

impl Default for PubMedSection {
    fn default() -> Self {
        Self {
            term: default_pubmed_term(),
            retmax: default_twenty(),
            api_key: None,
            base_url: default_pubmed_base(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticScholarSection {
    #[serde(default = "default_s2_query")]
    pub query: String,
    #[serde(default = "default_twenty")]
    pub limit: usize,
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    pub api_key: Option<String>,
    #[serde(default = "default_s2_base")]
    pub base_url: String,
}

fn default_s2_query()    -> String { semantic_scholar::DEFAULT_QUERY.to_string() }
fn default_s2_base()     -> String { semantic_scholar::DEFAULT_BASE_URL.to_string() }
fn default_window_days() -> i64    { 365 }

impl Default for SemanticScholarSection {
    fn default() -> Self {
        Self {
            query: default_s2_query(),
            limit: default_twenty(),
            window_days: default_window_days(),
            api_key: None,
            base_url: default_s2_base(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorialConfig {
    #[serde(default = "default_select_count")]
    pub select_count: usize,
    #[serde(default = "default_author_delay_ms")]
    pub author_delay_ms: u64,
    #[serde(default = "default_excerpt_chars")]
    pub abstract_excerpt_chars: usize,
    #[serde(default = "default_min_abstract_chars")]
    pub min_abstract_chars: usize,
}

fn default_select_count()       -> usize { 3 }
fn default_author_delay_ms()    -> u64   { 2_000 }
fn default_excerpt_chars()      -> usize { 300 }
fn default_min_abstract_chars() -> usize { 200 }

impl Default for EditorialConfig {
    fn default() -> Self {
        Self {
            select_count: default_select_count(),
            author_delay_ms: default_author_delay_ms(),
            abstract_excerpt_chars: default_excerpt_chars(),
            min_abstract_chars: default_min_abstract_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: BackendKind,
    #[serde(default = "default_model")]
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider()     -> BackendKind { BackendKind::Gemini }
fn default_model()        -> String      { "gemini-2.0-flash".to_string() }
fn default_temperature()  -> f32         { 0.7 }
fn default_max_tokens()   -> u32         { 4096 }
fn default_timeout_secs() -> u64         { 120 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests;

impl Config {
    /// Load configuration from medpulse.toml.
    /// Checks MEDPULSE_CONFIG env var first, then current directory.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("MEDPULSE_CONFIG")
            .unwrap_or_else(|_| "medpulse.toml".to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {e}", path.display()))?;
        Ok(config)
    }

    pub fn pubmed(&self) -> PubMedConfig {
        PubMedConfig {
            base_url: self.pubmed.base_url.clone(),
            term: self.pubmed.term.clone(),
            retmax: self.pubmed.retmax,
            api_key: non_empty(self.pubmed.api_key.clone())
                .or_else(|| env_key("MEDPULSE_PUBMED_API_KEY")),
            min_abstract_chars: self.editorial.min_abstract_chars,
        }
    }

    pub fn semantic_scholar(&self) -> SemanticScholarConfig {
        SemanticScholarConfig {
            base_url: self.semantic_scholar.base_url.clone(),
            query: self.semantic_scholar.query.clone(),
            limit: self.semantic_scholar.limit,
            window_days: self.semantic_scholar.window_days,
            api_key: non_empty(self.semantic_scholar.api_key.clone())
                .or_else(|| env_key("MEDPULSE_SEMANTIC_SCHOLAR_API_KEY")),
            min_abstract_chars: self.editorial.min_abstract_chars,
        }
    }

    pub fn curator(&self) -> CuratorConfig {
        CuratorConfig {
            select_count: self.editorial.select_count,
            abstract_excerpt_chars: self.editorial.abstract_excerpt_chars,
            ..Default::default()
        }
    }

    pub fn author(&self) -> AuthorConfig {
        AuthorConfig {
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
        }
    }

    pub fn author_delay(&self) -> Duration {
        Duration::from_millis(self.editorial.author_delay_ms)
    }

    /// Backend settings with the API key resolved: config value, then
    /// `MEDPULSE_<PROVIDER>_API_KEY`, then `GEMINI_API_KEY` for Gemini.
    pub fn backend(&self) -> BackendConfig {
        let provider = self.llm.provider;
        let env_name = format!("MEDPULSE_{}_API_KEY", provider.as_str().to_uppercase());
        let mut api_key = non_empty(self.llm.api_key.clone()).or_else(|| env_key(&env_name));
        if api_key.is_none() && provider == BackendKind::Gemini {
            api_key = env_key("GEMINI_API_KEY");
        }

        BackendConfig {
            kind: provider,
            model: self.llm.model.clone(),
            api_key,
            base_url: non_empty(self.llm.base_url.clone()),
            timeout: Duration::from_secs(self.llm.timeout_secs),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn env_key(name: &str) -> Option<String> {
    non_empty(std::env::var(name).ok())
}
