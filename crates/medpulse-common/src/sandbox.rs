use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;
use crate::error::{MedpulseError, Result};

pub const DEFAULT_USER_AGENT: &str = "MedPulse-NewsBot/1.0";

/// An HTTP client that only talks to approved hosts.
///
/// Source adapters receive one of these instead of a bare `reqwest::Client`
/// so a misconfigured base URL cannot make the pipeline call arbitrary hosts.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Creates a client with the default allowlist and user agent.
    pub fn new() -> Result<Self> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> Result<Self> {
        let domains = [
            "eutils.ncbi.nlm.nih.gov",           // PubMed E-utilities
            "pubmed.ncbi.nlm.nih.gov",           // PubMed record pages
            "api.semanticscholar.org",           // Semantic Scholar Graph API
            "generativelanguage.googleapis.com", // Gemini
            "api.openai.com",                    // OpenAI
            "api.anthropic.com",                 // Anthropic
            "localhost",                         // Ollama / LM Studio
            "127.0.0.1",
        ];
        let allowlist = domains.iter().map(|d| d.to_string()).collect();

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Allows the host of a configured base URL (e.g. a self-hosted mirror).
    pub fn allow_url_host(&mut self, url: &str) -> Result<()> {
        let parsed = Url::parse(url)
            .map_err(|e| MedpulseError::Config(format!("invalid base URL {url}: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| MedpulseError::Config(format!("base URL has no host: {url}")))?;
        self.allow_domain(host);
        Ok(())
    }

    /// Validates if a URL is permitted under the current allowlist.
    /// Subdomains of an allowed domain are permitted too.
    pub fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else { return false };
        let Some(host) = parsed.host_str() else { return false };
        self.allowlist
            .iter()
            .any(|allowed| host == allowed || host.ends_with(&format!(".{allowed}")))
    }

    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder> {
        if !self.is_allowed(url) {
            return Err(MedpulseError::Security(format!(
                "domain not in allowlist for URL {url}"
            )));
        }
        Ok(self.client.get(url))
    }
}
