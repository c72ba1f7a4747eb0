//! Audit records for collaborator calls.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize)]
pub struct CollaboratorCall {
    pub purpose: String,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub output_hash: String,
    pub latency_ms: u64,
    pub outcome: &'static str,
    pub called_at: DateTime<Utc>,
}

impl CollaboratorCall {
    pub fn new(
        purpose: &str,
        provider: &str,
        model: &str,
        tokens: (u32, u32),
        output: &str,
        latency_ms: u64,
        outcome: &'static str,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(output.as_bytes());

        Self {
            purpose: purpose.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            prompt_tokens: tokens.0,
            completion_tokens: tokens.1,
            output_hash: format!("{:x}", hasher.finalize()),
            latency_ms,
            outcome,
            called_at: Utc::now(),
        }
    }

    pub fn emit(&self) {
        tracing::debug!(
            purpose = %self.purpose,
            provider = %self.provider,
            model = %self.model,
            prompt_tokens = self.prompt_tokens,
            completion_tokens = self.completion_tokens,
            latency_ms = self.latency_ms,
            output_hash = %self.output_hash,
            outcome = self.outcome,
            "collaborator call"
        );
    }
}
