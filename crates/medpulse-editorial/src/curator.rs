//! Curation: one collaborator call picks the K most engaging candidates.

use std::collections::HashSet;
use std::sync::Arc;

use medpulse_common::Candidate;
use medpulse_llm::{invoke_json, CallPurpose, CollaboratorOutcome, LlmBackend, LlmRequest, Message};
use tracing::{info, instrument, warn};

use crate::prompts::{curation_prompt, CURATOR_SYSTEM};

#[derive(Debug, Clone)]
pub struct CuratorConfig {
    /// K: how many candidates to select.
    pub select_count: usize,
    /// Abstract characters shown per candidate.
    pub abstract_excerpt_chars: usize,
    pub temperature: f32,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self { select_count: 3, abstract_excerpt_chars: 300, temperature: 0.2 }
    }
}

/// The curated subset handed to the author loop.
#[derive(Debug, Clone)]
pub struct Selection {
    pub candidates: Vec<Candidate>,
    /// True when the first-K fallback was used.
    pub fallback: bool,
}

pub struct Curator {
    backend: Arc<dyn LlmBackend>,
    config: CuratorConfig,
}

impl Curator {
    pub fn new(backend: Arc<dyn LlmBackend>, config: CuratorConfig) -> Self {
        Self { backend, config }
    }

    /// Select at most K candidates. Never fails: an unusable or missing
    /// collaborator answer falls back to the first K in input order.
    #[instrument(skip_all, fields(n = candidates.len()))]
    pub async fn select(&self, candidates: Vec<Candidate>) -> Selection {
        let k = self.config.select_count;
        if candidates.is_empty() || k == 0 {
            return Selection { candidates: Vec::new(), fallback: false };
        }

        let req = LlmRequest {
            messages: vec![
                Message::system(CURATOR_SYSTEM),
                Message::user(curation_prompt(&candidates, k, self.config.abstract_excerpt_chars)),
            ],
            temperature: Some(self.config.temperature),
            max_tokens: Some(256),
            json_mode: true,
            ..Default::default()
        };

        let outcome = invoke_json::<Vec<i64>>(self.backend.as_ref(), CallPurpose::Curate, req)
            .await
            .and_validate(|indices| resolve_indices(indices, candidates.len(), k).map(|_| ()));

        match outcome {
            CollaboratorOutcome::Ok(indices) => {
                let picked = resolve_indices(&indices, candidates.len(), k).unwrap_or_default();
                info!(?picked, "Collaborator selected candidates");
                let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
                let chosen = picked.into_iter().filter_map(|i| slots[i].take()).collect();
                Selection { candidates: chosen, fallback: false }
            }
            CollaboratorOutcome::ParseFailed { reason, .. } => {
                warn!(%reason, "Curation response unusable, using first {k}");
                first_k(candidates, k)
            }
            CollaboratorOutcome::Unavailable(e) => {
                warn!(error = %e, "Curation call failed, using first {k}");
                first_k(candidates, k)
            }
        }
    }
}

/// Validate collaborator indices: all in range, at least one. Duplicates
/// collapse and anything past K is dropped.
fn resolve_indices(indices: &[i64], len: usize, k: usize) -> Result<Vec<usize>, String> {
    if indices.is_empty() {
        return Err("empty selection".to_string());
    }
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(k);
    for &raw in indices {
        let idx = usize::try_from(raw)
            .ok()
            .filter(|&i| i < len)
            .ok_or_else(|| format!("index {raw} out of range 0..{len}"))?;
        if seen.insert(idx) && out.len() < k {
            out.push(idx);
        }
    }
    Ok(out)
}

fn first_k(mut candidates: Vec<Candidate>, k: usize) -> Selection {
    candidates.truncate(k);
    Selection { candidates, fallback: true }
}
