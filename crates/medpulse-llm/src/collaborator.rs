//! Tagged outcomes for collaborator calls.
//!
//! Every call resolves to `Ok(payload)`, `ParseFailed` (the collaborator
//! answered but the text held no usable JSON payload) or `Unavailable`
//! (the call itself failed). Callers pick their fallback by matching.

use std::time::Instant;

use serde::de::DeserializeOwned;

use crate::audit::CollaboratorCall;
use crate::backend::{LlmBackend, LlmError, LlmRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPurpose {
    Curate,
    Author,
}

impl CallPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallPurpose::Curate => "curate",
            CallPurpose::Author => "author",
        }
    }
}

#[derive(Debug)]
pub enum CollaboratorOutcome<T> {
    Ok(T),
    ParseFailed { reason: String, raw: String },
    Unavailable(LlmError),
}

impl<T> CollaboratorOutcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            CollaboratorOutcome::Ok(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, CollaboratorOutcome::Ok(_))
    }

    /// Post-parse validation: an `Err` demotes the payload to `ParseFailed`.
    pub fn and_validate<F>(self, check: F) -> Self
    where
        F: FnOnce(&T) -> Result<(), String>,
    {
        match self {
            CollaboratorOutcome::Ok(v) => match check(&v) {
                Ok(()) => CollaboratorOutcome::Ok(v),
                Err(reason) => CollaboratorOutcome::ParseFailed { reason, raw: String::new() },
            },
            other => other,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            CollaboratorOutcome::Ok(_)             => "ok",
            CollaboratorOutcome::ParseFailed { .. } => "parse_failed",
            CollaboratorOutcome::Unavailable(_)    => "unavailable",
        }
    }
}

/// Sends one request and parses the response text as JSON of type `T`.
pub async fn invoke_json<T: DeserializeOwned>(
    backend: &dyn LlmBackend,
    purpose: CallPurpose,
    req: LlmRequest,
) -> CollaboratorOutcome<T> {
    let t0 = Instant::now();
    let resp = match backend.complete(req).await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!(purpose = purpose.as_str(), error = %e, "collaborator unavailable");
            return CollaboratorOutcome::Unavailable(e);
        }
    };
    let latency_ms = t0.elapsed().as_millis() as u64;

    let outcome = parse_payload(&resp.content);
    CollaboratorCall::new(
        purpose.as_str(),
        backend.provider(),
        &resp.model,
        (resp.prompt_tokens, resp.completion_tokens),
        &resp.content,
        latency_ms,
        outcome.label(),
    )
    .emit();
    outcome
}

/// Parses collaborator text that should contain a JSON payload.
pub fn parse_payload<T: DeserializeOwned>(text: &str) -> CollaboratorOutcome<T> {
    match serde_json::from_str::<T>(extract_json(text)) {
        Ok(v) => CollaboratorOutcome::Ok(v),
        Err(e) => CollaboratorOutcome::ParseFailed {
            reason: e.to_string(),
            raw: text.to_string(),
        },
    }
}

/// Strips Markdown code fences and surrounding prose, returning the span
/// from the first `[`/`{` to the last `]`/`}`. Text without brackets is
/// returned trimmed so the JSON parser reports the failure.
pub fn extract_json(text: &str) -> &str {
    let body = strip_fences(text.trim());
    let start = body.find(|c: char| c == '[' || c == '{');
    let end = body.rfind(|c: char| c == ']' || c == '}');
    match (start, end) {
        (Some(s), Some(e)) if e > s => &body[s..=e],
        _ => body,
    }
}

fn strip_fences(text: &str) -> &str {
    let mut body = text;
    if body.starts_with("```") {
        body = match body.find('\n') {
            Some(nl) => &body[nl + 1..],
            None => body.trim_start_matches('`'),
        };
    }
    if let Some(stripped) = body.trim_end().strip_suffix("```") {
        body = stripped;
    }
    body.trim()
}
