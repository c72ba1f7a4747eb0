//! medpulse-llm: Generative-text collaborator abstraction.
//!
//! `backend` holds the provider clients behind the `LlmBackend` trait,
//! `collaborator` turns raw completions into tagged outcomes, and
//! `audit` records every call.

pub mod audit;
pub mod backend;
pub mod collaborator;

pub use backend::{build_backend, BackendConfig, BackendKind, LlmBackend, LlmError, LlmRequest, LlmResponse, Message};
pub use collaborator::{invoke_json, CallPurpose, CollaboratorOutcome};
