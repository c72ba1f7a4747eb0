//! End-to-end news run.
//!
//! Orchestrates one run:
//!   1. Query every source concurrently (failures degrade to empty)
//!   2. Merge, dropping same-run duplicates and already-published papers
//!   3. Curate the K most engaging candidates
//!   4. Author each selection in turn, persisting after every success
//!   5. Emit progress events via broadcast channel
//!
//! Each stage hands an owned state object to the next:
//! `SourceBatch` → `DedupedCandidates` → `Selection` → `RunReport`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use medpulse_common::{Candidate, SourceKind};
use medpulse_editorial::{Author, Curator, Selection};
use medpulse_llm::CollaboratorOutcome;
use medpulse_store::NewsStore;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::dedup::merge;
use crate::sources::CandidateSource;

// ── Run state ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "index", rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    FetchingSources,
    Deduping,
    Curating,
    /// Zero-based position in the selection.
    Authoring(usize),
    Done,
}

/// Progress event emitted during a run (cloneable for broadcast).
#[derive(Debug, Clone, Serialize)]
pub struct PipelineProgress {
    pub run_id: Uuid,
    pub phase: RunPhase,
    pub message: String,
    pub published: usize,
}

/// Raw per-source output, in source order.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub lists: Vec<(SourceKind, Vec<Candidate>)>,
}

impl SourceBatch {
    pub fn total(&self) -> usize {
        self.lists.iter().map(|(_, l)| l.len()).sum()
    }
}

/// Merged candidates, none of which are already published.
#[derive(Debug, Clone)]
pub struct DedupedCandidates {
    pub candidates: Vec<Candidate>,
    pub fetched: usize,
}

// ── Result summary ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub fetched: usize,
    pub new_candidates: usize,
    pub selected: usize,
    pub curation_fallback: bool,
    /// Ids of the items appended this run, in publish order.
    pub published: Vec<String>,
    /// One line per candidate that failed authoring.
    pub skipped: Vec<String>,
    pub duration_ms: u64,
}

// ── Pipeline orchestrator ─────────────────────────────────────────────────────

pub struct Pipeline {
    sources: Vec<Arc<dyn CandidateSource>>,
    curator: Curator,
    author: Author,
    author_delay: Duration,
    progress_tx: Option<broadcast::Sender<PipelineProgress>>,
}

impl Pipeline {
    pub fn new(sources: Vec<Arc<dyn CandidateSource>>, curator: Curator, author: Author) -> Self {
        Self {
            sources,
            curator,
            author,
            author_delay: Duration::from_secs(2),
            progress_tx: None,
        }
    }

    /// Pause after each successful authoring call when another follows.
    pub fn with_author_delay(mut self, delay: Duration) -> Self {
        self.author_delay = delay;
        self
    }

    pub fn with_progress(mut self, tx: broadcast::Sender<PipelineProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    fn emit(&self, run_id: Uuid, phase: RunPhase, message: String, published: usize) {
        if let Some(tx) = &self.progress_tx {
            // No subscribers is fine.
            let _ = tx.send(PipelineProgress { run_id, phase, message, published });
        }
    }

    /// Execute one run against `store`. Only store I/O failures are errors;
    /// every upstream or collaborator failure degrades and the run completes.
    #[instrument(skip_all)]
    pub async fn run(&self, store: &mut NewsStore) -> anyhow::Result<RunReport> {
        let run_id = Uuid::new_v4();
        let t0 = Instant::now();
        info!(%run_id, sources = self.sources.len(), "Starting news run");
        self.emit(run_id, RunPhase::Idle, "Run started".to_string(), 0);

        let batch = self.fetch_sources(run_id).await;
        let deduped = self.dedup(run_id, batch, store);

        let mut report = RunReport {
            run_id,
            fetched: deduped.fetched,
            new_candidates: deduped.candidates.len(),
            selected: 0,
            curation_fallback: false,
            published: Vec::new(),
            skipped: Vec::new(),
            duration_ms: 0,
        };

        if deduped.candidates.is_empty() {
            info!("No new candidates, nothing to publish");
        } else {
            self.emit(run_id, RunPhase::Curating, format!("Curating {} candidates", report.new_candidates), 0);
            let selection = self.curator.select(deduped.candidates).await;
            report.selected = selection.candidates.len();
            report.curation_fallback = selection.fallback;
            self.author_selection(run_id, selection, store, &mut report).await?;
        }

        report.duration_ms = t0.elapsed().as_millis() as u64;
        info!(
            published = report.published.len(),
            skipped = report.skipped.len(),
            duration_ms = report.duration_ms,
            "News run complete"
        );
        self.emit(
            run_id,
            RunPhase::Done,
            format!("Published {} new items", report.published.len()),
            report.published.len(),
        );
        Ok(report)
    }

    async fn fetch_sources(&self, run_id: Uuid) -> SourceBatch {
        self.emit(run_id, RunPhase::FetchingSources, "Querying sources".to_string(), 0);
        let lists = join_all(self.sources.iter().map(|source| async move {
            (source.kind(), source.fetch_candidates().await)
        }))
        .await;
        SourceBatch { lists }
    }

    fn dedup(&self, run_id: Uuid, batch: SourceBatch, store: &NewsStore) -> DedupedCandidates {
        let fetched = batch.total();
        self.emit(run_id, RunPhase::Deduping, format!("{fetched} candidates found, deduplicating"), 0);
        let lists = batch.lists.into_iter().map(|(_, list)| list).collect();
        let candidates = merge(&store.existing_keys(), lists);
        info!(fetched, new = candidates.len(), "Candidates merged");
        DedupedCandidates { candidates, fetched }
    }

    async fn author_selection(
        &self,
        run_id: Uuid,
        selection: Selection,
        store: &mut NewsStore,
        report: &mut RunReport,
    ) -> anyhow::Result<()> {
        let total = selection.candidates.len();
        for (i, candidate) in selection.candidates.into_iter().enumerate() {
            self.emit(
                run_id,
                RunPhase::Authoring(i),
                format!("Writing {}/{}: {}", i + 1, total, candidate.title),
                report.published.len(),
            );

            match self.author.write(&candidate, None).await {
                CollaboratorOutcome::Ok(draft) => {
                    let item = draft.into_item(&candidate, store.next_id(), None);
                    let id = item.id.clone();
                    store.append(item).await?;
                    info!(%id, key = %candidate.canonical_key(), "Published");
                    report.published.push(id);

                    if i + 1 < total && !self.author_delay.is_zero() {
                        tokio::time::sleep(self.author_delay).await;
                    }
                }
                CollaboratorOutcome::ParseFailed { reason, .. } => {
                    warn!(title = %candidate.title, %reason, "Draft unusable, skipping");
                    report.skipped.push(format!("{}: {reason}", candidate.canonical_key()));
                }
                CollaboratorOutcome::Unavailable(e) => {
                    warn!(title = %candidate.title, error = %e, "Authoring failed, skipping");
                    report.skipped.push(format!("{}: {e}", candidate.canonical_key()));
                }
            }
        }
        Ok(())
    }
}
