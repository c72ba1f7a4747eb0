//! Manual publishing of a single PubMed record with an operator-chosen
//! category. Skips the abstract-length filter and curation.

use medpulse_common::Category;
use medpulse_editorial::Author;
use medpulse_llm::CollaboratorOutcome;
use medpulse_store::NewsStore;
use tracing::{info, instrument, warn};

use crate::sources::pubmed::PubMedClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { id: String, title_zh: String },
    AlreadyPublished { key: String },
    NotFound,
    DraftFailed { reason: String },
}

/// Fetch `pmid`, author it under `category` and append it to `store`.
///
/// Upstream fetch and store I/O errors propagate; every other way the
/// request can fall short is reported in the outcome.
#[instrument(skip(pubmed, author, store))]
pub async fn publish_pmid(
    pubmed: &PubMedClient,
    author: &Author,
    store: &mut NewsStore,
    pmid: &str,
    category: Category,
) -> anyhow::Result<PublishOutcome> {
    let Some(candidate) = pubmed.fetch_by_pmid(pmid).await? else {
        warn!("PMID not found");
        return Ok(PublishOutcome::NotFound);
    };

    let key = candidate.canonical_key();
    if store.existing_keys().contains(key.as_str()) {
        info!(%key, "Already published");
        return Ok(PublishOutcome::AlreadyPublished { key: key.to_string() });
    }

    let draft = match author.write(&candidate, Some(category)).await {
        CollaboratorOutcome::Ok(draft) => draft,
        CollaboratorOutcome::ParseFailed { reason, .. } => {
            return Ok(PublishOutcome::DraftFailed { reason });
        }
        CollaboratorOutcome::Unavailable(e) => {
            return Ok(PublishOutcome::DraftFailed { reason: e.to_string() });
        }
    };

    let item = draft.into_item(&candidate, store.next_id(), Some(category));
    let outcome = PublishOutcome::Published {
        id: item.id.clone(),
        title_zh: item.content.title_zh.clone(),
    };
    store.append(item).await?;
    info!(?outcome, "Manually published");
    Ok(outcome)
}
