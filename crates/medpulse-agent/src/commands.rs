//! Subcommand handlers. Each one loads the store itself and prints a short
//! human-readable summary (or JSON where asked).

use std::sync::Arc;

use anyhow::Context;
use medpulse_common::Category;
use medpulse_editorial::{Author, Curator};
use medpulse_ingestion::{
    publish_pmid, CandidateSource, Pipeline, PubMedClient, PublishOutcome, SemanticScholarClient,
};
use medpulse_llm::{build_backend, LlmBackend};
use medpulse_store::NewsStore;
use tracing::info;

use crate::config::Config;

async fn open_store(config: &Config) -> anyhow::Result<NewsStore> {
    NewsStore::load(&config.store.path, config.store.cap)
        .await
        .with_context(|| format!("Failed to open store {}", config.store.path))
}

fn collaborator(config: &Config) -> anyhow::Result<Arc<dyn LlmBackend>> {
    let backend_cfg = config.backend();
    let provider = backend_cfg.kind.as_str();
    let backend = build_backend(backend_cfg).with_context(|| {
        format!(
            "Cannot reach the {provider} collaborator (set llm.api_key or MEDPULSE_{}_API_KEY)",
            provider.to_uppercase()
        )
    })?;
    info!(provider = backend.provider(), model = backend.model_id(), "Collaborator ready");
    Ok(backend)
}

pub async fn run(config: &Config) -> anyhow::Result<()> {
    let backend = collaborator(config)?;
    let sources: Vec<Arc<dyn CandidateSource>> = vec![
        Arc::new(PubMedClient::new(config.pubmed())?),
        Arc::new(SemanticScholarClient::new(config.semantic_scholar())?),
    ];
    let pipeline = Pipeline::new(
        sources,
        Curator::new(backend.clone(), config.curator()),
        Author::new(backend, config.author()),
    )
    .with_author_delay(config.author_delay());

    let mut store = open_store(config).await?;
    let report = pipeline.run(&mut store).await?;

    println!(
        "Fetched {} candidates, {} new, {} selected{}",
        report.fetched,
        report.new_candidates,
        report.selected,
        if report.curation_fallback { " (fallback selection)" } else { "" },
    );
    println!("Published {} new items ({} skipped)", report.published.len(), report.skipped.len());
    for line in &report.skipped {
        println!("  skipped {line}");
    }
    println!("Store now holds {} items", store.len());
    Ok(())
}

pub async fn publish(config: &Config, pmid: &str, category: Category) -> anyhow::Result<()> {
    let backend = collaborator(config)?;
    let pubmed = PubMedClient::new(config.pubmed())?;
    let author = Author::new(backend, config.author());
    let mut store = open_store(config).await?;

    match publish_pmid(&pubmed, &author, &mut store, pmid, category).await? {
        PublishOutcome::Published { id, title_zh } => {
            println!("Published {id}: {title_zh} [{}]", category.label_zh());
        }
        PublishOutcome::AlreadyPublished { key } => {
            println!("Already published ({key}), nothing to do");
        }
        PublishOutcome::NotFound => {
            anyhow::bail!("PubMed has no record for PMID {pmid}");
        }
        PublishOutcome::DraftFailed { reason } => {
            anyhow::bail!("Could not draft an article for PMID {pmid}: {reason}");
        }
    }
    Ok(())
}

pub async fn delete(config: &Config, id: &str) -> anyhow::Result<()> {
    let mut store = open_store(config).await?;
    match store.delete(id).await? {
        Some(item) => println!("Deleted {}: {}", item.id, item.content.title_zh),
        None => println!("No item with id {id}"),
    }
    Ok(())
}

pub async fn stats(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&store.snapshot())?);
        return Ok(());
    }

    let stats = store.stats();
    println!("{} items in {}", stats.total, store.path().display());
    for (label, count) in &stats.categories {
        println!("  {label}: {count}");
    }
    for item in store.items() {
        println!("  {}  {}  {}", item.id, item.created_at.format("%Y-%m-%d"), item.content.title_zh);
    }
    Ok(())
}
