//! Whole runs with in-memory sources, a scripted collaborator and a
//! temporary store file.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use medpulse_common::{Candidate, Category, CitationCount, SourceKind};
use medpulse_editorial::{Author, AuthorConfig, Curator, CuratorConfig};
use medpulse_ingestion::sources::pubmed::{PubMedClient, PubMedConfig};
use medpulse_ingestion::{publish_pmid, CandidateSource, Pipeline, PublishOutcome, RunPhase};
use medpulse_llm::LlmError;
use medpulse_store::NewsStore;
use medpulse_test_utils::{
    candidate, draft_json, draft_json_without, draft_value, CandidateExt, ScriptedBackend,
};
use pretty_assertions::assert_eq;
use tokio::sync::broadcast;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct FixedSource {
    kind: SourceKind,
    candidates: Vec<Candidate>,
}

#[async_trait]
impl CandidateSource for FixedSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn search(&self) -> anyhow::Result<Vec<Candidate>> {
        Ok(self.candidates.clone())
    }
}

struct DownSource;

#[async_trait]
impl CandidateSource for DownSource {
    fn kind(&self) -> SourceKind {
        SourceKind::CitationIndex
    }

    async fn search(&self) -> anyhow::Result<Vec<Candidate>> {
        anyhow::bail!("connection refused")
    }
}

fn fixed(kind: SourceKind, candidates: Vec<Candidate>) -> Arc<dyn CandidateSource> {
    Arc::new(FixedSource { kind, candidates })
}

fn pipeline(sources: Vec<Arc<dyn CandidateSource>>, backend: Arc<ScriptedBackend>) -> Pipeline {
    Pipeline::new(
        sources,
        Curator::new(backend.clone(), CuratorConfig::default()),
        Author::new(backend, AuthorConfig::default()),
    )
    .with_author_delay(Duration::ZERO)
}

async fn temp_store(dir: &tempfile::TempDir) -> NewsStore {
    NewsStore::load(dir.path().join("news.json"), 50).await.unwrap()
}

fn shared_doi_sources() -> Vec<Arc<dyn CandidateSource>> {
    vec![
        fixed(
            SourceKind::LiteratureIndex,
            vec![candidate(SourceKind::LiteratureIndex, "Intermittent fasting").with_doi("10.1/a").with_pmid("42")],
        ),
        fixed(
            SourceKind::CitationIndex,
            vec![candidate(SourceKind::CitationIndex, "Intermittent fasting")
                .with_doi("10.1/a")
                .with_citations(CitationCount::Known(40))],
        ),
    ]
}

#[tokio::test]
async fn test_end_to_end_publishes_once_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = temp_store(&dir).await;
    let backend = Arc::new(ScriptedBackend::new().reply("[0]").reply(draft_json()));

    let first = pipeline(shared_doi_sources(), backend.clone()).run(&mut store).await.unwrap();
    assert_eq!(first.fetched, 2);
    assert_eq!(first.new_candidates, 1);
    assert_eq!(first.published.len(), 1);
    assert!(backend.prompt(0).contains("[Citations: 40]"));

    let reloaded = temp_store(&dir).await;
    assert_eq!(reloaded.len(), 1);
    let item = &reloaded.items()[0];
    assert_eq!(item.refs.doi.as_deref(), Some("10.1/a"));
    assert_eq!(item.provenance.journal, "Semantic Scholar Indexed");
    assert_eq!(item.category, Category::SleepScience);

    // Same upstream data again: nothing new, no collaborator calls.
    let second = pipeline(shared_doi_sources(), backend.clone()).run(&mut store).await.unwrap();
    assert_eq!(second.new_candidates, 0);
    assert!(second.published.is_empty());
    assert_eq!(backend.call_count(), 2);
    assert_eq!(temp_store(&dir).await.len(), 1);
}

#[tokio::test]
async fn test_authoring_failures_skip_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = temp_store(&dir).await;
    let pool = vec![
        candidate(SourceKind::LiteratureIndex, "First").with_pmid("1"),
        candidate(SourceKind::LiteratureIndex, "Second").with_pmid("2"),
        candidate(SourceKind::LiteratureIndex, "Third").with_pmid("3"),
    ];
    let backend = Arc::new(
        ScriptedBackend::new()
            .reply("[0, 1, 2]")
            .reply(draft_json_without("content_zh"))
            .fail(LlmError::RateLimitExceeded)
            .reply(draft_value("Longevity").to_string()),
    );

    let report = pipeline(vec![fixed(SourceKind::LiteratureIndex, pool)], backend.clone())
        .run(&mut store)
        .await
        .unwrap();

    assert_eq!(report.selected, 3);
    assert_eq!(report.published.len(), 1);
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(backend.call_count(), 4);

    let reloaded = temp_store(&dir).await;
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded.items()[0].refs.pmid.as_deref(), Some("3"));
    assert_eq!(reloaded.items()[0].category, Category::Longevity);
}

fn three_pmids() -> Vec<Arc<dyn CandidateSource>> {
    let pool = (1..=3)
        .map(|i| candidate(SourceKind::LiteratureIndex, &format!("Paper {i}")).with_pmid(&i.to_string()))
        .collect();
    vec![fixed(SourceKind::LiteratureIndex, pool)]
}

#[tokio::test(start_paused = true)]
async fn test_author_delay_follows_successes_only() {
    let delay = Duration::from_secs(2);
    let slack = Duration::from_millis(100);

    // Three successes: a pause after the first and second, none after the last.
    let dir = tempfile::tempdir().unwrap();
    let mut store = temp_store(&dir).await;
    let backend = Arc::new(
        ScriptedBackend::new()
            .reply("[0, 1, 2]")
            .reply(draft_json())
            .reply(draft_json())
            .reply(draft_json()),
    );
    let started = tokio::time::Instant::now();
    let report = pipeline(three_pmids(), backend)
        .with_author_delay(delay)
        .run(&mut store)
        .await
        .unwrap();
    let elapsed = started.elapsed();
    assert_eq!(report.published.len(), 3);
    assert!(elapsed >= delay * 2 && elapsed < delay * 2 + slack, "elapsed {elapsed:?}");

    // Failures add no pause, and the final success is last.
    let dir = tempfile::tempdir().unwrap();
    let mut store = temp_store(&dir).await;
    let backend = Arc::new(
        ScriptedBackend::new()
            .reply("[0, 1, 2]")
            .fail(LlmError::RateLimitExceeded)
            .reply(draft_json_without("title_en"))
            .reply(draft_json()),
    );
    let started = tokio::time::Instant::now();
    let report = pipeline(three_pmids(), backend)
        .with_author_delay(delay)
        .run(&mut store)
        .await
        .unwrap();
    assert_eq!(report.published.len(), 1);
    assert!(started.elapsed() < slack, "elapsed {:?}", started.elapsed());
}

#[tokio::test]
async fn test_curation_fallback_and_source_outage() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = temp_store(&dir).await;
    let pool: Vec<Candidate> = (0..5)
        .map(|i| candidate(SourceKind::LiteratureIndex, &format!("Paper {i}")).with_pmid(&i.to_string()))
        .collect();
    let backend = Arc::new(
        ScriptedBackend::new()
            .reply("not json")
            .reply(draft_json())
            .reply(draft_json())
            .reply(draft_json()),
    );

    let report = pipeline(
        vec![fixed(SourceKind::LiteratureIndex, pool), Arc::new(DownSource)],
        backend,
    )
    .run(&mut store)
    .await
    .unwrap();

    assert!(report.curation_fallback);
    assert_eq!(report.published.len(), 3);
    // Newest first: the third selection was written last.
    let pmids: Vec<_> = store.items().iter().filter_map(|i| i.refs.pmid.clone()).collect();
    assert_eq!(pmids, vec!["2", "1", "0"]);
}

#[tokio::test]
async fn test_progress_events_trace_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = temp_store(&dir).await;
    let (tx, mut rx) = broadcast::channel(32);
    let backend = Arc::new(ScriptedBackend::new().reply("[0]").reply(draft_json()));

    pipeline(shared_doi_sources(), backend)
        .with_progress(tx)
        .run(&mut store)
        .await
        .unwrap();

    let mut phases = Vec::new();
    while let Ok(event) = rx.try_recv() {
        phases.push(event.phase);
    }
    assert_eq!(
        phases,
        vec![
            RunPhase::Idle,
            RunPhase::FetchingSources,
            RunPhase::Deduping,
            RunPhase::Curating,
            RunPhase::Authoring(0),
            RunPhase::Done,
        ]
    );
}

#[tokio::test]
async fn test_empty_sources_finish_without_collaborator() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = temp_store(&dir).await;
    let backend = Arc::new(ScriptedBackend::new());

    let report = pipeline(vec![Arc::new(DownSource)], backend.clone())
        .run(&mut store)
        .await
        .unwrap();

    assert_eq!(report.fetched, 0);
    assert!(report.published.is_empty());
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_manual_publish_forces_category_and_refuses_duplicates() {
    let server = MockServer::start().await;
    let xml = r#"<PubmedArticleSet><PubmedArticle>
  <MedlineCitation><PMID>900</PMID><Article>
    <ArticleTitle>Mindfulness at work</ArticleTitle>
    <Abstract><AbstractText>Short.</AbstractText></Abstract>
  </Article></MedlineCitation>
  <PubmedData><ArticleIdList><ArticleId IdType="doi">10.5/mind</ArticleId></ArticleIdList></PubmedData>
</PubmedArticle></PubmedArticleSet>"#;
    Mock::given(method("GET"))
        .and(path("/entrez/eutils/efetch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string(xml))
        .mount(&server)
        .await;

    let pubmed = PubMedClient::new(PubMedConfig { base_url: server.uri(), ..Default::default() }).unwrap();
    let backend = Arc::new(ScriptedBackend::new().reply(draft_json()));
    let author = Author::new(backend.clone(), AuthorConfig::default());
    let dir = tempfile::tempdir().unwrap();
    let mut store = temp_store(&dir).await;

    let outcome = publish_pmid(&pubmed, &author, &mut store, "900", Category::MentalHealth).await.unwrap();
    assert!(matches!(outcome, PublishOutcome::Published { .. }));
    assert!(backend.prompt(0).contains("\"Mental Health\""));
    let item = &store.items()[0];
    assert_eq!(item.category, Category::MentalHealth);
    assert_eq!(item.category_zh, "心理健康");
    assert_eq!(item.provenance.journal, "PubMed Indexed Journal");
    assert_eq!(item.provenance.url, "https://pubmed.ncbi.nlm.nih.gov/900/");

    let again = publish_pmid(&pubmed, &author, &mut store, "900", Category::General).await.unwrap();
    assert_eq!(again, PublishOutcome::AlreadyPublished { key: "doi:10.5/mind".to_string() });
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn test_manual_publish_unknown_pmid() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/entrez/eutils/efetch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<PubmedArticleSet></PubmedArticleSet>"))
        .mount(&server)
        .await;

    let pubmed = PubMedClient::new(PubMedConfig { base_url: server.uri(), ..Default::default() }).unwrap();
    let backend = Arc::new(ScriptedBackend::new());
    let author = Author::new(backend, AuthorConfig::default());
    let dir = tempfile::tempdir().unwrap();
    let mut store = temp_store(&dir).await;

    let outcome = publish_pmid(&pubmed, &author, &mut store, "1", Category::General).await.unwrap();
    assert_eq!(outcome, PublishOutcome::NotFound);
    assert!(store.is_empty());
}
