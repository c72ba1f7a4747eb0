use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_empty_file_gives_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.store.path, "public/data/news.json");
    assert_eq!(config.store.cap, 50);
    assert_eq!(config.pubmed.retmax, 20);
    assert_eq!(config.semantic_scholar.window_days, 365);
    assert_eq!(config.editorial.select_count, 3);
    assert_eq!(config.editorial.author_delay_ms, 2_000);
    assert_eq!(config.llm.provider, BackendKind::Gemini);
    assert_eq!(config.llm.model, "gemini-2.0-flash");
}

#[test]
fn test_partial_sections_keep_other_defaults() {
    let config: Config = toml::from_str(
        r#"
        [store]
        cap = 10

        [llm]
        provider = "openai_compatible"
        model = "llama3:8b"
        base_url = "http://localhost:11434"
        "#,
    )
    .unwrap();
    assert_eq!(config.store.cap, 10);
    assert_eq!(config.store.path, "public/data/news.json");
    assert_eq!(config.llm.provider, BackendKind::OpenAiCompatible);
    assert_eq!(config.llm.temperature, 0.7);

    let backend = config.backend();
    assert_eq!(backend.base_url.as_deref(), Some("http://localhost:11434"));
    assert_eq!(backend.model, "llama3:8b");
}

#[test]
fn test_provider_names() {
    for (name, kind) in [
        ("gemini", BackendKind::Gemini),
        ("openai", BackendKind::OpenAi),
        ("ollama", BackendKind::Ollama),
        ("anthropic", BackendKind::Anthropic),
    ] {
        let config: Config = toml::from_str(&format!("[llm]\nprovider = \"{name}\"")).unwrap();
        assert_eq!(config.llm.provider, kind);
        assert_eq!(kind.as_str(), name);
    }
    assert!(toml::from_str::<Config>("[llm]\nprovider = \"palm\"").is_err());
}

#[test]
fn test_configured_key_wins_and_blank_key_falls_through() {
    let config: Config = toml::from_str("[llm]\nprovider = \"anthropic\"\napi_key = \"sk-config\"").unwrap();
    assert_eq!(config.backend().api_key.as_deref(), Some("sk-config"));

    std::env::set_var("MEDPULSE_OPENAI_COMPATIBLE_API_KEY", "sk-env");
    let config: Config = toml::from_str("[llm]\nprovider = \"openai_compatible\"\napi_key = \" \"").unwrap();
    assert_eq!(config.backend().api_key.as_deref(), Some("sk-env"));
    std::env::remove_var("MEDPULSE_OPENAI_COMPATIBLE_API_KEY");
}

#[test]
fn test_editorial_settings_flow_into_stages() {
    let config: Config = toml::from_str(
        "[editorial]\nselect_count = 5\nmin_abstract_chars = 120\nauthor_delay_ms = 0",
    )
    .unwrap();
    assert_eq!(config.curator().select_count, 5);
    assert_eq!(config.pubmed().min_abstract_chars, 120);
    assert_eq!(config.semantic_scholar().min_abstract_chars, 120);
    assert!(config.author_delay().is_zero());
}

#[test]
fn test_missing_file_loads_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.store.cap, 50);

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "[store\ncap = ").unwrap();
    assert!(Config::load_from(&bad).is_err());
}
