//! HTTP-level tests for the collaborator backends against a mock server.

use medpulse_llm::backend::{GeminiBackend, OpenAiCompatibleBackend};
use medpulse_llm::{invoke_json, CallPurpose, CollaboratorOutcome, LlmBackend, LlmError, LlmRequest, Message};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gemini_reply(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" } }],
        "usageMetadata": { "promptTokenCount": 120, "candidatesTokenCount": 8 }
    })
}

#[tokio::test]
async fn test_gemini_complete_sends_key_and_json_mode() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(serde_json::json!({
            "generationConfig": { "responseMimeType": "application/json" },
            "systemInstruction": { "parts": [{ "text": "be brief" }] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("[0, 2, 1]")))
        .expect(1)
        .mount(&server)
        .await;

    let backend = GeminiBackend::new("test-key", "gemini-2.0-flash").with_base_url(server.uri());
    let resp = backend
        .complete(LlmRequest {
            messages: vec![Message::system("be brief"), Message::user("pick three")],
            json_mode: true,
            ..Default::default()
        })
        .await
        .expect("gemini call");

    assert_eq!(resp.content, "[0, 2, 1]");
    assert_eq!(resp.prompt_tokens, 120);
    assert_eq!(resp.completion_tokens, 8);
}

#[tokio::test]
async fn test_gemini_rate_limit_maps_to_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let backend = GeminiBackend::new("k", "gemini-2.0-flash").with_base_url(server.uri());
    let err = backend
        .complete(LlmRequest { messages: vec![Message::user("hi")], ..Default::default() })
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::RateLimitExceeded));
}

#[tokio::test]
async fn test_openai_compatible_api_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": { "message": "model not found" }
        })))
        .mount(&server)
        .await;

    let backend = OpenAiCompatibleBackend::new(server.uri(), "local-model", None);
    let err = backend
        .complete(LlmRequest { messages: vec![Message::user("hi")], ..Default::default() })
        .await
        .unwrap_err();
    match err {
        LlmError::ApiError { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "model not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_invoke_json_strips_fences() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "local-model",
            "choices": [{ "message": { "role": "assistant", "content": "```json\n[3, 1]\n```" } }],
            "usage": { "prompt_tokens": 5, "completion_tokens": 3 }
        })))
        .mount(&server)
        .await;

    let backend = OpenAiCompatibleBackend::new(server.uri(), "local-model", Some("sk".to_string()));
    let outcome: CollaboratorOutcome<Vec<i64>> = invoke_json(
        &backend,
        CallPurpose::Curate,
        LlmRequest { messages: vec![Message::user("pick")], ..Default::default() },
    )
    .await;

    assert_eq!(outcome.ok(), Some(vec![3, 1]));
}

#[tokio::test]
async fn test_invoke_json_unreachable_backend_is_unavailable() {
    // Nothing listens on port 9 locally; the connect fails.
    let backend = OpenAiCompatibleBackend::new("http://127.0.0.1:9", "m", None);
    let outcome: CollaboratorOutcome<Vec<i64>> = invoke_json(
        &backend,
        CallPurpose::Author,
        LlmRequest { messages: vec![Message::user("x")], ..Default::default() },
    )
    .await;
    assert!(matches!(outcome, CollaboratorOutcome::Unavailable(_)));
}
