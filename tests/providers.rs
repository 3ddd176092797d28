use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use docqa::config::{EmbeddingSettings, HttpSettings, LlmSettings};
use docqa::embedding::{Embedder, OpenAIEmbedder};
use docqa::error::QaError;
use docqa::llm::{ChatCompleter, Completer};

fn http(timeout_secs: u64, max_retries: u32) -> HttpSettings {
    HttpSettings {
        timeout_secs,
        max_retries,
    }
}

fn embedder(server: &MockServer, batch_size: usize, http: HttpSettings) -> OpenAIEmbedder {
    let settings = EmbeddingSettings {
        api_key: Some("sk-test".to_string()),
        api_base: server.uri(),
        model: "text-embedding-ada-002".to_string(),
        batch_size,
    };
    OpenAIEmbedder::new(&settings, &http).unwrap()
}

fn completer(server: &MockServer, http: HttpSettings) -> ChatCompleter {
    let settings = LlmSettings {
        api_key: Some("gsk-test".to_string()),
        api_base: server.uri(),
        model: "llama3-8b-8192".to_string(),
        max_tokens: 128,
        temperature: 0.0,
    };
    ChatCompleter::new(&settings, &http).unwrap()
}

fn chat_reply(content: &str) -> serde_json::Value {
    json!({
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
}

#[tokio::test]
async fn embeddings_are_batched_and_ordered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"input": ["a", "b"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(body_partial_json(json!({"input": ["c"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [0.5, 0.5]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let vectors = embedder(&server, 2, http(5, 0))
        .embed_texts(&["a".to_string(), "b".to_string(), "c".to_string()])
        .await
        .unwrap();

    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]]);
}

#[tokio::test]
async fn server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [0.25, 0.75]}]
        })))
        .mount(&server)
        .await;

    let vector = embedder(&server, 8, http(5, 1))
        .embed_query("hello")
        .await
        .unwrap();

    assert_eq!(vector, vec![0.25, 0.75]);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad model"))
        .mount(&server)
        .await;

    let err = embedder(&server, 8, http(5, 3))
        .embed_query("hello")
        .await
        .unwrap_err();

    assert!(matches!(err, QaError::EmbeddingProvider(ref m) if m.contains("400")));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn missing_api_key_is_rejected() {
    let settings = EmbeddingSettings {
        api_key: None,
        api_base: "http://localhost:1".to_string(),
        model: "m".to_string(),
        batch_size: 1,
    };
    let err = OpenAIEmbedder::new(&settings, &http(5, 0)).err().unwrap();
    assert!(matches!(err, QaError::EmbeddingProvider(_)));
}

#[tokio::test]
async fn completion_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer gsk-test"))
        .and(body_partial_json(json!({
            "model": "llama3-8b-8192",
            "max_tokens": 128,
            "messages": [{"role": "user", "content": "prompt text"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(" Paris. ")))
        .expect(1)
        .mount(&server)
        .await;

    let answer = completer(&server, http(5, 0))
        .complete("prompt text")
        .await
        .unwrap();
    assert_eq!(answer, "Paris.");
}

#[tokio::test]
async fn rate_limit_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("ok")))
        .mount(&server)
        .await;

    let answer = completer(&server, http(5, 2)).complete("q").await.unwrap();
    assert_eq!(answer, "ok");
}

#[tokio::test]
async fn slow_provider_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_reply("late"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let err = completer(&server, http(1, 0)).complete("q").await.unwrap_err();
    assert!(matches!(err, QaError::Timeout { secs: 1, .. }), "{:?}", err);
}

#[tokio::test]
async fn exhausted_retries_surface_last_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .mount(&server)
        .await;

    let err = completer(&server, http(5, 1)).complete("q").await.unwrap_err();
    assert!(matches!(err, QaError::LanguageModel(ref m) if m.contains("503")));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
