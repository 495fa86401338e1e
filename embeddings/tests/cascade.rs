//! Orchestrators driving the real HTTP adapters against mock servers.

use std::sync::Arc;
use std::time::Duration;

use medrag_embeddings::{
    EmbeddingOrchestrator, EmbeddingServerProvider, HostedInferenceProvider,
    VoiceEmbeddingOrchestrator,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "m1";

fn row(seed: f32) -> Vec<f32> {
    (0..8).map(|i| seed + i as f32 * 0.125).collect()
}

async fn hosted_server(seed: f32) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/{MODEL}")))
        .and(header("Authorization", "Bearer hf-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(row(seed))))
        .mount(&server)
        .await;
    server
}

fn hosted(mock: &MockServer) -> Arc<HostedInferenceProvider> {
    Arc::new(
        HostedInferenceProvider::new()
            .with_api_key("hf-key")
            .with_base_url(mock.uri()),
    )
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn test_server_batch_is_cached() {
    let embed_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "embeddings": [row(1.0), row(2.0)]
        })))
        .expect(1)
        .mount(&embed_server)
        .await;
    let hosted_mock = hosted_server(9.0).await;

    let orchestrator = EmbeddingOrchestrator::new(
        Arc::new(EmbeddingServerProvider::new(format!("{}/embed", embed_server.uri()))),
        hosted(&hosted_mock),
        16,
    );

    let first = orchestrator
        .embed_with_fallback(&texts(&["hello world", "second"]), MODEL)
        .await
        .unwrap();
    let again = orchestrator
        .embed_with_fallback(&texts(&["second", "hello world"]), MODEL)
        .await
        .unwrap();

    assert_eq!(first, vec![row(1.0), row(2.0)]);
    assert_eq!(again, vec![row(2.0), row(1.0)]);
}

#[tokio::test]
async fn test_server_error_falls_through_to_hosted() {
    let embed_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&embed_server)
        .await;
    let hosted_mock = hosted_server(4.0).await;

    let orchestrator = EmbeddingOrchestrator::new(
        Arc::new(EmbeddingServerProvider::new(format!("{}/embed", embed_server.uri()))),
        hosted(&hosted_mock),
        16,
    )
    .with_local_model_allowed(false);

    let vectors = orchestrator
        .embed_with_fallback(&texts(&["a", "b"]), MODEL)
        .await
        .unwrap();

    assert_eq!(vectors, vec![row(4.0), row(4.0)]);
}

#[tokio::test]
async fn test_missing_hosted_key_is_the_final_error() {
    let embed_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "model not loaded"
        })))
        .mount(&embed_server)
        .await;

    let orchestrator = EmbeddingOrchestrator::new(
        Arc::new(EmbeddingServerProvider::new(embed_server.uri())),
        Arc::new(HostedInferenceProvider::new().with_api_key_opt(None)),
        16,
    );

    let err = orchestrator.embed_one("x", MODEL).await.unwrap_err();

    assert!(matches!(
        err,
        medrag_embeddings::EmbeddingError::ProviderNotConfigured(_)
    ));
}

#[tokio::test]
async fn test_voice_deadline_cuts_over_to_hosted() {
    let embed_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_json(json!({ "success": true, "embeddings": [row(1.0)] })),
        )
        .mount(&embed_server)
        .await;
    let hosted_mock = hosted_server(6.0).await;

    let voice = VoiceEmbeddingOrchestrator::new(
        Arc::new(EmbeddingServerProvider::new(embed_server.uri())),
        hosted(&hosted_mock),
        8,
        Duration::from_millis(200),
    );

    let vectors = voice
        .embed_for_voice(&texts(&["what is my a1c", "blood pressure"]), MODEL)
        .await
        .unwrap();

    assert_eq!(vectors, vec![row(6.0), row(6.0)]);
    let requests = hosted_mock.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 2);
}
