use std::sync::Arc;

use async_trait::async_trait;
use docqa_cli::{AppState, app_router};
use docqa_rag::{
    AnswerGenerator, AnswerResponse, Document, HashingEmbeddingProvider, RagConfig, RagPipeline,
};
use serde_json::Value;

struct EchoGenerator;

#[async_trait]
impl AnswerGenerator for EchoGenerator {
    async fn generate(&self, prompt: &str) -> docqa_rag::Result<String> {
        Ok(prompt.to_string())
    }

    fn model_id(&self) -> &str {
        "echo"
    }
}

async fn spawn_server(ingest: bool) -> (String, tokio::task::JoinHandle<()>) {
    let pipeline = RagPipeline::builder()
        .config(RagConfig::builder().top_k(1).build().expect("config"))
        .embedding_provider(Arc::new(HashingEmbeddingProvider::new(384)))
        .generator(Arc::new(EchoGenerator))
        .build()
        .expect("pipeline");
    if ingest {
        pipeline
            .ingest(&[
                Document::new("sun.txt", "The sun is a star."),
                Document::new("stars.txt", "Stars emit light."),
            ])
            .await
            .expect("ingest");
    }
    let app = app_router(AppState::new(pipeline));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    (format!("http://{}", addr), handle)
}

#[tokio::test]
async fn health_reports_ok() {
    let (base, handle) = spawn_server(false).await;
    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .expect("health response")
        .json()
        .await
        .expect("health json");
    assert_eq!(body["status"], "ok");
    handle.abort();
}

#[tokio::test]
async fn answer_cites_the_matching_document() {
    let (base, handle) = spawn_server(true).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/answer", base))
        .json(&serde_json::json!({ "question": "What is the sun?" }))
        .send()
        .await
        .expect("answer response");
    assert!(response.status().is_success());

    let body: AnswerResponse = response.json().await.expect("answer json");
    assert!(body.error.is_none());
    assert_eq!(body.sources.len(), 1);
    assert_eq!(body.sources[0].source_id, "sun.txt");
    assert_eq!(body.sources[0].text, "The sun is a star.");
    assert!(body.answer.contains("Question: What is the sun?"));

    handle.abort();
}

#[tokio::test]
async fn question_without_index_is_refused() {
    let (base, handle) = spawn_server(false).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/answer", base))
        .json(&serde_json::json!({ "question": "What is the sun?" }))
        .send()
        .await
        .expect("answer response");
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

    let body: AnswerResponse = response.json().await.expect("refusal json");
    assert!(body.answer.starts_with("cannot answer: "));
    assert!(body.sources.is_empty());
    assert_eq!(body.error.as_deref(), Some("index_not_found"));

    handle.abort();
}

#[tokio::test]
async fn blank_question_is_a_bad_request() {
    let (base, handle) = spawn_server(true).await;
    let response = reqwest::Client::new()
        .post(format!("{}/api/answer", base))
        .json(&serde_json::json!({ "question": "  " }))
        .send()
        .await
        .expect("answer response");
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    handle.abort();
}

#[tokio::test]
async fn status_describes_the_loaded_index() {
    let (base, handle) = spawn_server(true).await;
    let body: Value = reqwest::get(format!("{}/api/status", base))
        .await
        .expect("status response")
        .json()
        .await
        .expect("status json");
    assert_eq!(body["state"], "ready");
    assert_eq!(body["entries"], 2);
    assert_eq!(body["embedding_model"], "hashing-bow-384");
    assert_eq!(body["compatible"], true);
    handle.abort();
}
