//! End-to-end runs against a mocked chat completions endpoint.

use llm_batch::storage;
use llm_batch::{LlmConfig, Processor, ProcessorOptions, Template};
use serde_json::{Value, json};
use std::path::Path;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    }))
}

async fn mock_server() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Broken"))
        .respond_with(ResponseTemplate::new(503))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Plain"))
        .respond_with(completion("<result>\nJust\n\ntext\n</result>"))
        .with_priority(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion("Analysis:\n<result>{\"label\": \"news\"}</result>"))
        .with_priority(3)
        .mount(&server)
        .await;

    server
}

fn write_data(dir: &Path) {
    std::fs::write(
        dir.join("a.json"),
        json!([
            {"title": "First", "url": "http://x/1"},
            {"title": "Broken", "url": "http://x/2"},
            {"title": "Plain", "url": "http://x/3"}
        ])
        .to_string(),
    )
    .unwrap();
    std::fs::write(dir.join("b.json"), json!([{"title": "Second"}]).to_string()).unwrap();
    std::fs::write(dir.join("c.json"), "{ not valid").unwrap();
}

fn config(server: &MockServer, batch_size: i64, strict: bool) -> LlmConfig {
    let mut config = LlmConfig::new("test-model", format!("{}/v1", server.uri()), "sk-test");
    config.batch_size = Some(batch_size);
    config.delay_ms = 0;
    config.count_gateway_errors_as_failures = strict;
    config
}

#[tokio::test]
async fn test_concurrent_run_with_failures_counted() {
    let server = mock_server().await;
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_data(data.path());

    let processor = Processor::new(
        &config(&server, 2, true),
        Template::new("Classify { title } ({ url })"),
        ProcessorOptions {
            output_dir: Some(out.path().to_path_buf()),
            save_individually: true,
            ..ProcessorOptions::default()
        },
    )
    .unwrap();

    let files = storage::list_collections(data.path()).await.unwrap();
    assert_eq!(files.len(), 3);
    let run = processor.process_all(&files).await;

    // c.json is malformed and skipped
    assert_eq!(run.files.len(), 2);
    assert_eq!(run.stats.total_items, 4);
    assert_eq!(run.stats.success_items, 3);
    assert_eq!(run.stats.failed_items, 1);
    assert!(run.stats.is_complete());
    // a.json: [2, 1], b.json: [1]
    assert_eq!(run.stats.batch_count(), 3);

    let titles: Vec<&str> = run
        .items
        .iter()
        .map(|i| i.original["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["First", "Plain", "Second"]);

    assert_eq!(run.items[0].reply.result_formatted.type_label(), "json");
    assert_eq!(run.items[1].reply.result, "Just\ntext");
    assert_eq!(run.items[1].reply.result_formatted.content(), &json!("Just text"));
    // unfilled placeholder is sent as written
    let requests = server.received_requests().await.unwrap();
    let prompts: Vec<String> = requests
        .iter()
        .map(|r| {
            let body: Value = serde_json::from_slice(&r.body).unwrap();
            body["messages"][0]["content"].as_str().unwrap().to_string()
        })
        .collect();
    assert!(prompts.contains(&"Classify Second ({ url })".to_string()));

    let saved: Value = serde_json::from_str(
        &std::fs::read_to_string(out.path().join("a_processed.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(saved.as_array().unwrap().len(), 2);
    assert_eq!(saved[0]["reply"]["result_formatted"]["content"]["label"], "news");
}

#[tokio::test]
async fn test_sequential_run_keeps_gateway_errors_as_replies() {
    let server = mock_server().await;
    let data = tempfile::tempdir().unwrap();
    write_data(data.path());

    let processor = Processor::new(
        &config(&server, 1, false),
        Template::new("{ title }"),
        ProcessorOptions::default(),
    )
    .unwrap();

    let run = processor
        .process_all(&[data.path().join("a.json")])
        .await;

    assert_eq!(run.stats.success_items, 3);
    assert_eq!(run.stats.failed_items, 0);
    assert!(!run.stats.is_concurrent);
    assert!(run.stats.batch_stats.is_none());

    let broken = &run.items[1].reply;
    assert!(broken.context.contains("503"));
    assert!(!broken.result_formatted.is_extracted());
    assert_eq!(broken.model, "test-model");
}
