//! Test doubles shared by unit tests.

use crate::client::LlmGateway;
use crate::record::{Record, ReplyPayload};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Gateway that echoes the prompt back inside a result section.
#[derive(Debug, Default)]
pub struct MockGateway {
    failing: Vec<String>,
    latency: HashMap<String, Duration>,
    prompts: Mutex<Vec<String>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prompts containing any of `markers` get a transport failure.
    pub fn failing(mut self, markers: &[&str]) -> Self {
        self.failing.extend(markers.iter().map(|m| m.to_string()));
        self
    }

    /// Prompts containing `marker` take `delay` to answer.
    pub fn with_latency(mut self, marker: &str, delay: Duration) -> Self {
        self.latency.insert(marker.to_string(), delay);
        self
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmGateway for MockGateway {
    async fn call(&self, prompt: &str) -> ReplyPayload {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let delay = self
            .latency
            .iter()
            .find(|(marker, _)| prompt.contains(marker.as_str()))
            .map(|(_, d)| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.iter().any(|m| prompt.contains(m.as_str())) {
            return ReplyPayload::failure(prompt, "Error: mock transport failure", 0);
        }

        let body = json!({ "echo": prompt }).to_string();
        ReplyPayload::success(prompt, format!("Sure.\n<result>{body}</result>"), 1)
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}

/// `n` records titled `t0`, `t1`, ...
pub fn records(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| {
            json!({ "title": format!("t{i}"), "url": format!("http://example.com/{i}") })
                .as_object()
                .cloned()
                .unwrap_or_default()
        })
        .collect()
}
