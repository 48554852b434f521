//! HTTP gateway to an OpenAI-compatible chat completions API.
//!
//! The gateway never returns an error for a failed call. Transport, status
//! and decoding failures are turned into a diagnostic [`ReplyPayload`] with
//! `transport_error` set, and the caller decides what that means.

use crate::config::LlmConfig;
use crate::error::{BatchError, Result};
use crate::record::ReplyPayload;
use async_trait::async_trait;
use reqwest::{Client, header};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Content used when a successful response carries no message.
pub const NO_RESPONSE: &str = "no response";

/// Something that turns a prompt into a model reply.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Send one prompt. Always resolves; failures are encoded in the payload.
    async fn call(&self, prompt: &str) -> ReplyPayload;

    /// Model name recorded on processed items.
    fn model(&self) -> &str;
}

/// HTTP client for a chat completions endpoint.
#[derive(Debug, Clone)]
pub struct LlmClient {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmClient {
    /// Create a new client from the LLM configuration.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .default_headers(headers)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(BatchError::HttpClient)?;

        Ok(Self {
            client,
            url: config.completions_url(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Build the chat completion request body for a prompt.
    pub fn build_body(&self, prompt: &str) -> Value {
        serde_json::json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": prompt
            }],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens
        })
    }

    /// Send a single request.
    async fn send_once(&self, prompt: &str) -> std::result::Result<String, String> {
        let mut request = self.client.post(&self.url).json(&self.build_body(prompt));

        if !self.api_key.is_empty() {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", self.api_key));
        }

        trace!(url = %self.url, "Sending request");

        let response = request
            .send()
            .await
            .map_err(|e| format!("Error: request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!(
                "Error: API request failed: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            )
            .trim_end()
            .to_string());
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| format!("Error: failed to parse response: {}", e))?;

        Ok(message_content(&body).unwrap_or(NO_RESPONSE).to_string())
    }
}

#[async_trait]
impl LlmGateway for LlmClient {
    async fn call(&self, prompt: &str) -> ReplyPayload {
        let start = Instant::now();
        let outcome = self.send_once(prompt).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(content) => ReplyPayload::success(prompt, content, duration_ms),
            Err(message) => {
                warn!(url = %self.url, error = %message, "LLM call failed");
                ReplyPayload::failure(prompt, message, duration_ms)
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// `choices[0].message.content`, when present and non-empty.
fn message_content(body: &Value) -> Option<&str> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}
