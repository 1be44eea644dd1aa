//! Chat-completions client for the hosted VLM API.
//!
//! Features:
//! - Token-bucket rate limiting via [`governor`].
//! - Automatic retry on HTTP 429 with `Retry-After` header support.
//! - Streamed (SSE) and batched response collection.

use std::num::NonZeroU32;
use std::time::Duration;

use futures::StreamExt;
use governor::{Quota, RateLimiter};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::VlmConfig;
use crate::error::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_RETRIES: u32 = 3;

// ---------------------------------------------------------------------------
// Message model
// ---------------------------------------------------------------------------

/// One chat message. Content is either a plain string (as conversation
/// history arrives from the frontend) or interleaved text/image parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

impl Message {
    /// A user message with a text prompt followed by image data URLs.
    pub fn user_with_images(prompt: impl Into<String>, image_data_urls: Vec<String>) -> Self {
        let mut parts = vec![ContentPart::Text {
            text: prompt.into(),
        }];
        parts.extend(image_data_urls.into_iter().map(|url| ContentPart::ImageUrl {
            image_url: ImageUrl { url },
        }));
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(parts),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Chat-completions client for a hosted multimodal inference endpoint.
pub struct VlmClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f64,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl VlmClient {
    pub fn new(config: &VlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                reqwest::Client::new()
            });

        let rps = NonZeroU32::new(config.requests_per_second.max(1)).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rps));

        Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            rate_limiter,
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Batched chat completion. Returns the first choice's message content.
    pub async fn complete(&self, model: &str, messages: &[Message]) -> Result<String> {
        let resp = self.send(model, messages, false).await?;

        let body: ChatResponse = resp.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        debug!(chars = content.len(), "VLM batched response collected");
        Ok(content)
    }

    /// Streamed chat completion. Concatenates the delta content of every SSE
    /// chunk until the `[DONE]` sentinel.
    pub async fn complete_streaming(&self, model: &str, messages: &[Message]) -> Result<String> {
        let resp = self.send(model, messages, true).await?;

        let mut stream = resp.bytes_stream();
        let mut buffer = String::new();
        let mut collected = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // SSE events are newline-delimited; anything after the last
            // newline may be a partial line, keep it buffered.
            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim_end_matches('\r').to_string();
                buffer.drain(..=pos);

                if let Some(delta) = parse_sse_line(&line) {
                    collected.push_str(&delta);
                }
            }
        }

        if let Some(delta) = parse_sse_line(buffer.trim_end()) {
            collected.push_str(&delta);
        }

        debug!(chars = collected.len(), "VLM streamed response collected");
        Ok(collected)
    }

    /// Send the chat request with rate limiting and 429-retry logic.
    async fn send(
        &self,
        model: &str,
        messages: &[Message],
        stream: bool,
    ) -> Result<reqwest::Response> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Auth("VLM API key not configured".to_string()))?;

        let request = ChatRequest {
            model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream,
        };

        let url = format!("{}/chat/completions", self.api_url);
        let mut retries = 0u32;
        loop {
            self.rate_limiter.until_ready().await;

            debug!(%model, stream, messages = messages.len(), "VLM request");
            let resp = self
                .client
                .post(&url)
                .bearer_auth(api_key)
                .json(&request)
                .send()
                .await?;

            if resp.status() == StatusCode::TOO_MANY_REQUESTS && retries < MAX_RETRIES {
                retries += 1;
                let wait = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(1);
                warn!(
                    retry = retries,
                    wait_secs = wait,
                    "VLM API returned 429, backing off"
                );
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(Error::Upstream(format!(
                    "VLM API returned {}: {}",
                    status,
                    body.chars().take(200).collect::<String>()
                )));
            }

            return Ok(resp);
        }
    }
}

/// Extract the delta content from one SSE line, if it carries any.
fn parse_sse_line(line: &str) -> Option<String> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content),
        Err(e) => {
            warn!(error = %e, "skipping malformed SSE chunk");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sse_content_line() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#;
        assert_eq!(parse_sse_line(line), Some("Hello".to_string()));
    }

    #[test]
    fn parse_sse_done_sentinel() {
        assert_eq!(parse_sse_line("data: [DONE]"), None);
    }

    #[test]
    fn parse_sse_ignores_non_data_lines() {
        assert_eq!(parse_sse_line(""), None);
        assert_eq!(parse_sse_line("event: ping"), None);
        assert_eq!(parse_sse_line(": comment"), None);
    }

    #[test]
    fn parse_sse_empty_delta() {
        let line = r#"data: {"choices":[{"delta":{}}]}"#;
        assert_eq!(parse_sse_line(line), None);
    }

    #[test]
    fn parse_sse_malformed_json() {
        assert_eq!(parse_sse_line("data: {not json"), None);
    }

    #[test]
    fn message_content_serialization() {
        let msg = Message::user_with_images("what is this?", vec!["data:image/jpeg;base64,eA==".to_string()]);
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["role"], "user");
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "what is this?");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(
            json["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,eA=="
        );
    }

    #[test]
    fn plain_string_history_deserializes() {
        let json = r#"{"role":"assistant","content":"Previous answer"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(matches!(msg.content, MessageContent::Text(ref s) if s == "Previous answer"));
    }

    #[test]
    fn stream_flag_omitted_when_false() {
        let request = ChatRequest {
            model: "m",
            messages: &[],
            max_tokens: 10,
            temperature: 0.5,
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("stream").is_none());
    }
}
