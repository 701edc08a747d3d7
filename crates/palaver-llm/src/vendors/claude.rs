//! Anthropic Claude adapter.
//!
//! The Messages API differs from the OpenAI shape in three ways this
//! adapter has to bridge: the system prompt is a top-level field rather
//! than a message role, `max_tokens` is mandatory, and auth rides in an
//! `x-api-key` header plus a pinned `anthropic-version`.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::adapter::{RawEvent, VendorAdapter};
use crate::config::ServiceConfig;
use crate::error::{AdapterError, Result};
use crate::http;
use crate::sse::{LineBuffer, SseLine, parse_sse_line};
use crate::types::{ChatMessage, ChatResult, ModelDescriptor, Role, TokenUsage};
use crate::vendor::VendorId;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Applied when the caller leaves `max_output_tokens` unset, since the
/// Messages API refuses requests without one.
const DEFAULT_MAX_TOKENS: u32 = 1024;

pub struct ClaudeAdapter {
    http: reqwest::Client,
}

impl ClaudeAdapter {
    pub(crate) fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn request_builder(&self, url: &str, config: &ServiceConfig) -> reqwest::RequestBuilder {
        self.http
            .post(url)
            .header("x-api-key", &config.credential)
            .header("anthropic-version", ANTHROPIC_VERSION)
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// Split the history into the top-level system field and the alternating
/// user/assistant turns. The first system message becomes the system
/// prompt; any later ones are dropped with a warning since the wire format
/// has no place for them.
fn partition_system(messages: &[ChatMessage]) -> (Option<&str>, Vec<WireMessage<'_>>) {
    let mut system = None;
    let mut turns = Vec::with_capacity(messages.len());

    for message in messages {
        match message.role {
            Role::System => {
                if system.is_none() {
                    system = Some(message.content.as_str());
                } else {
                    warn!("dropping extra system message; the first one is already in use");
                }
            }
            Role::User => turns.push(WireMessage {
                role: "user",
                content: &message.content,
            }),
            Role::Assistant => turns.push(WireMessage {
                role: "assistant",
                content: &message.content,
            }),
        }
    }

    (system, turns)
}

fn build_request<'a>(
    messages: &'a [ChatMessage],
    config: &'a ServiceConfig,
    stream: bool,
) -> MessagesRequest<'a> {
    if config.frequency_penalty.is_some() || config.presence_penalty.is_some() {
        warn!("the messages API has no penalty parameters; ignoring the configured ones");
    }
    let (system, turns) = partition_system(messages);
    MessagesRequest {
        model: &config.model,
        max_tokens: config.max_output_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        messages: turns,
        system,
        temperature: config.temperature,
        top_p: config.top_p,
        stop_sequences: config.stop_sequences.as_deref(),
        stream: if stream { Some(true) } else { None },
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl From<WireUsage> for TokenUsage {
    fn from(u: WireUsage) -> Self {
        TokenUsage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        }
    }
}

/// One streaming event, keyed by its `type` field. Unknown event kinds
/// (pings, block boundaries, usage deltas) deserialize with empty deltas
/// and are skipped.
#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<EventDelta>,
    #[serde(default)]
    error: Option<EventError>,
}

#[derive(Debug, Deserialize)]
struct EventDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventError {
    #[serde(default)]
    message: String,
}

#[async_trait]
impl VendorAdapter for ClaudeAdapter {
    fn vendor(&self) -> VendorId {
        VendorId::Claude
    }

    async fn chat(&self, messages: &[ChatMessage], config: &ServiceConfig) -> Result<ChatResult> {
        let url = format!("{}/messages", config.base_url());
        let request = build_request(messages, config, false);

        debug!(
            vendor = %self.vendor(),
            model = %config.model,
            messages = messages.len(),
            "sending messages request"
        );

        let response =
            http::send_retrying(self.vendor(), self.request_builder(&url, config).json(&request))
                .await?;

        let body: MessagesResponse =
            response
                .json()
                .await
                .map_err(|e| AdapterError::InvalidResponse {
                    vendor: self.vendor(),
                    message: format!("failed to parse messages response: {e}"),
                })?;

        let text: String = body
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();
        if text.is_empty() {
            return Err(AdapterError::InvalidResponse {
                vendor: self.vendor(),
                message: "response contained no text content blocks".into(),
            });
        }

        Ok(ChatResult {
            text,
            vendor: self.vendor(),
            model: config.model.clone(),
            usage: body.usage.map(TokenUsage::from),
            response_handle: None,
        })
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        config: &ServiceConfig,
        tx: mpsc::Sender<RawEvent>,
    ) -> Result<()> {
        let url = format!("{}/messages", config.base_url());
        let request = build_request(messages, config, true);

        let response = http::send_retrying(
            self.vendor(),
            self.request_builder(&url, config)
                .header("Accept", "text/event-stream")
                .json(&request),
        )
        .await?;

        let mut byte_stream = response.bytes_stream();
        let mut buffer = LineBuffer::new();

        while let Some(chunk) = byte_stream.next().await {
            let bytes = chunk.map_err(|e| AdapterError::Upstream {
                vendor: self.vendor(),
                status: None,
                message: format!("stream read error: {e}"),
            })?;
            buffer.push(&bytes);

            while let Some(line) = buffer.next_line() {
                let SseLine::Data(payload) = parse_sse_line(&line) else {
                    continue;
                };
                let event: StreamEvent = match serde_json::from_str(payload) {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(vendor = %self.vendor(), error = %err, "skipping unparseable SSE event");
                        continue;
                    }
                };

                match event.kind.as_str() {
                    "content_block_delta" => {
                        if let Some(text) = event.delta.and_then(|d| d.text)
                            && !text.is_empty()
                            && tx.send(RawEvent::Delta(text)).await.is_err()
                        {
                            debug!(vendor = %self.vendor(), "stream receiver dropped, stopping");
                            return Ok(());
                        }
                    }
                    "message_stop" => {
                        let _ = tx.send(RawEvent::Done).await;
                        return Ok(());
                    }
                    "error" => {
                        let message = event
                            .error
                            .map(|e| e.message)
                            .unwrap_or_else(|| "unnamed stream error".into());
                        return Err(AdapterError::Upstream {
                            vendor: self.vendor(),
                            status: None,
                            message,
                        });
                    }
                    // message_start, content_block_start/stop, message_delta,
                    // ping: nothing to forward.
                    _ => {}
                }
            }
        }

        Ok(())
    }

    async fn list_models(&self, config: &ServiceConfig) -> Result<Vec<ModelDescriptor>> {
        #[derive(Debug, Deserialize)]
        struct ModelList {
            #[serde(default)]
            data: Vec<ModelEntry>,
        }
        #[derive(Debug, Deserialize)]
        struct ModelEntry {
            id: String,
            #[serde(default)]
            display_name: Option<String>,
        }

        let url = format!("{}/models", config.base_url());
        let response = http::send_retrying(
            self.vendor(),
            self.http
                .get(&url)
                .header("x-api-key", &config.credential)
                .header("anthropic-version", ANTHROPIC_VERSION),
        )
        .await?;

        let body: ModelList = response
            .json()
            .await
            .map_err(|e| AdapterError::InvalidResponse {
                vendor: self.vendor(),
                message: format!("failed to parse model list: {e}"),
            })?;

        Ok(body
            .data
            .into_iter()
            .map(|m| {
                let display = m.display_name.unwrap_or_else(|| m.id.clone());
                ModelDescriptor::new(m.id, display)
            })
            .collect())
    }
}
