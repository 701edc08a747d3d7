//! OpenAI Responses adapter (the stateful successor to chat completions).
//!
//! Same host and bearer auth as the classic adapter, different contract:
//! the server can persist each response (`store`) and a later call can
//! chain onto it via `previous_response_id` instead of resending the whole
//! history. Both knobs ride in the config extensions
//! ([`EXT_PREVIOUS_RESPONSE`], [`EXT_STORE`]); the returned response id
//! comes back as the [`ChatResult::response_handle`].

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::adapter::{RawEvent, VendorAdapter};
use crate::config::{EXT_PREVIOUS_RESPONSE, EXT_STORE, ServiceConfig};
use crate::error::{AdapterError, Result};
use crate::http;
use crate::sse::{LineBuffer, SseLine, parse_sse_line};
use crate::types::{ChatMessage, ChatResult, ModelDescriptor, Role, TokenUsage};
use crate::vendor::VendorId;

use super::openai_wire;

pub struct OpenAiResponsesAdapter {
    http: reqwest::Client,
}

impl OpenAiResponsesAdapter {
    pub(crate) fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[derive(Debug, Serialize)]
struct InputItem<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: Vec<InputItem<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_response_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    store: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// Build the request input. On a fresh thread the whole history goes up;
/// when chaining onto a stored response the server already holds the
/// earlier turns, so only the messages after the last assistant turn are
/// sent. System messages become the `instructions` field either way.
fn build_request<'a>(
    messages: &'a [ChatMessage],
    config: &'a ServiceConfig,
    stream: bool,
) -> ResponsesRequest<'a> {
    let previous = config.extension_str(EXT_PREVIOUS_RESPONSE);

    let instructions: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();

    let turns: &[ChatMessage] = if previous.is_some() {
        let last_assistant = messages
            .iter()
            .rposition(|m| m.role == Role::Assistant)
            .map(|i| i + 1)
            .unwrap_or(0);
        &messages[last_assistant..]
    } else {
        messages
    };

    let input = turns
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| InputItem {
            role: openai_wire::role_name(m.role),
            content: &m.content,
        })
        .collect();

    ResponsesRequest {
        model: &config.model,
        input,
        instructions: if instructions.is_empty() {
            None
        } else {
            Some(instructions.join("\n\n"))
        },
        previous_response_id: previous,
        store: config.extension_flag(EXT_STORE),
        temperature: config.temperature,
        top_p: config.top_p,
        max_output_tokens: config.max_output_tokens,
        stream: if stream { Some(true) } else { None },
    }
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
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
    #[serde(default)]
    total_tokens: u32,
}

impl From<WireUsage> for TokenUsage {
    fn from(u: WireUsage) -> Self {
        TokenUsage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

fn output_text(body: &ResponseBody) -> String {
    body.output
        .iter()
        .filter(|item| item.kind == "message")
        .flat_map(|item| item.content.iter())
        .filter(|content| content.kind == "output_text")
        .map(|content| content.text.as_str())
        .collect()
}

/// One streaming event, keyed by `type`.
#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[async_trait]
impl VendorAdapter for OpenAiResponsesAdapter {
    fn vendor(&self) -> VendorId {
        VendorId::OpenAiResponses
    }

    async fn chat(&self, messages: &[ChatMessage], config: &ServiceConfig) -> Result<ChatResult> {
        let url = format!("{}/responses", config.base_url());
        let request = build_request(messages, config, false);

        debug!(
            vendor = %self.vendor(),
            model = %config.model,
            chained = request.previous_response_id.is_some(),
            "sending responses request"
        );

        let response = http::send_retrying(
            self.vendor(),
            self.http
                .post(&url)
                .bearer_auth(&config.credential)
                .json(&request),
        )
        .await?;

        let body: ResponseBody =
            response
                .json()
                .await
                .map_err(|e| AdapterError::InvalidResponse {
                    vendor: self.vendor(),
                    message: format!("failed to parse response: {e}"),
                })?;

        let text = output_text(&body);
        if text.is_empty() {
            return Err(AdapterError::InvalidResponse {
                vendor: self.vendor(),
                message: "response contained no output text".into(),
            });
        }

        Ok(ChatResult {
            text,
            vendor: self.vendor(),
            model: config.model.clone(),
            usage: body.usage.map(TokenUsage::from),
            response_handle: body.id,
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
        let url = format!("{}/responses", config.base_url());
        let request = build_request(messages, config, true);

        let response = http::send_retrying(
            self.vendor(),
            self.http
                .post(&url)
                .bearer_auth(&config.credential)
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
                    "response.output_text.delta" => {
                        if let Some(text) = event.delta
                            && !text.is_empty()
                            && tx.send(RawEvent::Delta(text)).await.is_err()
                        {
                            debug!(vendor = %self.vendor(), "stream receiver dropped, stopping");
                            return Ok(());
                        }
                    }
                    "response.completed" => {
                        let _ = tx.send(RawEvent::Done).await;
                        return Ok(());
                    }
                    "response.failed" | "error" => {
                        return Err(AdapterError::Upstream {
                            vendor: self.vendor(),
                            status: None,
                            message: event
                                .message
                                .unwrap_or_else(|| "response stream failed".into()),
                        });
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }

    async fn list_models(&self, config: &ServiceConfig) -> Result<Vec<ModelDescriptor>> {
        // Same /models catalogue as the classic endpoint; responses-capable
        // models are the same chat families.
        openai_wire::list_models(&self.http, self.vendor(), config, |id| {
            (id.starts_with("gpt-") || id.starts_with("o1") || id.starts_with("o3"))
                && !id.contains("embedding")
                && !id.contains("audio")
                && !id.contains("realtime")
        })
        .await
    }
}
