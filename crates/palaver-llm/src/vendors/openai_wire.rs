//! The OpenAI chat-completions wire format.
//!
//! Shared by the [`OpenAiAdapter`](super::OpenAiAdapter),
//! [`GrokAdapter`](super::GrokAdapter) and [`QwenAdapter`](super::QwenAdapter):
//! all three speak this request/response/SSE dialect against different base
//! URLs. Unset optional parameters are omitted from the request so the
//! vendor's own defaults apply.

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::adapter::RawEvent;
use crate::config::ServiceConfig;
use crate::error::{AdapterError, Result};
use crate::http;
use crate::sse::{DONE_SENTINEL, LineBuffer, SseLine, parse_sse_line};
use crate::types::{ChatMessage, ChatResult, ModelDescriptor, Role, TokenUsage};
use crate::vendor::VendorId;

pub(crate) fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct WireMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

/// A chat completion request body. Every optional field is skipped when
/// unset rather than sent with a guessed default.
#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// Build a request from the abstract history and config. `include_temperature`
/// exists for the documented retry-without-temperature path.
pub(crate) fn build_request<'a>(
    messages: &'a [ChatMessage],
    config: &'a ServiceConfig,
    stream: bool,
    include_temperature: bool,
) -> ChatCompletionRequest<'a> {
    ChatCompletionRequest {
        model: &config.model,
        messages: messages
            .iter()
            .map(|m| WireMessage {
                role: role_name(m.role),
                content: &m.content,
            })
            .collect(),
        temperature: if include_temperature {
            config.temperature
        } else {
            None
        },
        top_p: config.top_p,
        max_tokens: config.max_output_tokens,
        frequency_penalty: config.frequency_penalty,
        presence_penalty: config.presence_penalty,
        stop: config.stop_sequences.as_deref(),
        stream: if stream { Some(true) } else { None },
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl From<WireUsage> for TokenUsage {
    fn from(u: WireUsage) -> Self {
        TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

/// Normalize a parsed completion into a [`ChatResult`], rejecting bodies
/// with no usable completion content.
pub(crate) fn into_chat_result(
    body: ChatCompletion,
    vendor: VendorId,
    model: &str,
) -> Result<ChatResult> {
    let usage = body.usage.map(TokenUsage::from);
    let content = body
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| AdapterError::InvalidResponse {
            vendor,
            message: "response contained no completion content".into(),
        })?;

    Ok(ChatResult {
        text: content,
        vendor,
        model: model.to_string(),
        usage,
        response_handle: None,
    })
}

/// Perform one unary chat-completions call.
pub(crate) async fn chat(
    client: &reqwest::Client,
    vendor: VendorId,
    messages: &[ChatMessage],
    config: &ServiceConfig,
    include_temperature: bool,
) -> Result<ChatResult> {
    let url = format!("{}/chat/completions", config.base_url());
    let request = build_request(messages, config, false, include_temperature);

    debug!(
        vendor = %vendor,
        model = %config.model,
        messages = messages.len(),
        "sending chat completion request"
    );

    let response = http::send_retrying(
        vendor,
        client
            .post(&url)
            .bearer_auth(&config.credential)
            .json(&request),
    )
    .await?;

    let body: ChatCompletion =
        response
            .json()
            .await
            .map_err(|e| AdapterError::InvalidResponse {
                vendor,
                message: format!("failed to parse completion: {e}"),
            })?;

    into_chat_result(body, vendor, &config.model)
}

// ── Streaming ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    choices: Vec<DeltaChoice>,
}

#[derive(Debug, Deserialize)]
struct DeltaChoice {
    #[serde(default)]
    delta: DeltaContent,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DeltaContent {
    #[serde(default)]
    content: Option<String>,
}

/// Parse one SSE data payload into `(text delta, finished)`.
pub(crate) fn parse_stream_payload(
    vendor: VendorId,
    payload: &str,
) -> Result<(Option<String>, bool)> {
    if payload == DONE_SENTINEL {
        return Ok((None, true));
    }

    let delta: StreamDelta =
        serde_json::from_str(payload).map_err(|e| AdapterError::InvalidResponse {
            vendor,
            message: format!("failed to parse SSE delta: {e}"),
        })?;

    match delta.choices.into_iter().next() {
        Some(choice) => Ok((choice.delta.content, choice.finish_reason.is_some())),
        None => Ok((None, false)),
    }
}

/// Open the SSE transport and forward one [`RawEvent`] per vendor delta.
pub(crate) async fn stream_chat(
    client: &reqwest::Client,
    vendor: VendorId,
    messages: &[ChatMessage],
    config: &ServiceConfig,
    tx: &mpsc::Sender<RawEvent>,
    include_temperature: bool,
) -> Result<()> {
    let url = format!("{}/chat/completions", config.base_url());
    let request = build_request(messages, config, true, include_temperature);

    debug!(
        vendor = %vendor,
        model = %config.model,
        messages = messages.len(),
        "sending streaming chat completion request"
    );

    let response = http::send_retrying(
        vendor,
        client
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
            vendor,
            status: None,
            message: format!("stream read error: {e}"),
        })?;
        buffer.push(&bytes);

        while let Some(line) = buffer.next_line() {
            if forward_line(vendor, &line, tx).await? {
                return Ok(());
            }
        }
    }

    if let Some(rest) = buffer.take_rest() {
        let _ = forward_line(vendor, &rest, tx).await?;
    }

    Ok(())
}

/// Handle one SSE line. Returns `true` once the stream is finished (done
/// event seen, or the receiver was dropped).
async fn forward_line(vendor: VendorId, line: &str, tx: &mpsc::Sender<RawEvent>) -> Result<bool> {
    let SseLine::Data(payload) = parse_sse_line(line) else {
        return Ok(false);
    };
    if payload.is_empty() {
        return Ok(false);
    }

    let (text, finished) = match parse_stream_payload(vendor, payload) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(vendor = %vendor, error = %err, "skipping unparseable SSE line");
            return Ok(false);
        }
    };

    if let Some(text) = text
        && !text.is_empty()
        && tx.send(RawEvent::Delta(text)).await.is_err()
    {
        debug!(vendor = %vendor, "stream receiver dropped, stopping");
        return Ok(true);
    }

    if finished {
        let _ = tx.send(RawEvent::Done).await;
        return Ok(true);
    }

    Ok(false)
}

// ── Model discovery ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// List models from a `/models` endpoint, keeping only ids accepted by the
/// vendor's family filter.
pub(crate) async fn list_models(
    client: &reqwest::Client,
    vendor: VendorId,
    config: &ServiceConfig,
    keep: fn(&str) -> bool,
) -> Result<Vec<ModelDescriptor>> {
    let url = format!("{}/models", config.base_url());
    let response =
        http::send_retrying(vendor, client.get(&url).bearer_auth(&config.credential)).await?;

    let body: ModelList = response
        .json()
        .await
        .map_err(|e| AdapterError::InvalidResponse {
            vendor,
            message: format!("failed to parse model list: {e}"),
        })?;

    Ok(body
        .data
        .into_iter()
        .filter(|m| keep(&m.id))
        .map(|m| ModelDescriptor::new(m.id.clone(), m.id))
        .collect())
}
