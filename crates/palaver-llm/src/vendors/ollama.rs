//! Ollama adapter for local models.
//!
//! No credential: the daemon is assumed to sit on a trusted local network.
//! The `/api/chat` endpoint streams newline-delimited JSON records rather
//! than SSE, with a `done: true` record closing the stream. Sampling
//! parameters nest under `options` with Ollama's own names (`num_predict`
//! for the output token cap). Model discovery reads the local tag list.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::adapter::{RawEvent, VendorAdapter};
use crate::config::ServiceConfig;
use crate::error::{AdapterError, Result};
use crate::http;
use crate::sse::LineBuffer;
use crate::types::{ChatMessage, ChatResult, ModelDescriptor, TokenUsage};
use crate::vendor::VendorId;

use super::openai_wire::role_name;

pub struct OllamaAdapter {
    http: reqwest::Client,
}

impl OllamaAdapter {
    pub(crate) fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct Options {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

impl Options {
    fn from_config(config: &ServiceConfig) -> Option<Self> {
        if config.temperature.is_none()
            && config.top_p.is_none()
            && config.max_output_tokens.is_none()
            && config.stop_sequences.is_none()
        {
            return None;
        }
        Some(Self {
            temperature: config.temperature,
            top_p: config.top_p,
            num_predict: config.max_output_tokens,
            stop: config.stop_sequences.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<Options>,
}

fn build_request<'a>(
    messages: &'a [ChatMessage],
    config: &'a ServiceConfig,
    stream: bool,
) -> ChatRequest<'a> {
    ChatRequest {
        model: &config.model,
        messages: messages
            .iter()
            .map(|m| WireMessage {
                role: role_name(m.role),
                content: &m.content,
            })
            .collect(),
        stream,
        options: Options::from_config(config),
    }
}

/// One `/api/chat` record. Unary responses and stream records share this
/// shape; the eval counts only appear on the final (`done: true`) record.
#[derive(Debug, Deserialize)]
struct ChatRecord {
    #[serde(default)]
    message: Option<RecordMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RecordMessage {
    #[serde(default)]
    content: String,
}

fn usage_from_record(record: &ChatRecord) -> Option<TokenUsage> {
    match (record.prompt_eval_count, record.eval_count) {
        (None, None) => None,
        (prompt, eval) => {
            let prompt = prompt.unwrap_or(0);
            let eval = eval.unwrap_or(0);
            Some(TokenUsage {
                prompt_tokens: prompt,
                completion_tokens: eval,
                total_tokens: prompt + eval,
            })
        }
    }
}

#[async_trait]
impl VendorAdapter for OllamaAdapter {
    fn vendor(&self) -> VendorId {
        VendorId::Ollama
    }

    async fn chat(&self, messages: &[ChatMessage], config: &ServiceConfig) -> Result<ChatResult> {
        let url = format!("{}/api/chat", config.base_url());
        let request = build_request(messages, config, false);

        debug!(
            vendor = %self.vendor(),
            model = %config.model,
            messages = messages.len(),
            "sending local chat request"
        );

        let response =
            http::send_retrying(self.vendor(), self.http.post(&url).json(&request)).await?;

        let record: ChatRecord =
            response
                .json()
                .await
                .map_err(|e| AdapterError::InvalidResponse {
                    vendor: self.vendor(),
                    message: format!("failed to parse chat response: {e}"),
                })?;

        let usage = usage_from_record(&record);
        let text = record
            .message
            .map(|m| m.content)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AdapterError::InvalidResponse {
                vendor: self.vendor(),
                message: "response contained no message content".into(),
            })?;

        Ok(ChatResult {
            text,
            vendor: self.vendor(),
            model: config.model.clone(),
            usage,
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
        let url = format!("{}/api/chat", config.base_url());
        let request = build_request(messages, config, true);

        let response =
            http::send_retrying(self.vendor(), self.http.post(&url).json(&request)).await?;

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
                if line.trim().is_empty() {
                    continue;
                }
                let record: ChatRecord = match serde_json::from_str(&line) {
                    Ok(record) => record,
                    Err(err) => {
                        warn!(vendor = %self.vendor(), error = %err, "skipping unparseable stream record");
                        continue;
                    }
                };

                if let Some(message) = record.message
                    && !message.content.is_empty()
                    && tx.send(RawEvent::Delta(message.content)).await.is_err()
                {
                    debug!(vendor = %self.vendor(), "stream receiver dropped, stopping");
                    return Ok(());
                }

                if record.done {
                    let _ = tx.send(RawEvent::Done).await;
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    async fn list_models(&self, config: &ServiceConfig) -> Result<Vec<ModelDescriptor>> {
        #[derive(Debug, Deserialize)]
        struct TagList {
            #[serde(default)]
            models: Vec<Tag>,
        }
        #[derive(Debug, Deserialize)]
        struct Tag {
            name: String,
        }

        let url = format!("{}/api/tags", config.base_url());
        let response = http::send_retrying(self.vendor(), self.http.get(&url)).await?;

        let body: TagList = response
            .json()
            .await
            .map_err(|e| AdapterError::InvalidResponse {
                vendor: self.vendor(),
                message: format!("failed to parse tag list: {e}"),
            })?;

        Ok(body
            .models
            .into_iter()
            .map(|t| ModelDescriptor::new(t.name.clone(), t.name))
            .collect())
    }
}
