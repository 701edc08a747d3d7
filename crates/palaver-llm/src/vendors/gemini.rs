//! Google Gemini adapter.
//!
//! The generateContent API renames most of the shared vocabulary: roles are
//! `user`/`model`, system prompts go into `systemInstruction`, sampling
//! parameters live under a camelCase `generationConfig`, and the model id
//! is part of the URL path rather than the body. Auth is an
//! `x-goog-api-key` header.

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

pub struct GeminiAdapter {
    http: reqwest::Client,
}

impl GeminiAdapter {
    pub(crate) fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

impl GenerationConfig {
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
            max_output_tokens: config.max_output_tokens,
            stop_sequences: config.stop_sequences.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

/// System messages concatenate into `systemInstruction`; user and assistant
/// turns become `user`/`model` contents.
fn build_request(messages: &[ChatMessage], config: &ServiceConfig) -> GenerateRequest {
    if config.frequency_penalty.is_some() || config.presence_penalty.is_some() {
        warn!("generateContent has no penalty parameters; ignoring the configured ones");
    }
    let mut system_parts = Vec::new();
    let mut contents = Vec::new();

    for message in messages {
        match message.role {
            Role::System => system_parts.push(Part {
                text: message.content.clone(),
            }),
            Role::User | Role::Assistant => contents.push(Content {
                role: Some(
                    if message.role == Role::User {
                        "user"
                    } else {
                        "model"
                    }
                    .to_string(),
                ),
                parts: vec![Part {
                    text: message.content.clone(),
                }],
            }),
        }
    }

    GenerateRequest {
        contents,
        system_instruction: if system_parts.is_empty() {
            None
        } else {
            Some(Content {
                role: None,
                parts: system_parts,
            })
        },
        generation_config: GenerationConfig::from_config(config),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

impl From<UsageMetadata> for TokenUsage {
    fn from(u: UsageMetadata) -> Self {
        TokenUsage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        }
    }
}

fn candidate_text(response: &GenerateResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .map(|p| p.text.as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
}

#[async_trait]
impl VendorAdapter for GeminiAdapter {
    fn vendor(&self) -> VendorId {
        VendorId::Gemini
    }

    async fn chat(&self, messages: &[ChatMessage], config: &ServiceConfig) -> Result<ChatResult> {
        let url = format!(
            "{}/models/{}:generateContent",
            config.base_url(),
            config.model
        );
        let request = build_request(messages, config);

        debug!(
            vendor = %self.vendor(),
            model = %config.model,
            messages = messages.len(),
            "sending generateContent request"
        );

        let response = http::send_retrying(
            self.vendor(),
            self.http
                .post(&url)
                .header("x-goog-api-key", &config.credential)
                .json(&request),
        )
        .await?;

        let body: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| AdapterError::InvalidResponse {
                    vendor: self.vendor(),
                    message: format!("failed to parse generateContent response: {e}"),
                })?;

        let text = candidate_text(&body);
        if text.is_empty() {
            return Err(AdapterError::InvalidResponse {
                vendor: self.vendor(),
                message: "response contained no candidate text".into(),
            });
        }

        Ok(ChatResult {
            text,
            vendor: self.vendor(),
            model: config.model.clone(),
            usage: body.usage_metadata.map(TokenUsage::from),
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
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            config.base_url(),
            config.model
        );
        let request = build_request(messages, config);

        let response = http::send_retrying(
            self.vendor(),
            self.http
                .post(&url)
                .header("x-goog-api-key", &config.credential)
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
                let piece: GenerateResponse = match serde_json::from_str(payload) {
                    Ok(piece) => piece,
                    Err(err) => {
                        warn!(vendor = %self.vendor(), error = %err, "skipping unparseable stream piece");
                        continue;
                    }
                };

                let text = candidate_text(&piece);
                if !text.is_empty() && tx.send(RawEvent::Delta(text)).await.is_err() {
                    debug!(vendor = %self.vendor(), "stream receiver dropped, stopping");
                    return Ok(());
                }

                // The final piece carries the candidate's finish reason;
                // there is no separate done sentinel.
                if piece
                    .candidates
                    .first()
                    .is_some_and(|c| c.finish_reason.is_some())
                {
                    let _ = tx.send(RawEvent::Done).await;
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    async fn list_models(&self, config: &ServiceConfig) -> Result<Vec<ModelDescriptor>> {
        #[derive(Debug, Deserialize)]
        struct ModelList {
            #[serde(default)]
            models: Vec<ModelEntry>,
        }
        #[derive(Debug, Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct ModelEntry {
            name: String,
            #[serde(default)]
            display_name: Option<String>,
        }

        let url = format!("{}/models", config.base_url());
        let response = http::send_retrying(
            self.vendor(),
            self.http
                .get(&url)
                .header("x-goog-api-key", &config.credential),
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
            .models
            .into_iter()
            .filter(|m| m.name.contains("gemini"))
            .map(|m| {
                // Ids come back as resource names like "models/gemini-2.5-flash".
                let id = m
                    .name
                    .strip_prefix("models/")
                    .unwrap_or(&m.name)
                    .to_string();
                let display = m.display_name.unwrap_or_else(|| id.clone());
                ModelDescriptor::new(id, display)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServiceConfig {
        let mut config = ServiceConfig::new(VendorId::Gemini, "gemini-2.5-flash");
        config.credential = "goog-test".into();
        config
    }

    #[test]
    fn roles_map_to_user_and_model() {
        let messages = [
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
            ChatMessage::user("more"),
        ];
        let request = build_request(&messages, &config());
        let roles: Vec<_> = request
            .contents
            .iter()
            .map(|c| c.role.as_deref().unwrap())
            .collect();
        assert_eq!(roles, ["user", "model", "user"]);
        assert!(request.system_instruction.is_none());
    }

    #[test]
    fn system_messages_go_to_system_instruction() {
        let messages = [
            ChatMessage::system("be terse"),
            ChatMessage::system("in english"),
            ChatMessage::user("hi"),
        ];
        let request = build_request(&messages, &config());
        let instruction = request.system_instruction.unwrap();
        assert_eq!(instruction.parts.len(), 2);
        assert_eq!(instruction.parts[0].text, "be terse");
        assert_eq!(request.contents.len(), 1);
    }

    #[test]
    fn generation_config_omitted_when_nothing_set() {
        let request = build_request(&[ChatMessage::user("hi")], &config());
        assert!(request.generation_config.is_none());
    }

    #[test]
    fn generation_config_uses_camel_case() {
        let mut cfg = config();
        cfg.temperature = Some(0.4);
        cfg.max_output_tokens = Some(128);
        let request = build_request(&[ChatMessage::user("hi")], &cfg);
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""generationConfig""#));
        assert!(json.contains(r#""maxOutputTokens":128"#));
        assert!(!json.contains(r#""systemInstruction""#));
    }

    #[test]
    fn penalties_never_reach_the_wire() {
        let mut cfg = config();
        cfg.frequency_penalty = Some(0.5);
        cfg.presence_penalty = Some(-0.5);
        let messages = [ChatMessage::user("hi")];
        let request = build_request(&messages, &cfg);
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("penalty"));
    }

    #[test]
    fn usage_metadata_maps_counts() {
        let body: GenerateResponse = serde_json::from_str(
            r#"{
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Hi"}]}}],
                "usageMetadata": {"promptTokenCount": 5, "candidatesTokenCount": 1, "totalTokenCount": 6}
            }"#,
        )
        .unwrap();
        assert_eq!(candidate_text(&body), "Hi");
        let usage = TokenUsage::from(body.usage_metadata.unwrap());
        assert_eq!(usage.prompt_tokens, 5);
        assert_eq!(usage.completion_tokens, 1);
        assert_eq!(usage.total_tokens, 6);
    }

    #[test]
    fn multi_part_candidates_concatenate() {
        let body: GenerateResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "a"}, {"text": "b"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(candidate_text(&body), "ab");
    }
}
