//! OpenAI chat-completions adapter.
//!
//! Speaks the classic `/chat/completions` API with bearer auth. Some newer
//! OpenAI models reject a `temperature` parameter outright; when that exact
//! rejection comes back the request is retried once with the parameter
//! dropped, so callers with a saved temperature still get an answer.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

use crate::adapter::{RawEvent, VendorAdapter};
use crate::config::ServiceConfig;
use crate::error::{AdapterError, Result};
use crate::types::{ChatMessage, ChatResult, ModelDescriptor};
use crate::vendor::VendorId;

use super::openai_wire;

pub struct OpenAiAdapter {
    http: reqwest::Client,
}

impl OpenAiAdapter {
    pub(crate) fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

/// A 400 whose message names `temperature` as unsupported for the model.
/// Other 400s (bad model, malformed request) must not trigger the retry.
fn is_unsupported_temperature(err: &AdapterError) -> bool {
    let AdapterError::Upstream {
        status: Some(400),
        message,
        ..
    } = err
    else {
        return false;
    };
    let message = message.to_ascii_lowercase();
    message.contains("temperature")
        && (message.contains("unsupported") || message.contains("does not support"))
}

#[async_trait]
impl VendorAdapter for OpenAiAdapter {
    fn vendor(&self) -> VendorId {
        VendorId::OpenAi
    }

    async fn chat(&self, messages: &[ChatMessage], config: &ServiceConfig) -> Result<ChatResult> {
        match openai_wire::chat(&self.http, self.vendor(), messages, config, true).await {
            Err(err) if config.temperature.is_some() && is_unsupported_temperature(&err) => {
                info!(
                    vendor = %self.vendor(),
                    model = %config.model,
                    "model rejected temperature, retrying without it"
                );
                openai_wire::chat(&self.http, self.vendor(), messages, config, false).await
            }
            other => other,
        }
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
        match openai_wire::stream_chat(&self.http, self.vendor(), messages, config, &tx, true)
            .await
        {
            Err(err) if config.temperature.is_some() && is_unsupported_temperature(&err) => {
                info!(
                    vendor = %self.vendor(),
                    model = %config.model,
                    "model rejected temperature, retrying stream without it"
                );
                openai_wire::stream_chat(&self.http, self.vendor(), messages, config, &tx, false)
                    .await
            }
            other => other,
        }
    }

    async fn list_models(&self, config: &ServiceConfig) -> Result<Vec<ModelDescriptor>> {
        // The /models listing mixes in embedding, audio and image models;
        // keep the chat-capable families.
        openai_wire::list_models(&self.http, self.vendor(), config, |id| {
            (id.starts_with("gpt-") || id.starts_with("o1") || id.starts_with("o3"))
                && !id.contains("embedding")
                && !id.contains("audio")
                && !id.contains("realtime")
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(status: Option<u16>, message: &str) -> AdapterError {
        AdapterError::Upstream {
            vendor: VendorId::OpenAi,
            status,
            message: message.into(),
        }
    }

    #[test]
    fn detects_unsupported_temperature_message() {
        let err = upstream(
            Some(400),
            "Unsupported value: 'temperature' does not support 0.7 with this model.",
        );
        assert!(is_unsupported_temperature(&err));
    }

    #[test]
    fn ignores_other_bad_requests() {
        assert!(!is_unsupported_temperature(&upstream(
            Some(400),
            "Invalid value for 'model'",
        )));
        assert!(!is_unsupported_temperature(&upstream(
            Some(401),
            "temperature unsupported",
        )));
        assert!(!is_unsupported_temperature(&AdapterError::RateLimited {
            vendor: VendorId::OpenAi,
            retry_after_ms: 1000,
        }));
    }
}
