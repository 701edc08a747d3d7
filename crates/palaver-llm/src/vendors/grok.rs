//! xAI Grok adapter.
//!
//! xAI exposes an OpenAI-compatible `/chat/completions` surface, so this
//! adapter is a thin binding of the shared wire module to the x.ai base URL.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::adapter::{RawEvent, VendorAdapter};
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::types::{ChatMessage, ChatResult, ModelDescriptor};
use crate::vendor::VendorId;

use super::openai_wire;

pub struct GrokAdapter {
    http: reqwest::Client,
}

impl GrokAdapter {
    pub(crate) fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl VendorAdapter for GrokAdapter {
    fn vendor(&self) -> VendorId {
        VendorId::Grok
    }

    async fn chat(&self, messages: &[ChatMessage], config: &ServiceConfig) -> Result<ChatResult> {
        openai_wire::chat(&self.http, self.vendor(), messages, config, true).await
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
        openai_wire::stream_chat(&self.http, self.vendor(), messages, config, &tx, true).await
    }

    async fn list_models(&self, config: &ServiceConfig) -> Result<Vec<ModelDescriptor>> {
        openai_wire::list_models(&self.http, self.vendor(), config, |id| id.starts_with("grok"))
            .await
    }
}
