//! Alibaba Qwen adapter (DashScope compatible-mode).
//!
//! DashScope's compatible-mode endpoint accepts the OpenAI chat-completions
//! format for unary calls. Its SSE dialect has enough divergences
//! (incremental-output flags, different finish bookkeeping) that streaming
//! is not offered here; the dispatcher reports it as unsupported and
//! callers fall back to unary chat.

use async_trait::async_trait;

use crate::adapter::VendorAdapter;
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::types::{ChatMessage, ChatResult, ModelDescriptor};
use crate::vendor::VendorId;

use super::openai_wire;

pub struct QwenAdapter {
    http: reqwest::Client,
}

impl QwenAdapter {
    pub(crate) fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl VendorAdapter for QwenAdapter {
    fn vendor(&self) -> VendorId {
        VendorId::Qwen
    }

    async fn chat(&self, messages: &[ChatMessage], config: &ServiceConfig) -> Result<ChatResult> {
        openai_wire::chat(&self.http, self.vendor(), messages, config, true).await
    }

    async fn list_models(&self, config: &ServiceConfig) -> Result<Vec<ModelDescriptor>> {
        openai_wire::list_models(&self.http, self.vendor(), config, |id| id.starts_with("qwen"))
            .await
    }
}
