//! The dispatcher: one [`ServiceManager`] owns every vendor adapter and
//! routes each call by the config's [`VendorId`].
//!
//! The adapter table is built once at construction and covers the whole
//! closed vendor set, so dispatch never fails on a missing entry. All
//! adapters share one HTTP client and its connection pool. Every entry
//! point validates the configuration against the capability registry
//! before any network traffic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::adapter::VendorAdapter;
use crate::capability::capabilities;
use crate::config::ServiceConfig;
use crate::error::{AdapterError, Result};
use crate::stream::{ChunkStream, DEFAULT_STALL_TIMEOUT, run};
use crate::types::{ChatMessage, ChatResult, ModelDescriptor};
use crate::validate::validate;
use crate::vendor::VendorId;
use crate::vendors::{
    ClaudeAdapter, GeminiAdapter, GrokAdapter, OllamaAdapter, OpenAiAdapter,
    OpenAiResponsesAdapter, QwenAdapter,
};

/// Routes chat calls to the vendor adapter named by each config.
pub struct ServiceManager {
    adapters: HashMap<VendorId, Arc<dyn VendorAdapter>>,
    stall_timeout: Duration,
}

impl ServiceManager {
    pub fn new() -> Self {
        Self::with_stall_timeout(DEFAULT_STALL_TIMEOUT)
    }

    /// Build the full adapter table with a custom streaming stall timeout.
    pub fn with_stall_timeout(stall_timeout: Duration) -> Self {
        let http = reqwest::Client::new();

        let mut adapters: HashMap<VendorId, Arc<dyn VendorAdapter>> = HashMap::new();
        adapters.insert(
            VendorId::OpenAi,
            Arc::new(OpenAiAdapter::new(http.clone())),
        );
        adapters.insert(
            VendorId::OpenAiResponses,
            Arc::new(OpenAiResponsesAdapter::new(http.clone())),
        );
        adapters.insert(
            VendorId::Claude,
            Arc::new(ClaudeAdapter::new(http.clone())),
        );
        adapters.insert(
            VendorId::Gemini,
            Arc::new(GeminiAdapter::new(http.clone())),
        );
        adapters.insert(VendorId::Grok, Arc::new(GrokAdapter::new(http.clone())));
        adapters.insert(VendorId::Qwen, Arc::new(QwenAdapter::new(http.clone())));
        adapters.insert(VendorId::Ollama, Arc::new(OllamaAdapter::new(http)));

        Self {
            adapters,
            stall_timeout,
        }
    }

    fn adapter(&self, vendor: VendorId) -> Result<&Arc<dyn VendorAdapter>> {
        self.adapters
            .get(&vendor)
            .ok_or_else(|| AdapterError::UnsupportedVendor(vendor.to_string()))
    }

    fn checked(&self, config: &ServiceConfig) -> Result<&Arc<dyn VendorAdapter>> {
        let report = validate(config);
        if !report.valid {
            return Err(AdapterError::Validation(report.errors));
        }
        self.adapter(config.vendor)
    }

    /// Send one unary chat call to the configured vendor.
    ///
    /// # Errors
    ///
    /// [`AdapterError::Validation`] before any network traffic when the
    /// config violates the capability registry; otherwise whatever the
    /// adapter surfaces.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        config: &ServiceConfig,
    ) -> Result<ChatResult> {
        let adapter = self.checked(config)?;
        debug!(vendor = %config.vendor, model = %config.model, "dispatching chat");
        adapter.chat(messages, config).await
    }

    /// Open one streaming chat call.
    ///
    /// The returned stream is finite and always ends with exactly one final
    /// chunk; dropping it cancels the vendor transport.
    ///
    /// # Errors
    ///
    /// [`AdapterError::Validation`] on a bad config,
    /// [`AdapterError::UnsupportedOperation`] when the vendor has no
    /// streaming capability (callers fall back to [`chat`](Self::chat)).
    /// Transport failures after this point are folded into the stream's
    /// terminal chunk rather than surfaced as errors.
    pub async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        config: &ServiceConfig,
    ) -> Result<ChunkStream> {
        let adapter = self.checked(config)?;
        if !adapter.supports_streaming() {
            return Err(AdapterError::UnsupportedOperation {
                vendor: config.vendor,
                operation: "streaming chat",
            });
        }
        debug!(vendor = %config.vendor, model = %config.model, "dispatching streaming chat");
        Ok(run(
            Arc::clone(adapter),
            messages.to_vec(),
            config.clone(),
            self.stall_timeout,
        ))
    }

    /// Probe whether the configured vendor is reachable with this config.
    /// Never errors; invalid configs and every failure mode report `false`.
    pub async fn test_connection(&self, config: &ServiceConfig) -> bool {
        let report = validate(config);
        if !report.valid {
            warn!(
                vendor = %config.vendor,
                errors = ?report.errors,
                "connection probe rejected by validation"
            );
            return false;
        }
        match self.adapter(config.vendor) {
            Ok(adapter) => adapter.test_connection(config).await,
            Err(_) => false,
        }
    }

    /// List the models the configured vendor offers.
    ///
    /// Unlike [`test_connection`](Self::test_connection) this propagates
    /// errors, so callers can tell an auth failure from an empty catalogue.
    pub async fn list_models(&self, config: &ServiceConfig) -> Result<Vec<ModelDescriptor>> {
        self.checked(config)?.list_models(config).await
    }

    /// Whether the given vendor supports streaming chat.
    pub fn supports_streaming(&self, vendor: VendorId) -> bool {
        self.adapters
            .get(&vendor)
            .is_some_and(|a| a.supports_streaming())
    }

    /// A starting configuration for `vendor`: default model and temperature
    /// from the capability registry, everything else unset. The caller
    /// still has to fill in the credential where required.
    pub fn default_config(&self, vendor: VendorId) -> ServiceConfig {
        let caps = capabilities(vendor);
        let mut config = ServiceConfig::new(vendor, caps.default_model);
        config.temperature = Some(caps.default_temperature);
        config
    }
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceManager")
            .field("vendors", &self.adapters.len())
            .field("stall_timeout", &self.stall_timeout)
            .finish()
    }
}
