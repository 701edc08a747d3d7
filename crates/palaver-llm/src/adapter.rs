//! The core [`VendorAdapter`] trait.
//!
//! One implementation per vendor lives under [`vendors`](crate::vendors).
//! Adapters are stateless singletons: every method takes the full message
//! history and configuration, performs one vendor HTTP exchange and
//! translates the result back into the abstract types. Concurrent calls
//! share nothing beyond the underlying connection pool.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::ServiceConfig;
use crate::error::{AdapterError, Result};
use crate::types::{ChatMessage, ChatResult, ModelDescriptor};
use crate::vendor::VendorId;

/// A raw streaming event as produced by a vendor adapter, before the
/// normalizer stamps vendor/model metadata and enforces the terminal-chunk
/// contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    /// A partial text token.
    Delta(String),
    /// The vendor signalled completion (stop reason, sentinel, or final
    /// framed record). The transport may still have trailing bytes; they
    /// are ignored.
    Done,
}

/// Translates the abstract chat contract into one vendor's wire format.
#[async_trait]
pub trait VendorAdapter: Send + Sync {
    /// The vendor this adapter serves.
    fn vendor(&self) -> VendorId;

    /// Send the full history to the vendor's unary completion endpoint and
    /// return the normalized result.
    ///
    /// # Errors
    ///
    /// [`AdapterError::Upstream`] on non-2xx responses,
    /// [`AdapterError::InvalidResponse`] on malformed bodies or missing
    /// completion content.
    async fn chat(&self, messages: &[ChatMessage], config: &ServiceConfig) -> Result<ChatResult>;

    /// Whether this adapter implements [`stream_chat`](Self::stream_chat).
    /// Callers seeing `false` must fall back to [`chat`](Self::chat).
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Open the vendor's streaming transport and forward one [`RawEvent`]
    /// per vendor delta, ending with [`RawEvent::Done`] when the vendor
    /// signals completion. A dropped receiver means the caller cancelled;
    /// the adapter returns `Ok(())` and lets the transport close.
    ///
    /// The terminal-chunk guarantee is enforced by the normalizer in
    /// [`stream`](crate::stream), not here: an adapter erroring mid-stream
    /// simply returns the error.
    async fn stream_chat(
        &self,
        _messages: &[ChatMessage],
        _config: &ServiceConfig,
        _tx: mpsc::Sender<RawEvent>,
    ) -> Result<()> {
        Err(AdapterError::UnsupportedOperation {
            vendor: self.vendor(),
            operation: "streaming chat",
        })
    }

    /// Cheapest probe proving reachability and credential validity. Never
    /// errors: every failure becomes `false`. The default delegates to
    /// model listing, which avoids depending on any specific model being
    /// enabled.
    async fn test_connection(&self, config: &ServiceConfig) -> bool {
        match self.list_models(config).await {
            Ok(_) => true,
            Err(err) => {
                debug!(vendor = %self.vendor(), error = %err, "connection probe failed");
                false
            }
        }
    }

    /// List the vendor's models, filtered to the chat-relevant family when
    /// the vendor API returns a superset. Unlike
    /// [`test_connection`](Self::test_connection) this propagates errors,
    /// so callers can distinguish "auth failed" from "zero models".
    async fn list_models(&self, config: &ServiceConfig) -> Result<Vec<ModelDescriptor>>;
}
