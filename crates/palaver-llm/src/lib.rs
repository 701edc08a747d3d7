//! Vendor adapter layer for palaver's chat client.
//!
//! This crate normalizes seven LLM vendor APIs behind one contract: unary
//! chat, streaming chat where the vendor supports it, connection probing
//! and model discovery. It is a standalone library with no dependencies on
//! other palaver crates.
//!
//! # Architecture
//!
//! - [`VendorAdapter`] trait defines the per-vendor contract
//! - [`ServiceManager`] owns one adapter per [`VendorId`] and dispatches by
//!   the config's vendor tag
//! - [`capability`] is the compiled-in registry of what each vendor accepts;
//!   [`validate`](validate()) checks a [`ServiceConfig`] against it before
//!   any network call
//! - [`ChunkStream`] is the normalized streaming shape: finite, ordered,
//!   terminated by exactly one final chunk, cancelled by dropping it
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use palaver_llm::{ChatMessage, ServiceManager, VendorId};
//!
//! let manager = ServiceManager::new();
//! let mut config = manager.default_config(VendorId::Claude);
//! config.credential = std::env::var("ANTHROPIC_API_KEY")?;
//!
//! let reply = manager
//!     .chat(&[ChatMessage::user("What is Rust?")], &config)
//!     .await?;
//! println!("{}", reply.text);
//! ```

pub mod adapter;
pub mod capability;
pub mod config;
pub mod error;
mod http;
pub mod manager;
mod sse;
pub mod stream;
pub mod types;
pub mod validate;
pub mod vendor;
pub mod vendors;

pub use adapter::{RawEvent, VendorAdapter};
pub use capability::{VendorCaps, capabilities, requires_credential};
pub use config::{EXT_PREVIOUS_RESPONSE, EXT_STORE, ServiceConfig};
pub use error::{AdapterError, Result};
pub use manager::ServiceManager;
pub use stream::{ChunkStream, DEFAULT_STALL_TIMEOUT};
pub use types::{ChatMessage, ChatResult, ModelDescriptor, Role, StreamChunk, TokenUsage};
pub use validate::{ValidationReport, validate};
pub use vendor::VendorId;
