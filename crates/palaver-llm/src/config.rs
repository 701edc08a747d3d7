//! Per-request service configuration.
//!
//! A [`ServiceConfig`] is assembled by the caller (palaver's settings layer)
//! for every call and handed to the dispatcher. This layer never persists
//! one; the credential only lives as long as the call.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::capability::capabilities;
use crate::vendor::VendorId;

/// Extension key: opaque handle of a prior response, instructing a stateful
/// vendor to treat this call as a continuation instead of a fresh thread.
pub const EXT_PREVIOUS_RESPONSE: &str = "previous_response_id";

/// Extension key: ask a stateful vendor to persist the response server-side
/// so it can be chained later. Boolean.
pub const EXT_STORE: &str = "store";

/// Everything an adapter needs to place one vendor call.
///
/// Unset optional parameters are *omitted* from the vendor request so the
/// vendor's own defaults apply; they are never filled in with local guesses.
/// Vendor-only fields ride in `extensions` instead of widening this struct
/// per vendor; adapters ignore keys they do not understand.
#[derive(Clone, Deserialize)]
pub struct ServiceConfig {
    pub vendor: VendorId,

    /// Vendor credential. May be empty for vendors that do not require one
    /// (see [`VendorCaps::requires_credential`](crate::capability::VendorCaps)).
    #[serde(default)]
    pub credential: String,

    /// Overrides the vendor's default base URL when set.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// The vendor model id to call.
    pub model: String,

    #[serde(default)]
    pub temperature: Option<f64>,

    /// Absent means "let the vendor decide".
    #[serde(default)]
    pub max_output_tokens: Option<u32>,

    #[serde(default)]
    pub top_p: Option<f64>,

    #[serde(default)]
    pub frequency_penalty: Option<f64>,

    #[serde(default)]
    pub presence_penalty: Option<f64>,

    #[serde(default)]
    pub stop_sequences: Option<Vec<String>>,

    /// Vendor-specific extensions, e.g. [`EXT_PREVIOUS_RESPONSE`].
    #[serde(default)]
    pub extensions: HashMap<String, Value>,
}

impl ServiceConfig {
    /// A minimal config for `vendor` and `model` with everything else unset.
    pub fn new(vendor: VendorId, model: impl Into<String>) -> Self {
        Self {
            vendor,
            credential: String::new(),
            endpoint: None,
            model: model.into(),
            temperature: None,
            max_output_tokens: None,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            stop_sequences: None,
            extensions: HashMap::new(),
        }
    }

    /// The base URL for this call: the endpoint override when present,
    /// otherwise the vendor's registered default. Trailing slashes are
    /// stripped so adapters can append paths uniformly.
    pub fn base_url(&self) -> String {
        self.endpoint
            .as_deref()
            .unwrap_or(capabilities(self.vendor).default_endpoint)
            .trim_end_matches('/')
            .to_string()
    }

    /// A string-valued extension, if present.
    pub fn extension_str(&self, key: &str) -> Option<&str> {
        self.extensions.get(key).and_then(Value::as_str)
    }

    /// A boolean-valued extension, if present.
    pub fn extension_flag(&self, key: &str) -> Option<bool> {
        self.extensions.get(key).and_then(Value::as_bool)
    }
}

// Credentials must never reach logs; Debug is hand-rolled to mask them.
impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("vendor", &self.vendor)
            .field(
                "credential",
                &if self.credential.is_empty() { "" } else { "***" },
            )
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("top_p", &self.top_p)
            .field("frequency_penalty", &self.frequency_penalty)
            .field("presence_penalty", &self.presence_penalty)
            .field("stop_sequences", &self.stop_sequences)
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .finish()
    }
}
