//! The static capability registry: per-vendor parameter legality.
//!
//! Compiled-in and read-only; changing a range or default is a deployment,
//! not a runtime mutation. The [`validate`](crate::validate) module checks
//! candidate configurations against these entries before dispatch.

use std::ops::RangeInclusive;

use crate::vendor::VendorId;

/// Penalty parameters share one range across the vendors that accept them.
pub const PENALTY_RANGE: RangeInclusive<f64> = -2.0..=2.0;

/// What one vendor accepts.
#[derive(Debug, Clone)]
pub struct VendorCaps {
    pub vendor: VendorId,
    pub temperature: RangeInclusive<f64>,
    pub top_p: RangeInclusive<f64>,
    pub max_output_tokens: RangeInclusive<u32>,
    /// Whether dispatch requires a non-empty credential.
    pub requires_credential: bool,
    /// Base URL used when the config carries no endpoint override.
    pub default_endpoint: &'static str,
    /// Model pre-filled into a default configuration.
    pub default_model: &'static str,
    /// Temperature pre-filled into a default configuration.
    pub default_temperature: f64,
    pub notes: &'static str,
}

static OPENAI: VendorCaps = VendorCaps {
    vendor: VendorId::OpenAi,
    temperature: 0.0..=2.0,
    top_p: 0.0..=1.0,
    max_output_tokens: 1..=32_768,
    requires_credential: true,
    default_endpoint: "https://api.openai.com/v1",
    default_model: "gpt-4o",
    default_temperature: 1.0,
    notes: "reasoning-tier models reject temperature overrides; the adapter retries once without it",
};

static OPENAI_RESPONSES: VendorCaps = VendorCaps {
    vendor: VendorId::OpenAiResponses,
    temperature: 0.0..=2.0,
    top_p: 0.0..=1.0,
    max_output_tokens: 1..=32_768,
    requires_credential: true,
    default_endpoint: "https://api.openai.com/v1",
    default_model: "gpt-4o",
    default_temperature: 1.0,
    notes: "stateful; supports previous_response_id chaining and server-side persistence",
};

static CLAUDE: VendorCaps = VendorCaps {
    vendor: VendorId::Claude,
    temperature: 0.0..=1.0,
    top_p: 0.0..=1.0,
    max_output_tokens: 1..=64_000,
    requires_credential: true,
    default_endpoint: "https://api.anthropic.com/v1",
    default_model: "claude-sonnet-4-5",
    default_temperature: 1.0,
    notes: "temperature and top_p are mutually exclusive; max_tokens is mandatory on the wire",
};

static GEMINI: VendorCaps = VendorCaps {
    vendor: VendorId::Gemini,
    temperature: 0.0..=2.0,
    top_p: 0.0..=1.0,
    max_output_tokens: 1..=65_536,
    requires_credential: true,
    default_endpoint: "https://generativelanguage.googleapis.com/v1beta",
    default_model: "gemini-2.5-flash",
    default_temperature: 1.0,
    notes: "system messages go to the dedicated systemInstruction field",
};

static GROK: VendorCaps = VendorCaps {
    vendor: VendorId::Grok,
    temperature: 0.0..=2.0,
    top_p: 0.0..=1.0,
    max_output_tokens: 1..=32_768,
    requires_credential: true,
    default_endpoint: "https://api.x.ai/v1",
    default_model: "grok-3-mini",
    default_temperature: 1.0,
    notes: "OpenAI-compatible wire format",
};

static QWEN: VendorCaps = VendorCaps {
    vendor: VendorId::Qwen,
    temperature: 0.0..=2.0,
    top_p: 0.0..=1.0,
    max_output_tokens: 1..=32_768,
    requires_credential: true,
    default_endpoint: "https://dashscope.aliyuncs.com/compatible-mode/v1",
    default_model: "qwen-plus",
    default_temperature: 1.0,
    notes: "DashScope OpenAI-compatible mode; unary only, no streaming capability",
};

static OLLAMA: VendorCaps = VendorCaps {
    vendor: VendorId::Ollama,
    temperature: 0.0..=2.0,
    top_p: 0.0..=1.0,
    max_output_tokens: 1..=131_072,
    requires_credential: false,
    default_endpoint: "http://localhost:11434",
    default_model: "llama3.1",
    default_temperature: 0.8,
    notes: "local instance; credential optional, reachability probed via /api/tags",
};

/// Look up the capability entry for a vendor.
pub fn capabilities(vendor: VendorId) -> &'static VendorCaps {
    match vendor {
        VendorId::OpenAi => &OPENAI,
        VendorId::OpenAiResponses => &OPENAI_RESPONSES,
        VendorId::Claude => &CLAUDE,
        VendorId::Gemini => &GEMINI,
        VendorId::Grok => &GROK,
        VendorId::Qwen => &QWEN,
        VendorId::Ollama => &OLLAMA,
    }
}

/// Whether dispatch to `vendor` requires a non-empty credential.
pub fn requires_credential(vendor: VendorId) -> bool {
    capabilities(vendor).requires_credential
}
