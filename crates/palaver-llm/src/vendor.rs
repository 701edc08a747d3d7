//! The closed set of chat vendors palaver can dispatch to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

/// Identifies one vendor backend.
///
/// The set is closed: adding a vendor means adding a variant, an adapter and
/// a capability entry, all checked at compile time. External configuration
/// refers to vendors by their string id (see [`VendorId::as_str`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VendorId {
    /// OpenAI chat completions API (stateless).
    #[serde(rename = "openai")]
    OpenAi,
    /// OpenAI responses API (stateful, supports conversation chaining).
    #[serde(rename = "openai-responses")]
    OpenAiResponses,
    /// Anthropic messages API.
    #[serde(rename = "claude")]
    Claude,
    /// Google Gemini generateContent API.
    #[serde(rename = "gemini")]
    Gemini,
    /// xAI Grok (OpenAI-compatible wire format).
    #[serde(rename = "grok")]
    Grok,
    /// Alibaba Qwen via the DashScope OpenAI-compatible endpoint.
    #[serde(rename = "qwen")]
    Qwen,
    /// Local Ollama instance. The only vendor with an optional credential.
    #[serde(rename = "ollama")]
    Ollama,
}

impl VendorId {
    /// Every registered vendor, in dispatch-table order.
    pub const ALL: [VendorId; 7] = [
        VendorId::OpenAi,
        VendorId::OpenAiResponses,
        VendorId::Claude,
        VendorId::Gemini,
        VendorId::Grok,
        VendorId::Qwen,
        VendorId::Ollama,
    ];

    /// The stable string id used in configuration and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            VendorId::OpenAi => "openai",
            VendorId::OpenAiResponses => "openai-responses",
            VendorId::Claude => "claude",
            VendorId::Gemini => "gemini",
            VendorId::Grok => "grok",
            VendorId::Qwen => "qwen",
            VendorId::Ollama => "ollama",
        }
    }
}

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VendorId {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VendorId::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| AdapterError::UnsupportedVendor(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_as_str() {
        for vendor in VendorId::ALL {
            assert_eq!(vendor.to_string(), vendor.as_str());
        }
    }

    #[test]
    fn from_str_roundtrip() {
        for vendor in VendorId::ALL {
            let parsed: VendorId = vendor.as_str().parse().unwrap();
            assert_eq!(parsed, vendor);
        }
    }

    #[test]
    fn from_str_unknown_vendor() {
        let err = "mystery-ai".parse::<VendorId>().unwrap_err();
        assert!(matches!(err, AdapterError::UnsupportedVendor(_)));
        assert!(err.to_string().contains("mystery-ai"));
    }

    #[test]
    fn serde_uses_string_ids() {
        let json = serde_json::to_string(&VendorId::OpenAiResponses).unwrap();
        assert_eq!(json, r#""openai-responses""#);
        let parsed: VendorId = serde_json::from_str(r#""ollama""#).unwrap();
        assert_eq!(parsed, VendorId::Ollama);
    }

    #[test]
    fn all_ids_are_unique() {
        let mut ids: Vec<&str> = VendorId::ALL.iter().map(|v| v.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), VendorId::ALL.len());
    }
}
