//! The abstract chat types every vendor adapter translates to and from.
//!
//! These are the shapes the rest of palaver sees; the vendor-specific wire
//! formats live inside the individual adapters and never leak out.

use serde::{Deserialize, Serialize};

use crate::vendor::VendorId;

/// The author of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a conversation history.
///
/// Immutable once created; an ordered slice of these forms the history a
/// caller passes into an adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Token accounting for one completed call, normalized across vendors.
///
/// Vendors report these under different field names (`prompt_tokens`,
/// `input_tokens`, `promptTokenCount`, `prompt_eval_count`, ...); each
/// adapter maps its vendor's names into this one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The normalized result of one unary chat call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResult {
    /// The assistant's reply text.
    pub text: String,
    /// Which vendor produced the reply.
    pub vendor: VendorId,
    /// The model that was asked for.
    pub model: String,
    /// Token usage, when the vendor reported it.
    pub usage: Option<TokenUsage>,
    /// Opaque handle for stateful conversation chaining. Only vendors with
    /// a stateful API populate this; pass it back via the
    /// `previous_response_id` config extension to continue the thread.
    pub response_handle: Option<String>,
}

/// One element of a streaming chat response.
///
/// A streaming call yields a finite, ordered sequence of these, terminated
/// by exactly one chunk with `is_final == true` (which may carry an empty
/// delta). Concatenating the non-final deltas reproduces the unary text.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamChunk {
    pub text_delta: String,
    pub is_final: bool,
    pub vendor: VendorId,
    pub model: String,
}

impl StreamChunk {
    pub(crate) fn delta(text: impl Into<String>, vendor: VendorId, model: impl Into<String>) -> Self {
        Self {
            text_delta: text.into(),
            is_final: false,
            vendor,
            model: model.into(),
        }
    }

    pub(crate) fn terminal(vendor: VendorId, model: impl Into<String>) -> Self {
        Self {
            text_delta: String::new(),
            is_final: true,
            vendor,
            model: model.into(),
        }
    }
}

/// A model offered by a vendor, as reported by its discovery endpoint.
///
/// Not cached by this layer; callers decide how long a listing stays fresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub display_name: String,
}

impl ModelDescriptor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_helpers_set_roles() {
        assert_eq!(ChatMessage::system("a").role, Role::System);
        assert_eq!(ChatMessage::user("b").role, Role::User);
        assert_eq!(ChatMessage::assistant("c").role, Role::Assistant);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), r#""system""#);
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            r#""assistant""#
        );
    }

    #[test]
    fn chat_message_serde_roundtrip() {
        let msg = ChatMessage::user("Hello, world!");
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, parsed);
    }

    #[test]
    fn chat_result_roundtrip() {
        let result = ChatResult {
            text: "Hi".into(),
            vendor: VendorId::Claude,
            model: "claude-sonnet-4-5".into(),
            usage: Some(TokenUsage {
                prompt_tokens: 12,
                completion_tokens: 3,
                total_tokens: 15,
            }),
            response_handle: None,
        };
        let json = serde_json::to_string(&result).unwrap();
        let parsed: ChatResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result, parsed);
    }

    #[test]
    fn terminal_chunk_has_empty_delta() {
        let chunk = StreamChunk::terminal(VendorId::OpenAi, "gpt-4o");
        assert!(chunk.is_final);
        assert!(chunk.text_delta.is_empty());
        assert_eq!(chunk.model, "gpt-4o");
    }

    #[test]
    fn delta_chunk_is_not_final() {
        let chunk = StreamChunk::delta("Hel", VendorId::Grok, "grok-3-mini");
        assert!(!chunk.is_final);
        assert_eq!(chunk.text_delta, "Hel");
    }
}
