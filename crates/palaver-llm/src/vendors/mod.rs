//! One adapter per vendor backend.
//!
//! `openai_wire` holds the OpenAI chat-completions wire format, which three
//! vendors share (OpenAI itself, xAI Grok and DashScope Qwen both expose
//! OpenAI-compatible endpoints). The remaining adapters each own their
//! vendor's native format.

pub(crate) mod openai_wire;

mod claude;
mod gemini;
mod grok;
mod ollama;
mod openai;
mod qwen;
mod responses;

pub use claude::ClaudeAdapter;
pub use gemini::GeminiAdapter;
pub use grok::GrokAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;
pub use qwen::QwenAdapter;
pub use responses::OpenAiResponsesAdapter;
