//! Line framing helpers shared by the streaming adapters.
//!
//! Two vendor transport framings pass through here: server-sent events
//! (`event:`/`data:` lines, used by the OpenAI-style, Claude and Gemini
//! adapters) and bare newline-delimited JSON (Ollama). [`LineBuffer`]
//! reassembles complete lines from arbitrary byte chunks; [`parse_sse_line`]
//! classifies one SSE line.

/// The sentinel payload marking end-of-stream in the OpenAI SSE dialect.
pub(crate) const DONE_SENTINEL: &str = "[DONE]";

/// One classified SSE line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SseLine<'a> {
    /// An `event:` line naming the following data payload.
    Event(&'a str),
    /// A `data:` payload.
    Data(&'a str),
    /// Blank line, comment, `id:`, `retry:` -- nothing to act on.
    Ignore,
}

/// Classify a single SSE line.
pub(crate) fn parse_sse_line(line: &str) -> SseLine<'_> {
    let line = line.trim_end();
    if line.is_empty() || line.starts_with(':') {
        return SseLine::Ignore;
    }
    if let Some(rest) = line.strip_prefix("data:") {
        return SseLine::Data(rest.trim_start());
    }
    if let Some(rest) = line.strip_prefix("event:") {
        return SseLine::Event(rest.trim_start());
    }
    SseLine::Ignore
}

/// Buffers raw transport bytes and yields complete `\n`-terminated lines.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buf: String,
}

impl LineBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, bytes: &[u8]) {
        self.buf.push_str(&String::from_utf8_lossy(bytes));
    }

    /// The next complete line, without its terminator.
    pub(crate) fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.find('\n')?;
        let line = self.buf[..pos].trim_end_matches('\r').to_string();
        self.buf.drain(..=pos);
        Some(line)
    }

    /// Whatever remains once the transport closes without a trailing
    /// newline, if non-blank.
    pub(crate) fn take_rest(&mut self) -> Option<String> {
        if self.buf.trim().is_empty() {
            self.buf.clear();
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_data_line() {
        assert_eq!(
            parse_sse_line("data: {\"x\":1}"),
            SseLine::Data("{\"x\":1}")
        );
        // No space after the colon is legal SSE.
        assert_eq!(parse_sse_line("data:[DONE]"), SseLine::Data("[DONE]"));
    }

    #[test]
    fn classify_event_line() {
        assert_eq!(
            parse_sse_line("event: content_block_delta"),
            SseLine::Event("content_block_delta")
        );
    }

    #[test]
    fn classify_ignored_lines() {
        assert_eq!(parse_sse_line(""), SseLine::Ignore);
        assert_eq!(parse_sse_line("   "), SseLine::Ignore);
        assert_eq!(parse_sse_line(": keep-alive comment"), SseLine::Ignore);
        assert_eq!(parse_sse_line("id: 42"), SseLine::Ignore);
        assert_eq!(parse_sse_line("retry: 1000"), SseLine::Ignore);
    }

    #[test]
    fn data_line_with_crlf() {
        assert_eq!(parse_sse_line("data: x\r"), SseLine::Data("x"));
    }

    #[test]
    fn line_buffer_reassembles_split_lines() {
        let mut buf = LineBuffer::new();
        buf.push(b"data: hel");
        assert_eq!(buf.next_line(), None);
        buf.push(b"lo\ndata: world\n");
        assert_eq!(buf.next_line(), Some("data: hello".to_string()));
        assert_eq!(buf.next_line(), Some("data: world".to_string()));
        assert_eq!(buf.next_line(), None);
    }

    #[test]
    fn line_buffer_strips_carriage_returns() {
        let mut buf = LineBuffer::new();
        buf.push(b"data: a\r\n");
        assert_eq!(buf.next_line(), Some("data: a".to_string()));
    }

    #[test]
    fn take_rest_returns_trailing_fragment() {
        let mut buf = LineBuffer::new();
        buf.push(b"data: tail-without-newline");
        assert_eq!(buf.next_line(), None);
        assert_eq!(
            buf.take_rest(),
            Some("data: tail-without-newline".to_string())
        );
        assert_eq!(buf.take_rest(), None);
    }

    #[test]
    fn take_rest_ignores_blank_remainder() {
        let mut buf = LineBuffer::new();
        buf.push(b"  \r");
        assert_eq!(buf.take_rest(), None);
    }
}
