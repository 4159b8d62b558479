use finsight_core::{Message, ToolCall};
use std::collections::HashSet;
use uuid::Uuid;

/// Sentinel a reasoning model writes when the question needs no tools.
pub const SIMPLE_QUERY_MARKER: &str = "SIMPLE_QUERY:";

/// Manages the prompt window for one model call: a system prompt plus the
/// most recent history.
pub struct ContextWindow {
    messages: Vec<Message>,
    system_prompt: Option<String>,
    max_messages: usize,
}

impl ContextWindow {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            system_prompt: None,
            max_messages,
        }
    }

    /// A window pre-filled with `history`.
    pub fn with_history(max_messages: usize, history: &[Message]) -> Self {
        let mut window = Self::new(max_messages);
        for message in history {
            window.push(message.clone());
        }
        window
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = Some(prompt.into());
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.truncate();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    fn truncate(&mut self) {
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
        }
    }
}

/// Phase-1 output accumulated across units.
#[derive(Debug, Clone, Default)]
pub struct ReasoningBuffer {
    text: String,
    is_simple_query: bool,
}

impl ReasoningBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a unit and returns the whole buffer so far.
    ///
    /// The marker is looked up in the whole buffer, so it is found even
    /// when split across units.
    pub fn push(&mut self, unit: &str) -> &str {
        self.text.push_str(unit);
        if !self.is_simple_query && self.text.contains(SIMPLE_QUERY_MARKER) {
            self.is_simple_query = true;
        }
        &self.text
    }

    /// Drops everything before the sentinel of a simple query.
    pub fn finalize(&mut self) {
        if let Some(start) = self.text.find(SIMPLE_QUERY_MARKER) {
            self.text.drain(..start);
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_simple_query(&self) -> bool {
        self.is_simple_query
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Mutable state of one chat request, owned by the orchestrator.
#[derive(Debug)]
pub struct RequestContext {
    pub chat_id: Uuid,
    pub user_id: String,
    first_chunk_seen: bool,
    responding: bool,
    seen_tool_calls: HashSet<String>,
    pub reasoning: ReasoningBuffer,
}

impl RequestContext {
    pub fn new(chat_id: Uuid, user_id: impl Into<String>) -> Self {
        Self {
            chat_id,
            user_id: user_id.into(),
            first_chunk_seen: false,
            responding: false,
            seen_tool_calls: HashSet::new(),
            reasoning: ReasoningBuffer::new(),
        }
    }

    /// True exactly once: on the first phase-1 unit.
    pub fn mark_first_chunk(&mut self) -> bool {
        !std::mem::replace(&mut self.first_chunk_seen, true)
    }

    /// True exactly once: on the first plain-text unit of phase 2.
    pub fn mark_responding(&mut self) -> bool {
        !std::mem::replace(&mut self.responding, true)
    }

    /// Records a tool call; `false` when an identical call was already seen
    /// in this request.
    pub fn admit_tool_call(&mut self, call: &ToolCall) -> bool {
        self.seen_tool_calls.insert(call.fingerprint())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_query_truncation() {
        let mut buffer = ReasoningBuffer::new();
        buffer.push("...preamble... ");
        buffer.push("SIMPLE_QUERY: answer is 5");
        assert!(buffer.is_simple_query());
        assert_eq!(buffer.text(), "...preamble... SIMPLE_QUERY: answer is 5");

        buffer.finalize();
        assert_eq!(buffer.text(), "SIMPLE_QUERY: answer is 5");
    }

    #[test]
    fn test_marker_split_across_units() {
        let mut buffer = ReasoningBuffer::new();
        buffer.push("<think>SIMPLE_");
        assert!(!buffer.is_simple_query());
        buffer.push("QUERY: 2+2");
        assert!(buffer.is_simple_query());
    }

    #[test]
    fn test_complex_query_is_untouched() {
        let mut buffer = ReasoningBuffer::new();
        let snapshot = buffer.push("Compare AAPL and MSFT.").to_string();
        assert_eq!(snapshot, "Compare AAPL and MSFT.");
        buffer.finalize();
        assert_eq!(buffer.text(), "Compare AAPL and MSFT.");
        assert!(!buffer.is_simple_query());
    }

    #[test]
    fn test_first_chunk_and_responding_fire_once() {
        let mut ctx = RequestContext::new(Uuid::new_v4(), "u1");
        assert!(ctx.mark_first_chunk());
        assert!(!ctx.mark_first_chunk());
        assert!(ctx.mark_responding());
        assert!(!ctx.mark_responding());
    }

    #[test]
    fn test_duplicate_tool_calls_are_refused() {
        let mut ctx = RequestContext::new(Uuid::new_v4(), "u1");
        let call = ToolCall {
            id: "a".into(),
            name: "financial_series".into(),
            arguments: serde_json::json!({"query": "AAPL price last year"}),
        };
        let retry = ToolCall {
            id: "b".into(),
            ..call.clone()
        };
        assert!(ctx.admit_tool_call(&call));
        assert!(!ctx.admit_tool_call(&retry));
    }

    #[test]
    fn test_context_window_truncates_oldest() {
        let chat_id = Uuid::new_v4();
        let history: Vec<Message> = (0..5)
            .map(|i| Message::user(format!("m{i}"), chat_id))
            .collect();
        let window = ContextWindow::with_history(3, &history);
        assert_eq!(window.messages().len(), 3);
        assert_eq!(window.messages()[0].content, "m2");
    }
}
