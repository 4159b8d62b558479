use serde::{Deserialize, Serialize};

/// Events emitted during a streaming LLM response.
///
/// Reasoning models interleave `ReasoningDelta` (their chain of thought) with
/// ordinary `TextDelta` output; phase 1 folds both into the reasoning buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A chunk of text content from the assistant.
    TextDelta { text: String },

    /// A chunk of model reasoning.
    ReasoningDelta { text: String },

    /// A new tool call has started.
    ToolCallStart { id: String, name: String },

    /// An incremental fragment of tool call arguments (JSON string delta).
    ToolCallDelta { id: String, arguments_delta: String },

    /// A tool call's arguments are now complete.
    ToolCallEnd { id: String },

    /// The stream has finished successfully.
    Done,

    /// An error occurred during streaming.
    Error { message: String },
}

impl StreamEvent {
    /// Text carried by a content or reasoning unit.
    pub fn unit_text(&self) -> Option<&str> {
        match self {
            StreamEvent::TextDelta { text } | StreamEvent::ReasoningDelta { text } => Some(text),
            _ => None,
        }
    }
}
