//! Core types and error definitions shared by every finsight crate.
//!
//! # Main types
//!
//! - [`FinsightError`]: Unified error enum for all finsight subsystems.
//! - [`FinsightResult`]: Convenience alias for `Result<T, FinsightError>`.
//! - [`Role`]: Message role (user, assistant, system, tool).
//! - [`Message`]: A single message within a chat.
//! - [`ToolCall`]: A tool invocation requested by the language model.
//! - [`ToolResult`]: The JSON result handed back to the model after a tool ran.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// --- Error types ---

/// Top-level error type for finsight.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum FinsightError {
    /// An error originating from the generation orchestrator.
    #[error("Agent error: {0}")]
    Agent(String),

    /// An error from an outbound HTTP request (LLM or analytics backend).
    #[error("HTTP error: {0}")]
    Http(String),

    /// An error from document, chat or message persistence.
    #[error("Store error: {0}")]
    Store(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error raised by a tool during invocation.
    #[error("Tool error: {0}")]
    Tool(String),

    /// An error from the HTTP gateway layer.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// A malformed record on the delta stream.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The analytics backend could not be reached after all retries.
    #[error("Fetch error: {message}")]
    Fetch {
        /// Human-readable cause of the last failed attempt.
        message: String,
        /// Whether the last failure was a per-attempt timeout.
        is_timeout: bool,
    },

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FinsightError {
    /// Returns true when the error stems from an upstream timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FinsightError::Fetch { is_timeout: true, .. })
    }
}

/// A convenience `Result` alias using [`FinsightError`].
pub type FinsightResult<T> = Result<T, FinsightError>;

// --- Message types ---

/// The role of the participant that authored a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A human end-user.
    User,
    /// The AI assistant.
    Assistant,
    /// A system-level instruction or prompt.
    System,
    /// Output produced by a tool invocation.
    Tool,
}

/// A single message exchanged within a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for this message.
    pub id: Uuid,
    /// The role of the message author.
    pub role: Role,
    /// The textual content of the message.
    pub content: String,
    /// The chat this message belongs to.
    pub chat_id: Uuid,
    /// UTC timestamp of when the message was created.
    pub timestamp: DateTime<Utc>,
    /// Arbitrary key-value metadata attached to the message.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Message {
    /// Creates a new message with the given role, content, and chat ID.
    pub fn new(role: Role, content: impl Into<String>, chat_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            chat_id,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Creates a new message with [`Role::User`].
    pub fn user(content: impl Into<String>, chat_id: Uuid) -> Self {
        Self::new(Role::User, content, chat_id)
    }

    /// Creates a new message with [`Role::Assistant`].
    pub fn assistant(content: impl Into<String>, chat_id: Uuid) -> Self {
        Self::new(Role::Assistant, content, chat_id)
    }

    /// Creates a new message with [`Role::System`].
    pub fn system(content: impl Into<String>, chat_id: Uuid) -> Self {
        Self::new(Role::System, content, chat_id)
    }

    /// Creates a tool-result message carrying the serialized result.
    pub fn tool(result: &ToolResult, chat_id: Uuid) -> Self {
        let content = serde_json::json!({
            "type": "tool_result",
            "tool_use_id": result.call_id,
            "content": result.content,
            "is_error": result.is_error,
        });
        Self::new(Role::Tool, content.to_string(), chat_id)
    }
}

/// Returns the most recent message authored by the user, if any.
pub fn most_recent_user_message(messages: &[Message]) -> Option<&Message> {
    messages.iter().rev().find(|m| m.role == Role::User)
}

// --- Tool types ---

/// A request from the LLM to invoke a specific tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier assigned by the LLM for this tool call.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON arguments to pass to the tool.
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Fingerprint used to recognise a re-issued identical call: the tool name
    /// plus the canonical serialization of its arguments.
    pub fn fingerprint(&self) -> String {
        format!("{}:{}", self.name, self.arguments)
    }
}

/// The result returned after executing a [`ToolCall`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The ID of the [`ToolCall`] this result corresponds to.
    pub call_id: String,
    /// JSON output produced by the tool. Failures carry `{"error": ...}`.
    pub content: serde_json::Value,
    /// Whether the tool execution ended in an error.
    pub is_error: bool,
}

impl ToolResult {
    /// Creates a successful tool result.
    pub fn success(call_id: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            call_id: call_id.into(),
            content,
            is_error: false,
        }
    }

    /// Creates an error tool result with an `{"error": message}` body.
    pub fn error(call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: serde_json::json!({ "error": message.into() }),
            is_error: true,
        }
    }
}
