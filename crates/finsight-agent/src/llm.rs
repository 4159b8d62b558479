use crate::backends::openai::OpenAiBackend;
use crate::backends::LlmBackend;
use crate::config::ModelConfig;
use crate::stream::StreamEvent;
use finsight_core::{FinsightResult, Message, ToolCall};
use finsight_skills::SkillDescriptor;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Response from the LLM: either text content or a tool call request.
#[derive(Debug, Clone)]
pub enum LlmResponse {
    /// Text cut short (length limit or similar).
    Text(String),
    ToolUse {
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    /// Text with a natural stop.
    Done(String),
}

impl LlmResponse {
    /// Text content regardless of variant.
    pub fn text(&self) -> &str {
        match self {
            LlmResponse::Text(text) | LlmResponse::Done(text) => text,
            LlmResponse::ToolUse { content, .. } => content.as_deref().unwrap_or_default(),
        }
    }
}

/// Cheaply clonable handle on one model backend.
#[derive(Clone)]
pub struct LlmClient {
    backend: Arc<dyn LlmBackend>,
}

impl LlmClient {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            backend: Arc::new(OpenAiBackend::new(config)),
        }
    }

    /// Create from a pre-built backend (for custom providers and tests).
    pub fn from_backend(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    /// Non-streaming chat completion.
    pub async fn chat(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[SkillDescriptor],
    ) -> FinsightResult<LlmResponse> {
        self.backend.chat(system_prompt, messages, tools).await
    }

    /// Streaming chat completion.
    pub async fn chat_stream(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[SkillDescriptor],
    ) -> FinsightResult<(
        mpsc::Receiver<StreamEvent>,
        tokio::task::JoinHandle<FinsightResult<LlmResponse>>,
    )> {
        self.backend
            .chat_stream(system_prompt, messages, tools)
            .await
    }
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient").finish_non_exhaustive()
    }
}
