pub mod openai;

use crate::llm::LlmResponse;
use crate::stream::StreamEvent;
use async_trait::async_trait;
use finsight_core::{FinsightResult, Message};
use finsight_skills::SkillDescriptor;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Trait for LLM provider backends.
///
/// The streaming variant hands back the unit stream plus a join handle that
/// resolves to the aggregated response; the handle resolving is the
/// backend's completion signal.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Non-streaming chat completion.
    async fn chat(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[SkillDescriptor],
    ) -> FinsightResult<LlmResponse>;

    /// Streaming chat completion.
    async fn chat_stream(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[SkillDescriptor],
    ) -> FinsightResult<(
        mpsc::Receiver<StreamEvent>,
        JoinHandle<FinsightResult<LlmResponse>>,
    )>;
}
