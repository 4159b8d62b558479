use crate::config::OrchestratorConfig;
use crate::context::{ContextWindow, RequestContext};
use crate::gate::{CompletionGate, CompletionSource};
use crate::llm::{LlmClient, LlmResponse};
use crate::prompts::{answer_prompt, REASONING_PROMPT};
use crate::stream::StreamEvent;
use finsight_core::{FinsightError, FinsightResult, Message, ToolCall, ToolResult};
use finsight_protocol::{status, Delta, DeltaSink, StreamRecord};
use finsight_skills::{SkillDescriptor, SkillRegistry, ToolContext};
use finsight_store::{ConnectionGuard, Storage};
use futures_util::future::join_all;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The only error text a client ever sees for a failed turn.
pub const TOP_LEVEL_ERROR: &str = "Oops, an error occurred!";

/// One chat turn to generate.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub chat_id: Uuid,
    pub user_id: String,
    /// Full history, ending with the new user message.
    pub messages: Vec<Message>,
}

/// Runs the reasoning phase, then the tool-using answer phase, and streams
/// both onto one [`DeltaSink`].
///
/// Phase 2 never starts before phase 1's [`CompletionGate`] resolves, either
/// through the backend finishing or through the configured timeout.
pub struct Orchestrator {
    reasoning: LlmClient,
    answer: LlmClient,
    skills: Arc<SkillRegistry>,
    store: Arc<dyn Storage>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        reasoning: LlmClient,
        answer: LlmClient,
        skills: Arc<SkillRegistry>,
        store: Arc<dyn Storage>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            reasoning,
            answer,
            skills,
            store,
            config,
        }
    }

    pub fn skills(&self) -> &SkillRegistry {
        &self.skills
    }

    /// Starts a turn in the background and returns its record stream.
    ///
    /// The lease is held for the whole turn and dropped on every exit path.
    /// Any failure outside a tool, panics included, becomes a single
    /// [`TOP_LEVEL_ERROR`] record.
    pub fn spawn(
        self: &Arc<Self>,
        request: TurnRequest,
        lease: ConnectionGuard,
    ) -> (mpsc::UnboundedReceiver<StreamRecord>, JoinHandle<()>) {
        let (sink, rx) = DeltaSink::channel();
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let _lease = lease;
            let chat_id = request.chat_id;
            let outcome = AssertUnwindSafe(this.run(request, sink.clone()))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    error!(chat_id = %chat_id, error = %e, "Chat turn failed");
                    sink.error(TOP_LEVEL_ERROR);
                }
                Err(_) => {
                    error!(chat_id = %chat_id, "Chat turn panicked");
                    sink.error(TOP_LEVEL_ERROR);
                }
            }
        });
        (rx, handle)
    }

    /// Runs both phases and persists the generated messages.
    ///
    /// Returns the assistant and tool messages produced by phase 2.
    pub async fn run(&self, request: TurnRequest, sink: DeltaSink) -> FinsightResult<Vec<Message>> {
        let mut rctx = RequestContext::new(request.chat_id, request.user_id.clone());
        let tool_ctx = ToolContext::new(
            request.chat_id,
            request.user_id,
            sink.clone(),
            Arc::clone(&self.store),
        );

        info!(chat_id = %request.chat_id, messages = request.messages.len(), "Starting chat turn");

        let source = self.reason(&request.messages, &mut rctx, &sink).await;
        info!(
            chat_id = %request.chat_id,
            completed_by = ?source,
            simple_query = rctx.reasoning.is_simple_query(),
            "Reasoning phase complete"
        );

        let generated = self.respond(&request.messages, &mut rctx, &tool_ctx).await?;

        if !generated.is_empty() {
            if let Err(e) = self.store.save_messages(&generated).await {
                warn!(chat_id = %request.chat_id, error = %e, "Failed to save chat messages");
            }
        }

        Ok(generated)
    }

    async fn reason(
        &self,
        history: &[Message],
        rctx: &mut RequestContext,
        sink: &DeltaSink,
    ) -> CompletionSource {
        let gate = CompletionGate::new();
        let timer = {
            let gate = gate.clone();
            let timeout = self.config.reasoning_timeout();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                gate.resolve(CompletionSource::Timeout);
            })
        };

        let window = ContextWindow::with_history(self.config.max_history, history);
        let mut backend_task = None;

        let phase = async {
            match self
                .reasoning
                .chat_stream(Some(REASONING_PROMPT), window.messages(), &[])
                .await
            {
                Ok((mut rx, handle)) => {
                    backend_task = Some(handle.abort_handle());
                    while let Some(event) = rx.recv().await {
                        if let Some(text) = event.unit_text() {
                            if rctx.mark_first_chunk() {
                                sink.send(Delta::status(status::REASONING_START));
                            }
                            let snapshot = rctx.reasoning.push(text).to_string();
                            sink.send(Delta::ReasoningChunk(snapshot));
                        } else if let StreamEvent::Error { message } = &event {
                            warn!(error = %message, "Reasoning stream reported an error");
                        }
                    }
                    match handle.await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => warn!(error = %e, "Reasoning generation failed"),
                        Err(e) => warn!(error = %e, "Reasoning task ended abnormally"),
                    }
                }
                Err(e) => warn!(error = %e, "Reasoning phase failed to start"),
            }
            gate.resolve(CompletionSource::Callback);
        };

        tokio::select! {
            _ = phase => {}
            _ = gate.wait() => {}
        }
        timer.abort();

        let source = gate.outcome().unwrap_or(CompletionSource::Callback);
        if source == CompletionSource::Timeout {
            warn!(
                timeout_ms = self.config.reasoning_timeout().as_millis() as u64,
                "Reasoning phase timed out, continuing with partial reasoning"
            );
            if let Some(task) = backend_task {
                task.abort();
            }
        }

        rctx.reasoning.finalize();
        sink.send(Delta::status(status::REASONING_COMPLETE));
        source
    }

    async fn respond(
        &self,
        history: &[Message],
        rctx: &mut RequestContext,
        tool_ctx: &ToolContext,
    ) -> FinsightResult<Vec<Message>> {
        let chat_id = rctx.chat_id;
        let sink = &tool_ctx.sink;
        let tools: Vec<SkillDescriptor> = self
            .skills
            .list_descriptors()
            .into_iter()
            .cloned()
            .collect();

        let mut window = ContextWindow::with_history(self.config.max_history, history);
        window.set_system_prompt(answer_prompt(
            rctx.reasoning.text(),
            rctx.reasoning.is_simple_query(),
        ));

        let mut generated = Vec::new();

        for step in 0..self.config.max_steps {
            let (mut rx, handle) = self
                .answer
                .chat_stream(window.system_prompt(), window.messages(), &tools)
                .await?;

            while let Some(event) = rx.recv().await {
                match event {
                    StreamEvent::TextDelta { text } => {
                        if rctx.mark_responding() {
                            sink.send(Delta::status(status::RESPONDING));
                        }
                        sink.token(text);
                    }
                    StreamEvent::Error { message } => {
                        warn!(error = %message, "Answer stream reported an error");
                    }
                    _ => {}
                }
            }

            let response = handle
                .await
                .map_err(|e| FinsightError::Agent(format!("Answer task ended abnormally: {e}")))??;

            match response {
                LlmResponse::Done(text) | LlmResponse::Text(text) => {
                    if !text.is_empty() {
                        let message = Message::assistant(text, chat_id);
                        window.push(message.clone());
                        generated.push(message);
                    }
                    info!(chat_id = %chat_id, steps = step + 1, "Answer phase complete");
                    return Ok(generated);
                }
                LlmResponse::ToolUse {
                    content,
                    tool_calls,
                } => {
                    let mut message = Message::assistant(content.unwrap_or_default(), chat_id);
                    message
                        .metadata
                        .insert("tool_calls".into(), serde_json::to_value(&tool_calls)?);
                    window.push(message.clone());
                    generated.push(message);

                    for result in self.execute_tools(tool_calls, rctx, tool_ctx).await {
                        let message = Message::tool(&result, chat_id);
                        window.push(message.clone());
                        generated.push(message);
                    }
                }
            }
        }

        warn!(chat_id = %chat_id, max_steps = self.config.max_steps, "Answer phase reached its step limit");
        Ok(generated)
    }

    /// Runs a batch of tool calls concurrently; results keep call order.
    ///
    /// Tools that write an artifact serialize on [`ToolContext::claim_artifact`],
    /// so one `id` through `finish` run never interleaves with another.
    async fn execute_tools(
        &self,
        calls: Vec<ToolCall>,
        rctx: &mut RequestContext,
        ctx: &ToolContext,
    ) -> Vec<ToolResult> {
        let pending: Vec<_> = calls
            .into_iter()
            .map(|call| {
                let admitted = rctx.admit_tool_call(&call);
                async move {
                    if admitted {
                        self.invoke(call, ctx).await
                    } else {
                        warn!(tool = %call.name, call_id = %call.id, "Skipping duplicate tool call");
                        let message = format!("Duplicate call to {} skipped", call.name);
                        ToolResult::error(call.id, message)
                    }
                }
            })
            .collect();
        join_all(pending).await
    }

    async fn invoke(&self, call: ToolCall, ctx: &ToolContext) -> ToolResult {
        let call_id = call.id.clone();
        let name = call.name.clone();
        info!(chat_id = %ctx.chat_id, tool = %name, call_id = %call_id, "Executing tool call");

        match self.skills.execute(call, ctx).await {
            Ok(result) => result,
            Err(e) => {
                error!(tool = %name, error = %e, "Tool execution failed");
                ToolResult::error(call_id, e.to_string())
            }
        }
    }
}
