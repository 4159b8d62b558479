use super::LlmBackend;
use crate::config::{LlmProvider, ModelConfig};
use crate::llm::LlmResponse;
use crate::stream::StreamEvent;
use async_trait::async_trait;
use finsight_core::{FinsightError, FinsightResult, Message, Role, ToolCall};
use finsight_skills::SkillDescriptor;
use futures_util::StreamExt;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// OpenAI-compatible API backend.
///
/// Works with OpenAI, OpenRouter, Groq, DeepSeek, Ollama, and any other
/// provider that implements the chat completions API. Reasoning output is
/// read from `delta.reasoning_content` (DeepSeek) or `delta.reasoning`
/// (OpenRouter).
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn build_messages(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
    ) -> Vec<serde_json::Value> {
        let mut api_messages: Vec<serde_json::Value> = Vec::new();

        if let Some(sys) = system_prompt {
            api_messages.push(serde_json::json!({
                "role": "system",
                "content": sys
            }));
        }

        for m in messages {
            let role = match m.role {
                Role::System => continue,
                Role::User | Role::Tool => "user",
                Role::Assistant => "assistant",
            };
            api_messages.push(serde_json::json!({
                "role": role,
                "content": m.content
            }));
        }

        api_messages
    }

    fn build_tools(&self, tools: &[SkillDescriptor]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters_schema,
                    }
                })
            })
            .collect()
    }

    fn build_body(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[SkillDescriptor],
        stream: bool,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": self.build_messages(system_prompt, messages),
        });
        if stream {
            body["stream"] = serde_json::json!(true);
        }
        if !tools.is_empty() {
            body["tools"] = serde_json::json!(self.build_tools(tools));
        }
        body
    }

    fn add_provider_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("Content-Type", "application/json");
        let request = if self.config.api_key.is_empty() {
            request
        } else {
            request.header("Authorization", format!("Bearer {}", self.config.api_key))
        };

        // OpenRouter requires extra headers
        if matches!(self.config.provider, LlmProvider::OpenRouter) {
            request.header("X-Title", "finsight")
        } else {
            request
        }
    }

    async fn send(&self, body: &serde_json::Value) -> FinsightResult<reqwest::Response> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());
        self.add_provider_headers(self.http.post(&url))
            .json(body)
            .send()
            .await
            .map_err(|e| FinsightError::Http(e.to_string()))
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn chat(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[SkillDescriptor],
    ) -> FinsightResult<LlmResponse> {
        let body = self.build_body(system_prompt, messages, tools, false);
        let resp = self.send(&body).await?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| FinsightError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(FinsightError::Http(format!(
                "OpenAI API error {status}: {resp_body}"
            )));
        }

        parse_openai_response(&resp_body)
    }

    async fn chat_stream(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[SkillDescriptor],
    ) -> FinsightResult<(
        mpsc::Receiver<StreamEvent>,
        JoinHandle<FinsightResult<LlmResponse>>,
    )> {
        let body = self.build_body(system_prompt, messages, tools, true);
        let resp = self.send(&body).await?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(FinsightError::Http(format!(
                "OpenAI API error {status}: {error_body}"
            )));
        }

        let (tx, rx) = mpsc::channel::<StreamEvent>(256);
        let mut byte_stream = resp.bytes_stream();

        let handle = tokio::spawn(async move {
            let mut buffer: Vec<u8> = Vec::new();
            let mut state = SseState::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx
                            .send(StreamEvent::Error {
                                message: format!("Stream read error: {e}"),
                            })
                            .await;
                        return Err(FinsightError::Http(format!("Stream read error: {e}")));
                    }
                };

                buffer.extend_from_slice(&chunk);
                while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&raw);
                    for event in state.handle_line(&line) {
                        let _ = tx.send(event).await;
                    }
                }
            }

            Ok(state.finish())
        });

        Ok((rx, handle))
    }
}

/// Accumulates one streamed completion from its SSE lines.
#[derive(Debug)]
pub struct SseState {
    full_text: String,
    tool_calls: BTreeMap<u64, (String, String, String)>,
    finish_reason: String,
}

impl Default for SseState {
    fn default() -> Self {
        Self {
            full_text: String::new(),
            tool_calls: BTreeMap::new(),
            finish_reason: "stop".to_string(),
        }
    }
}

impl SseState {
    /// Consumes one SSE line and returns the events it produced.
    pub fn handle_line(&mut self, line: &str) -> Vec<StreamEvent> {
        let line = line.trim();
        if line.is_empty() || line.starts_with(':') {
            return Vec::new();
        }
        let Some(data) = line.strip_prefix("data:").map(str::trim) else {
            return Vec::new();
        };
        if data == "[DONE]" {
            return vec![StreamEvent::Done];
        }
        let Ok(event) = serde_json::from_str::<serde_json::Value>(data) else {
            return Vec::new();
        };

        let mut events = Vec::new();
        let choice = &event["choices"][0];
        let delta = &choice["delta"];

        let reasoning = delta["reasoning_content"]
            .as_str()
            .or_else(|| delta["reasoning"].as_str())
            .unwrap_or_default();
        if !reasoning.is_empty() {
            events.push(StreamEvent::ReasoningDelta {
                text: reasoning.to_string(),
            });
        }

        if let Some(content) = delta["content"].as_str() {
            if !content.is_empty() {
                self.full_text.push_str(content);
                events.push(StreamEvent::TextDelta {
                    text: content.to_string(),
                });
            }
        }

        if let Some(tc_array) = delta["tool_calls"].as_array() {
            for tc in tc_array {
                let idx = tc["index"].as_u64().unwrap_or(0);

                if let Some(id) = tc["id"].as_str() {
                    let name = tc["function"]["name"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string();
                    self.tool_calls
                        .insert(idx, (id.to_string(), name.clone(), String::new()));
                    events.push(StreamEvent::ToolCallStart {
                        id: id.to_string(),
                        name,
                    });
                }

                if let Some(args_delta) = tc["function"]["arguments"].as_str() {
                    if let Some(entry) = self.tool_calls.get_mut(&idx) {
                        if !args_delta.is_empty() {
                            entry.2.push_str(args_delta);
                            events.push(StreamEvent::ToolCallDelta {
                                id: entry.0.clone(),
                                arguments_delta: args_delta.to_string(),
                            });
                        }
                    }
                }
            }
        }

        if let Some(fr) = choice["finish_reason"].as_str() {
            self.finish_reason = fr.to_string();
            if fr == "tool_calls" {
                for (id, _, _) in self.tool_calls.values() {
                    events.push(StreamEvent::ToolCallEnd { id: id.clone() });
                }
            }
            events.push(StreamEvent::Done);
        }

        events
    }

    /// The aggregated response once the stream has ended.
    pub fn finish(self) -> LlmResponse {
        if !self.tool_calls.is_empty() {
            let tool_calls = self
                .tool_calls
                .into_values()
                .map(|(id, name, args_json)| ToolCall {
                    id,
                    name,
                    arguments: serde_json::from_str(&args_json).unwrap_or_default(),
                })
                .collect();
            LlmResponse::ToolUse {
                content: (!self.full_text.is_empty()).then_some(self.full_text),
                tool_calls,
            }
        } else if self.finish_reason == "stop" {
            LlmResponse::Done(self.full_text)
        } else {
            LlmResponse::Text(self.full_text)
        }
    }
}

pub fn parse_openai_response(body: &serde_json::Value) -> FinsightResult<LlmResponse> {
    let choice = &body["choices"][0];
    if choice.is_null() {
        return Err(FinsightError::Http(format!(
            "OpenAI API returned no choices: {body}"
        )));
    }
    let message = &choice["message"];
    let content = message["content"].as_str().unwrap_or_default().to_string();

    if let Some(tool_calls_json) = message["tool_calls"].as_array() {
        let tool_calls: Vec<ToolCall> = tool_calls_json
            .iter()
            .filter_map(|tc| {
                let id = tc["id"].as_str()?.to_string();
                let name = tc["function"]["name"].as_str()?.to_string();
                let arguments: serde_json::Value =
                    serde_json::from_str(tc["function"]["arguments"].as_str()?).unwrap_or_default();
                Some(ToolCall {
                    id,
                    name,
                    arguments,
                })
            })
            .collect();

        Ok(LlmResponse::ToolUse {
            content: (!content.is_empty()).then_some(content),
            tool_calls,
        })
    } else {
        let finish_reason = choice["finish_reason"].as_str().unwrap_or("stop");
        if finish_reason == "stop" {
            Ok(LlmResponse::Done(content))
        } else {
            Ok(LlmResponse::Text(content))
        }
    }
}
