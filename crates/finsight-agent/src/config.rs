use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI-compatible providers the client knows default endpoints for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    OpenRouter,
    /// Groq cloud inference.
    Groq,
    /// DeepSeek; its reasoner model streams `reasoning_content`.
    DeepSeek,
    /// Local Ollama server.
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: LlmProvider,
    pub model_id: String,
    #[serde(default)]
    pub api_key: String,
    pub api_base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

impl ModelConfig {
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url
        } else {
            match self.provider {
                LlmProvider::OpenAi => "https://api.openai.com",
                LlmProvider::OpenRouter => "https://openrouter.ai/api",
                LlmProvider::Groq => "https://api.groq.com/openai",
                LlmProvider::DeepSeek => "https://api.deepseek.com",
                LlmProvider::Ollama => "http://localhost:11434",
            }
        }
    }
}

/// Knobs of the two-phase run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Hard cap on phase 1 before phase 2 starts anyway.
    #[serde(default = "default_reasoning_timeout_secs")]
    pub reasoning_timeout_secs: u64,
    /// Sub-second override of the phase-1 cap; wins when set.
    #[serde(default)]
    pub reasoning_timeout_ms: Option<u64>,
    /// Maximum answer-model round trips (tool calls included).
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// History messages kept in each prompt.
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

fn default_reasoning_timeout_secs() -> u64 {
    30
}

fn default_max_steps() -> u32 {
    5
}

fn default_max_history() -> usize {
    100
}

impl OrchestratorConfig {
    pub fn reasoning_timeout(&self) -> Duration {
        match self.reasoning_timeout_ms {
            Some(ms) => Duration::from_millis(ms),
            None => Duration::from_secs(self.reasoning_timeout_secs),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            reasoning_timeout_secs: default_reasoning_timeout_secs(),
            reasoning_timeout_ms: None,
            max_steps: default_max_steps(),
            max_history: default_max_history(),
        }
    }
}
