//! Two-phase generation: a reasoning pass, then a tool-using answer pass,
//! multiplexed onto one outbound delta stream per request.

pub mod backends;
pub mod config;
pub mod context;
pub mod gate;
pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod stream;

pub use backends::LlmBackend;
pub use config::{LlmProvider, ModelConfig, OrchestratorConfig};
pub use context::{ContextWindow, ReasoningBuffer, RequestContext, SIMPLE_QUERY_MARKER};
pub use gate::{CompletionGate, CompletionSource};
pub use llm::{LlmClient, LlmResponse};
pub use orchestrator::{Orchestrator, TurnRequest, TOP_LEVEL_ERROR};
pub use stream::StreamEvent;
