use crate::context::ToolContext;
use async_trait::async_trait;
use finsight_core::{FinsightError, FinsightResult, ToolCall, ToolResult};
use serde::{Deserialize, Serialize};

/// Metadata describing a skill's interface, as advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDescriptor {
    pub name: String,
    pub description: String,
    /// JSON schema of the call arguments.
    pub parameters_schema: serde_json::Value,
}

/// Trait that all tools implement.
///
/// `execute` receives the per-request [`ToolContext`], so tools can stream
/// deltas to the client and persist documents for the calling chat. An `Err`
/// is converted into an `{"error": ...}` result by the caller; the model
/// always receives JSON back.
#[async_trait]
pub trait Skill: Send + Sync {
    fn descriptor(&self) -> &SkillDescriptor;

    async fn execute(&self, call: ToolCall, ctx: &ToolContext) -> FinsightResult<ToolResult>;
}

/// Reads a required string argument.
pub fn required_str<'a>(call: &'a ToolCall, key: &str) -> FinsightResult<&'a str> {
    call.arguments[key]
        .as_str()
        .ok_or_else(|| FinsightError::Tool(format!("{}: missing '{key}' argument", call.name)))
}

/// Reads an optional string argument; blank strings count as absent.
pub fn optional_str<'a>(call: &'a ToolCall, key: &str) -> Option<&'a str> {
    call.arguments[key]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
