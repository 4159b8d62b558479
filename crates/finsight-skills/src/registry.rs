use crate::context::ToolContext;
use crate::skill::{Skill, SkillDescriptor};
use finsight_core::{FinsightError, FinsightResult, ToolCall, ToolResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Central registry for the tools offered to the model.
pub struct SkillRegistry {
    skills: BTreeMap<String, Arc<dyn Skill>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self {
            skills: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, skill: Arc<dyn Skill>) {
        let name = skill.descriptor().name.clone();
        info!(skill = %name, "Registered skill");
        self.skills.insert(name, skill);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Skill>> {
        self.skills.get(name)
    }

    /// Descriptors in name order, so the advertised tool list is stable.
    pub fn list_descriptors(&self) -> Vec<&SkillDescriptor> {
        self.skills.values().map(|s| s.descriptor()).collect()
    }

    /// Executes a tool call against the named skill.
    pub async fn execute(&self, call: ToolCall, ctx: &ToolContext) -> FinsightResult<ToolResult> {
        let skill = self
            .skills
            .get(&call.name)
            .ok_or_else(|| FinsightError::Tool(format!("Unknown tool: {}", call.name)))?;
        skill.execute(call, ctx).await
    }

    pub fn skill_count(&self) -> usize {
        self.skills.len()
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}
