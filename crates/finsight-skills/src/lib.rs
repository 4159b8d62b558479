//! Tool ("skill") contract shared by the orchestrator and the built-in tools.

pub mod context;
pub mod registry;
pub mod skill;

pub use context::ToolContext;
pub use registry::SkillRegistry;
pub use skill::{optional_str, required_str, Skill, SkillDescriptor};
