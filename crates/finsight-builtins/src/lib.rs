//! The fixed tool set offered to the answer model.
//!
//! # Main entry points
//!
//! - [`register_builtins()`]: Register every built-in tool.
//! - [`BuiltinServices`]: Shared clients the tools are built from.

/// Document create/update tools.
pub mod document;
/// Shared streaming draft helper.
mod draft;
/// Financial series and ranking tools.
pub mod financial;
/// News lookup tool.
pub mod news;
/// Writing suggestions tool.
pub mod suggestions;
/// Model template update tool.
pub mod template;
/// Weather lookup tool.
pub mod weather;

pub use document::{CreateDocumentSkill, UpdateDocumentSkill};
pub use financial::{FinancialSeriesSkill, RankingSkill};
pub use news::GetNewsSkill;
pub use suggestions::{RequestSuggestionsSkill, Suggestion};
pub use template::{TemplateKind, TemplateUpdateSkill};
pub use weather::{GetWeatherSkill, WeatherConfig};

use finsight_agent::LlmClient;
use finsight_data::FinancialPipeline;
use finsight_skills::SkillRegistry;
use std::sync::Arc;

/// Clients shared by the built-in tools.
#[derive(Debug, Clone)]
pub struct BuiltinServices {
    /// Model used for drafting documents, suggestions and news.
    pub llm: LlmClient,
    pub pipeline: FinancialPipeline,
    pub weather: WeatherConfig,
}

/// Register all built-in tools into the given registry.
pub fn register_builtins(registry: &mut SkillRegistry, services: BuiltinServices) {
    registry.register(Arc::new(GetWeatherSkill::new(services.weather)));
    registry.register(Arc::new(CreateDocumentSkill::new(services.llm.clone())));
    registry.register(Arc::new(UpdateDocumentSkill::new(services.llm.clone())));
    registry.register(Arc::new(RequestSuggestionsSkill::new(services.llm.clone())));
    registry.register(Arc::new(FinancialSeriesSkill::new(services.pipeline.clone())));
    registry.register(Arc::new(TemplateUpdateSkill::new(services.pipeline.client().clone())));
    registry.register(Arc::new(RankingSkill::new(services.pipeline)));
    registry.register(Arc::new(GetNewsSkill::new(services.llm)));
}
