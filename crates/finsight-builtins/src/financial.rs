use async_trait::async_trait;
use finsight_core::{FinsightResult, ToolCall, ToolResult};
use finsight_data::pipeline::{RANKING_TOOL, SERIES_TOOL};
use finsight_data::{tool_summary, DocumentTarget, FinancialPipeline, PipelineError};
use finsight_skills::{optional_str, required_str, Skill, SkillDescriptor, ToolContext};
use serde_json::json;

const DEFAULT_TIME_RANGE: &str = "1y";

fn failure(call_id: &str, err: &PipelineError) -> ToolResult {
    ToolResult {
        call_id: call_id.to_string(),
        content: json!({ "error": err.to_string(), "isTimeout": err.is_timeout() }),
        is_error: true,
    }
}

/// Historical series or fundamentals for one or more instruments.
pub struct FinancialSeriesSkill {
    descriptor: SkillDescriptor,
    pipeline: FinancialPipeline,
}

impl FinancialSeriesSkill {
    pub fn new(pipeline: FinancialPipeline) -> Self {
        Self {
            descriptor: SkillDescriptor {
                name: SERIES_TOOL.to_string(),
                description: "Retrieve and chart historical prices, returns or fundamentals \
                              for stocks, indices, commodities, crypto or US macro series."
                    .to_string(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The user's data request, e.g. \"AAPL vs MSFT price last year\""
                        },
                        "time_range": {
                            "type": "string",
                            "description": "Period such as 1m, 6m, 1y, 5y, ytd (default 1y)"
                        }
                    },
                    "required": ["query"]
                }),
            },
            pipeline,
        }
    }
}

#[async_trait]
impl Skill for FinancialSeriesSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall, ctx: &ToolContext) -> FinsightResult<ToolResult> {
        let query = required_str(&call, "query")?;
        let time_range = optional_str(&call, "time_range").unwrap_or(DEFAULT_TIME_RANGE);
        let target = DocumentTarget::new(ctx.chat_id, ctx.user_id.clone());

        let _artifact = ctx.claim_artifact().await;
        let outcome = self
            .pipeline
            .run_query(query, time_range, &target, &ctx.sink, ctx.store.as_ref())
            .await;
        Ok(match outcome {
            Ok(snapshot) => ToolResult::success(&call.id, tool_summary(target.id, &snapshot)),
            Err(e) => failure(&call.id, &e),
        })
    }
}

/// Ranks the supported universe by a metric.
pub struct RankingSkill {
    descriptor: SkillDescriptor,
    pipeline: FinancialPipeline,
}

impl RankingSkill {
    pub fn new(pipeline: FinancialPipeline) -> Self {
        Self {
            descriptor: SkillDescriptor {
                name: RANKING_TOOL.to_string(),
                description: "Rank or screen the supported universe, e.g. top or bottom \
                              performers over a period."
                    .to_string(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The complete ranking request, e.g. \"top 10 performing stocks this month\""
                        }
                    },
                    "required": ["query"]
                }),
            },
            pipeline,
        }
    }
}

#[async_trait]
impl Skill for RankingSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall, ctx: &ToolContext) -> FinsightResult<ToolResult> {
        let query = required_str(&call, "query")?;
        let target = DocumentTarget::new(ctx.chat_id, ctx.user_id.clone());

        let _artifact = ctx.claim_artifact().await;
        let outcome = self
            .pipeline
            .run_ranking(query, &target, &ctx.sink, ctx.store.as_ref())
            .await;
        Ok(match outcome {
            Ok(snapshot) => ToolResult::success(&call.id, tool_summary(target.id, &snapshot)),
            Err(e) => failure(&call.id, &e),
        })
    }
}
