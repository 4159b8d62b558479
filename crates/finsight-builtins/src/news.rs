use async_trait::async_trait;
use finsight_agent::prompts::NEWS_PROMPT;
use finsight_agent::LlmClient;
use finsight_core::{FinsightResult, Message, ToolCall, ToolResult};
use finsight_protocol::{Delta, ToolStage, ToolStatus};
use finsight_skills::{optional_str, required_str, Skill, SkillDescriptor, ToolContext};
use serde_json::json;
use tracing::warn;

const TOOL: &str = "get_news";

/// Query text with the optional time and place qualifiers appended.
fn search_query(query: &str, timeframe: Option<&str>, location: Option<&str>) -> String {
    let mut text = query.to_string();
    if let Some(timeframe) = timeframe {
        text.push_str(&format!(" from {timeframe}"));
    }
    if let Some(location) = location {
        text.push_str(&format!(" in {location}"));
    }
    text
}

/// Recent news summarised by the model.
pub struct GetNewsSkill {
    descriptor: SkillDescriptor,
    llm: LlmClient,
}

impl GetNewsSkill {
    pub fn new(llm: LlmClient) -> Self {
        Self {
            descriptor: SkillDescriptor {
                name: TOOL.to_string(),
                description: "Fetch recent news about a topic".to_string(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string", "description": "News search query"},
                        "timeframe": {"type": "string", "description": "e.g. today, this week"},
                        "location": {"type": "string", "description": "e.g. US, Europe, global"}
                    },
                    "required": ["query"]
                }),
            },
            llm,
        }
    }
}

#[async_trait]
impl Skill for GetNewsSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall, ctx: &ToolContext) -> FinsightResult<ToolResult> {
        let query = search_query(
            required_str(&call, "query")?,
            optional_str(&call, "timeframe"),
            optional_str(&call, "location"),
        );

        ctx.sink.send(Delta::ToolStatus(
            ToolStatus::new(TOOL, ToolStage::Loading)
                .with_message(format!("Searching for news about: {query}")),
        ));

        let messages = [Message::user(query.clone(), ctx.chat_id)];
        match self.llm.chat(Some(NEWS_PROMPT), &messages, &[]).await {
            Ok(response) => {
                ctx.sink
                    .send(Delta::ToolStatus(ToolStatus::new(TOOL, ToolStage::Ready)));
                Ok(ToolResult::success(
                    &call.id,
                    json!({
                        "success": true,
                        "query": query,
                        "content": response.text(),
                        "sources": []
                    }),
                ))
            }
            Err(e) => {
                warn!(error = %e, "News lookup failed");
                ctx.sink
                    .send(Delta::ToolStatus(ToolStatus::failed(TOOL, e.to_string(), false)));
                Ok(ToolResult::error(&call.id, format!("Error fetching news: {e}")))
            }
        }
    }
}
