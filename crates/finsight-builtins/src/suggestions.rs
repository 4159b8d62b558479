use async_trait::async_trait;
use finsight_agent::prompts::SUGGESTIONS_PROMPT;
use finsight_agent::LlmClient;
use finsight_core::{FinsightError, FinsightResult, Message, ToolCall, ToolResult};
use finsight_protocol::Delta;
use finsight_skills::{required_str, Skill, SkillDescriptor, ToolContext};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

/// One proposed edit on a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub document_id: String,
    pub original_sentence: String,
    pub suggested_sentence: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_resolved: bool,
}

/// Parses the model's JSON array, tolerating a surrounding code fence.
fn parse_suggestions(raw: &str, document_id: Uuid) -> FinsightResult<Vec<Suggestion>> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    let mut suggestions: Vec<Suggestion> = serde_json::from_str(body.trim())
        .map_err(|e| FinsightError::Tool(format!("Model returned invalid suggestions: {e}")))?;
    for suggestion in &mut suggestions {
        suggestion.id = Uuid::new_v4().to_string();
        suggestion.document_id = document_id.to_string();
        suggestion.is_resolved = false;
    }
    Ok(suggestions)
}

/// Asks the model for edits on a document and attaches them to the artifact.
pub struct RequestSuggestionsSkill {
    descriptor: SkillDescriptor,
    llm: LlmClient,
}

impl RequestSuggestionsSkill {
    pub fn new(llm: LlmClient) -> Self {
        Self {
            descriptor: SkillDescriptor {
                name: "request_suggestions".to_string(),
                description: "Request suggestions for a document.".to_string(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "documentId": {
                            "type": "string",
                            "description": "The ID of the document to request edits for"
                        }
                    },
                    "required": ["documentId"]
                }),
            },
            llm,
        }
    }
}

#[async_trait]
impl Skill for RequestSuggestionsSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall, ctx: &ToolContext) -> FinsightResult<ToolResult> {
        let raw_id = required_str(&call, "documentId")?;
        let document = match Uuid::parse_str(raw_id) {
            Ok(id) => ctx.store.get_document(id).await?,
            Err(_) => None,
        };
        let Some(document) = document.filter(|d| d.user_id == ctx.user_id) else {
            return Ok(ToolResult::error(&call.id, "Document not found"));
        };

        let messages = [Message::user(document.content.clone(), ctx.chat_id)];
        let response = self
            .llm
            .chat(Some(SUGGESTIONS_PROMPT), &messages, &[])
            .await?;
        let suggestions = parse_suggestions(response.text(), document.id)?;

        let delta = Delta::metadata(&json!({ "suggestions": suggestions }))?;
        {
            let _artifact = ctx.claim_artifact().await;
            ctx.sink.send(delta);
            ctx.sink.send(Delta::Finish);
        }
        info!(document_id = %document.id, count = suggestions.len(), "Suggestions added");

        Ok(ToolResult::success(
            &call.id,
            json!({
                "id": document.id.to_string(),
                "title": document.title,
                "kind": document.kind,
                "message": "Suggestions have been added to the document"
            }),
        ))
    }
}
