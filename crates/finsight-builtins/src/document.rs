use crate::draft::stream_draft;
use async_trait::async_trait;
use finsight_agent::prompts::{document_prompt, update_document_prompt};
use finsight_agent::LlmClient;
use finsight_core::{FinsightResult, ToolCall, ToolResult};
use finsight_protocol::{ArtifactKind, Delta};
use finsight_skills::{required_str, Skill, SkillDescriptor, ToolContext};
use finsight_store::Document;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

const DRAFTABLE_KINDS: [&str; 3] = ["text", "code", "sheet"];

/// Drafts a new document and streams it into the artifact.
pub struct CreateDocumentSkill {
    descriptor: SkillDescriptor,
    llm: LlmClient,
}

impl CreateDocumentSkill {
    pub fn new(llm: LlmClient) -> Self {
        Self {
            descriptor: SkillDescriptor {
                name: "create_document".to_string(),
                description: "Create a document for writing or content creation. The \
                              content is drafted from the title and shown to the user."
                    .to_string(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "title": {"type": "string", "description": "Document title"},
                        "kind": {"type": "string", "enum": DRAFTABLE_KINDS}
                    },
                    "required": ["title", "kind"]
                }),
            },
            llm,
        }
    }
}

#[async_trait]
impl Skill for CreateDocumentSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall, ctx: &ToolContext) -> FinsightResult<ToolResult> {
        let title = required_str(&call, "title")?;
        let kind_name = required_str(&call, "kind")?;
        let Some(kind) = ArtifactKind::parse(kind_name).filter(|k| {
            DRAFTABLE_KINDS.contains(&k.as_str())
        }) else {
            return Ok(ToolResult::error(
                &call.id,
                format!("Unsupported document kind '{kind_name}'"),
            ));
        };

        let id = Uuid::new_v4();
        let _artifact = ctx.claim_artifact().await;
        let sink = &ctx.sink;
        sink.send(Delta::Id(id.to_string()));
        sink.send(Delta::Kind(kind));
        sink.send(Delta::Title(title.to_string()));
        sink.send(Delta::Clear);

        let content = stream_draft(
            &self.llm,
            &document_prompt(kind.as_str()),
            title,
            kind,
            ctx.chat_id,
            sink,
        )
        .await?;

        let document = Document::new(id, ctx.chat_id, title, kind, ctx.user_id.clone(), content);
        ctx.store.save_document(&document).await?;
        sink.send(Delta::Finish);
        info!(document_id = %id, kind = %kind, "Document created");

        Ok(ToolResult::success(
            &call.id,
            json!({
                "id": id.to_string(),
                "title": title,
                "kind": kind,
                "content": "A document was created and is now visible to the user."
            }),
        ))
    }
}

/// Redrafts an existing document from a change description.
pub struct UpdateDocumentSkill {
    descriptor: SkillDescriptor,
    llm: LlmClient,
}

impl UpdateDocumentSkill {
    pub fn new(llm: LlmClient) -> Self {
        Self {
            descriptor: SkillDescriptor {
                name: "update_document".to_string(),
                description: "Update a document with the given description of changes."
                    .to_string(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "id": {"type": "string", "description": "The ID of the document to update"},
                        "description": {"type": "string", "description": "The changes to make"}
                    },
                    "required": ["id", "description"]
                }),
            },
            llm,
        }
    }
}

#[async_trait]
impl Skill for UpdateDocumentSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall, ctx: &ToolContext) -> FinsightResult<ToolResult> {
        let raw_id = required_str(&call, "id")?;
        let description = required_str(&call, "description")?;

        let Ok(id) = Uuid::parse_str(raw_id) else {
            return Ok(ToolResult::error(&call.id, format!("Invalid document id '{raw_id}'")));
        };
        let Some(current) = ctx.store.get_document(id).await? else {
            return Ok(ToolResult::error(&call.id, "Document not found"));
        };
        if current.user_id != ctx.user_id {
            return Ok(ToolResult::error(&call.id, "Document not found"));
        }

        let _artifact = ctx.claim_artifact().await;
        ctx.sink.send(Delta::Clear);
        let content = stream_draft(
            &self.llm,
            &update_document_prompt(current.kind.as_str(), &current.content),
            description,
            current.kind,
            ctx.chat_id,
            &ctx.sink,
        )
        .await?;

        ctx.store.save_document(&current.revised(content)).await?;
        ctx.sink.send(Delta::Finish);
        info!(document_id = %id, "Document updated");

        Ok(ToolResult::success(
            &call.id,
            json!({
                "id": id.to_string(),
                "title": current.title,
                "kind": current.kind,
                "content": "The document has been updated successfully."
            }),
        ))
    }
}
