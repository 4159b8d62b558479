use async_trait::async_trait;
use finsight_core::{FinsightResult, ToolCall, ToolResult};
use finsight_data::{AnalyticsClient, FetchFailure};
use finsight_protocol::{ArtifactKind, Delta, ToolStage, ToolStatus};
use finsight_skills::{required_str, Skill, SkillDescriptor, ToolContext};
use finsight_store::Document;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

const TOOL: &str = "request_template_update";

/// One templated sub-document of a chat's financial model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    UserInput,
    Development,
    Revenue,
    Returns,
    Cashflow,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 5] = [
        TemplateKind::UserInput,
        TemplateKind::Development,
        TemplateKind::Revenue,
        TemplateKind::Returns,
        TemplateKind::Cashflow,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TemplateKind::UserInput => "user_input",
            TemplateKind::Development => "development",
            TemplateKind::Revenue => "revenue",
            TemplateKind::Returns => "returns",
            TemplateKind::Cashflow => "cashflow",
        }
    }

    /// Title of the sheet document holding this template.
    pub fn title(self) -> &'static str {
        match self {
            TemplateKind::UserInput => "User Inputs",
            TemplateKind::Development => "Development Template",
            TemplateKind::Revenue => "Revenue Template",
            TemplateKind::Returns => "Returns Template",
            TemplateKind::Cashflow => "Cashflow Template",
        }
    }

    /// Finds this template in the service's answer.
    ///
    /// User inputs may also arrive as a `template_update` entry of the
    /// `templates` list, which wins over `user_input_template`.
    fn locate(self, templates: &Value) -> Option<&Value> {
        if self == TemplateKind::UserInput {
            let entry = templates
                .get("templates")
                .and_then(Value::as_array)
                .and_then(|list| {
                    list.iter().find(|t| {
                        t["type"] == "template_update" && t["template_type"] == "user_input"
                    })
                });
            if entry.is_some() {
                return entry;
            }
        }
        let key = format!("{}_template", self.as_str());
        templates.get(key.as_str()).filter(|v| !v.is_null())
    }

    fn render(self, template: &Value) -> String {
        let rows = match self {
            TemplateKind::UserInput => user_input_rows(template),
            TemplateKind::Development => column_rows(template, true),
            TemplateKind::Revenue => column_rows(template, false),
            TemplateKind::Returns => returns_rows(template),
            TemplateKind::Cashflow => cashflow_rows(template),
        };
        to_csv(&rows)
    }
}

type Row = Vec<String>;

/// Text of one cell; `{ "value": .. }` wrappers are unwrapped.
fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("value") {
            Some(inner) => cell(inner),
            None => value.to_string(),
        },
        other => other.to_string(),
    }
}

fn object(value: &Value) -> Option<&Map<String, Value>> {
    value.as_object()
}

/// Dotted paths (`section.subsection.field`) become labelled rows.
fn user_input_rows(template: &Value) -> Vec<Row> {
    let data = template.get("data").unwrap_or(template);
    let mut rows = vec![["Section", "Subsection", "Field", "Value"]
        .map(String::from)
        .to_vec()];
    let Some(fields) = object(data) else {
        return rows;
    };
    for (path, value) in fields {
        if template.get("data").is_none() && matches!(path.as_str(), "type" | "template_type") {
            continue;
        }
        let parts: Vec<&str> = path.split('.').collect();
        let subsection = if parts.len() > 2 { parts[1] } else { "" };
        let field = parts.last().copied().unwrap_or_default();
        rows.push(vec![
            parts[0].replace('_', " "),
            subsection.replace('_', " "),
            field.replace('_', " "),
            cell(value),
        ]);
    }
    rows
}

/// Column-described tables: a header of column names, then each section's
/// title, rows and totals.
fn column_rows(template: &Value, spaced: bool) -> Vec<Row> {
    let columns: Vec<String> = template
        .get("columns")
        .and_then(Value::as_array)
        .map(|cols| cols.iter().map(|c| cell(&c["name"])).collect())
        .unwrap_or_default();
    let line = |row: &Value| -> Row {
        match row {
            Value::Array(cells) => cells.iter().map(cell).collect(),
            Value::Object(map) if !columns.is_empty() => {
                columns.iter().map(|c| map.get(c).map(cell).unwrap_or_default()).collect()
            }
            Value::Object(map) => map.values().map(cell).collect(),
            other => vec![cell(other)],
        }
    };

    let mut rows = Vec::new();
    if !columns.is_empty() {
        rows.push(columns.clone());
    }
    for section in template.get("sections").and_then(Value::as_array).into_iter().flatten() {
        if spaced {
            rows.push(Vec::new());
        }
        let mut title = vec![cell(&section["name"])];
        title.resize(columns.len().max(1), String::new());
        rows.push(title);
        for row in section.get("rows").and_then(Value::as_array).into_iter().flatten() {
            rows.push(line(row));
        }
        if let Some(totals) = section.get("totals").filter(|t| !t.is_null()) {
            rows.push(line(totals));
        }
    }
    if let Some(metrics) = template.get("metrics").and_then(object) {
        rows.push(Vec::new());
        rows.push(vec!["Metrics".to_string()]);
        for (name, value) in metrics {
            rows.push(vec![name.clone(), cell(value)]);
        }
    }
    rows
}

/// Sections whose headers are the union of their row keys.
fn returns_rows(template: &Value) -> Vec<Row> {
    let mut rows = Vec::new();
    if let Some(title) = template.get("title").filter(|t| !t.is_null()) {
        rows.push(vec![cell(title)]);
        rows.push(Vec::new());
    }
    if let Some(notes) = template.pointer("/metadata/notes").filter(|n| !n.is_null()) {
        rows.push(vec![cell(notes)]);
        rows.push(Vec::new());
    }
    for section in template.get("sections").and_then(Value::as_array).into_iter().flatten() {
        let body: Vec<&Map<String, Value>> = section
            .get("rows")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(object)
            .collect();
        let totals = section.get("totals").and_then(object);

        let mut headers: Vec<&str> = Vec::new();
        for map in body.iter().copied().chain(totals) {
            for key in map.keys() {
                if !headers.contains(&key.as_str()) {
                    headers.push(key);
                }
            }
        }

        rows.push(vec![cell(&section["name"])]);
        rows.push(headers.iter().map(|h| h.to_string()).collect());
        for map in body.iter().copied().chain(totals) {
            rows.push(
                headers
                    .iter()
                    .map(|h| map.get(*h).map(cell).unwrap_or_default())
                    .collect(),
            );
        }
        rows.push(Vec::new());
    }
    rows
}

/// The first section only: its header line, then one line per row.
fn cashflow_rows(template: &Value) -> Vec<Row> {
    let mut rows = Vec::new();
    let Some(section) = template.pointer("/sections/0") else {
        return rows;
    };
    if let Some(headers) = section.get("headers").and_then(Value::as_array) {
        rows.push(headers.iter().map(cell).collect());
    }
    for row in section.get("rows").and_then(Value::as_array).into_iter().flatten() {
        match row {
            Value::Array(cells) => rows.push(cells.iter().map(cell).collect()),
            Value::Object(map) => rows.push(
                map.iter()
                    .map(|(key, value)| match (key.as_str(), value) {
                        ("Line Item" | "0", Value::String(label)) => label.clone(),
                        ("Line Item" | "0", other) => other.to_string(),
                        (_, value) => cell(value),
                    })
                    .collect(),
            ),
            other => rows.push(vec![cell(other)]),
        }
    }
    rows
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn to_csv(rows: &[Row]) -> String {
    rows.iter()
        .map(|row| row.iter().map(|f| quote(f)).collect::<Vec<_>>().join(","))
        .collect::<Vec<_>>()
        .join("\r\n")
}

fn version_of(document: &Document) -> u64 {
    document
        .metadata
        .as_ref()
        .and_then(|m| m.get("version"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

fn failure(call_id: &str, failure: &FetchFailure) -> ToolResult {
    ToolResult {
        call_id: call_id.to_string(),
        content: json!({ "error": failure.to_string(), "isTimeout": failure.is_timeout }),
        is_error: true,
    }
}

/// Re-derives a chat's model templates and stores each changed one as a
/// versioned sheet document.
///
/// Every template type owns one document per chat. A changed template adds a
/// version to that document with `metadata.version` one past the latest.
pub struct TemplateUpdateSkill {
    descriptor: SkillDescriptor,
    client: AnalyticsClient,
}

impl TemplateUpdateSkill {
    pub fn new(client: AnalyticsClient) -> Self {
        Self {
            descriptor: SkillDescriptor {
                name: TOOL.to_string(),
                description: "Update the chat's financial model templates (inputs, development, \
                              revenue, returns, cashflow) after the user changes an assumption."
                    .to_string(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "userQuery": {
                            "type": "string",
                            "description": "The user query that might trigger a template update"
                        }
                    },
                    "required": ["userQuery"]
                }),
            },
            client,
        }
    }

    /// Saves `csv` as the next version of the chat's `kind` sheet. Returns
    /// `None` when it matches the latest saved version.
    async fn store(
        &self,
        ctx: &ToolContext,
        kind: TemplateKind,
        csv: String,
        user_query: &str,
    ) -> FinsightResult<Option<Value>> {
        let latest = ctx
            .store
            .documents_by_chat(ctx.chat_id, Some(ArtifactKind::Sheet))
            .await?
            .into_iter()
            .filter(|doc| {
                doc.metadata
                    .as_ref()
                    .is_some_and(|m| m["templateType"] == kind.as_str())
            })
            .max_by_key(version_of);

        if latest.as_ref().is_some_and(|doc| doc.content == csv) {
            debug!(template = kind.as_str(), "Template unchanged");
            return Ok(None);
        }

        let (document, version) = match latest {
            Some(doc) => {
                let version = version_of(&doc) + 1;
                (doc.revised(csv), version)
            }
            None => (
                Document::new(
                    Uuid::new_v4(),
                    ctx.chat_id,
                    kind.title(),
                    ArtifactKind::Sheet,
                    ctx.user_id.clone(),
                    csv,
                ),
                1,
            ),
        };
        let metadata = json!({
            "templateType": kind.as_str(),
            "version": version,
            "updatedAt": document.created_at.to_rfc3339(),
            "trigger": { "messageId": "system", "content": user_query },
        });
        let document = document.with_metadata(metadata);
        ctx.store.save_document(&document).await?;
        info!(template = kind.as_str(), document_id = %document.id, version, "Saved template");

        Ok(Some(json!({
            "templateType": kind.as_str(),
            "documentId": document.id.to_string(),
            "version": version,
        })))
    }

    async fn store_all(
        &self,
        ctx: &ToolContext,
        templates: &Value,
        user_query: &str,
    ) -> FinsightResult<Vec<Value>> {
        let mut updated = Vec::new();
        for kind in TemplateKind::ALL {
            let Some(template) = kind.locate(templates) else {
                continue;
            };
            let csv = kind.render(template);
            if csv.is_empty() {
                continue;
            }
            if let Some(entry) = self.store(ctx, kind, csv, user_query).await? {
                updated.push(entry);
            }
        }
        Ok(updated)
    }
}

#[async_trait]
impl Skill for TemplateUpdateSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall, ctx: &ToolContext) -> FinsightResult<ToolResult> {
        let user_query = required_str(&call, "userQuery")?;
        ctx.sink.send(Delta::ToolStatus(
            ToolStatus::new(TOOL, ToolStage::Loading).with_message("Updating model templates"),
        ));

        let chat_id = ctx.chat_id.to_string();
        let templates = match self
            .client
            .update_assumptions(&chat_id, user_query, &ctx.user_id)
            .await
        {
            Ok(templates) => templates,
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "Template update failed");
                ctx.sink.send(Delta::ToolStatus(ToolStatus::failed(
                    TOOL,
                    e.message.clone(),
                    e.is_timeout,
                )));
                return Ok(failure(&call.id, &e));
            }
        };

        let updated = match self.store_all(ctx, &templates, user_query).await {
            Ok(updated) => updated,
            Err(e) => {
                ctx.sink
                    .send(Delta::ToolStatus(ToolStatus::failed(TOOL, e.to_string(), false)));
                return Err(e);
            }
        };

        let changed: Vec<&str> = updated
            .iter()
            .filter_map(|u| u["templateType"].as_str())
            .collect();
        let message = if changed.is_empty() {
            "No template changes".to_string()
        } else {
            format!("Updated: {}", changed.join(", "))
        };
        ctx.sink.send(Delta::ToolStatus(
            ToolStatus::new(TOOL, ToolStage::Ready).with_message(message),
        ));

        Ok(ToolResult::success(
            &call.id,
            json!({
                "success": true,
                "message": "Templates updated successfully",
                "updatedTemplates": updated,
            }),
        ))
    }
}
