#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use finsight_agent::{LlmBackend, LlmClient, LlmResponse, StreamEvent};
use finsight_builtins::{
    CreateDocumentSkill, GetNewsSkill, GetWeatherSkill, RequestSuggestionsSkill,
    TemplateUpdateSkill, UpdateDocumentSkill, WeatherConfig,
};
use finsight_core::{FinsightResult, Message, ToolCall};
use finsight_data::{AnalyticsClient, AnalyticsConfig};
use finsight_protocol::{ArtifactKind, Delta, DeltaSink, StreamRecord, ToolStage};
use finsight_skills::{Skill, SkillDescriptor, ToolContext};
use finsight_store::{Document, DocumentStore, InMemoryStore};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Streams fixed chunks and answers non-streaming calls with a fixed text.
struct Canned {
    chunks: Vec<&'static str>,
    reply: &'static str,
}

fn canned(chunks: Vec<&'static str>, reply: &'static str) -> LlmClient {
    LlmClient::from_backend(Arc::new(Canned { chunks, reply }))
}

#[async_trait]
impl LlmBackend for Canned {
    async fn chat(
        &self,
        _system_prompt: Option<&str>,
        _messages: &[Message],
        _tools: &[SkillDescriptor],
    ) -> FinsightResult<LlmResponse> {
        Ok(LlmResponse::Done(self.reply.to_string()))
    }

    async fn chat_stream(
        &self,
        _system_prompt: Option<&str>,
        _messages: &[Message],
        _tools: &[SkillDescriptor],
    ) -> FinsightResult<(
        mpsc::Receiver<StreamEvent>,
        JoinHandle<FinsightResult<LlmResponse>>,
    )> {
        let chunks = self.chunks.clone();
        let (tx, rx) = mpsc::channel(64);
        let handle = tokio::spawn(async move {
            let mut full = String::new();
            for chunk in chunks {
                full.push_str(chunk);
                let _ = tx
                    .send(StreamEvent::TextDelta {
                        text: chunk.to_string(),
                    })
                    .await;
            }
            Ok(LlmResponse::Done(full))
        });
        Ok((rx, handle))
    }
}

fn context() -> (ToolContext, mpsc::UnboundedReceiver<StreamRecord>, Arc<InMemoryStore>) {
    let (sink, rx) = DeltaSink::channel();
    let store = Arc::new(InMemoryStore::new());
    let ctx = ToolContext::new(Uuid::new_v4(), "user-1", sink, store.clone());
    (ctx, rx, store)
}

fn deltas(rx: &mut mpsc::UnboundedReceiver<StreamRecord>) -> Vec<Delta> {
    let mut out = Vec::new();
    while let Ok(record) = rx.try_recv() {
        if let StreamRecord::Data(delta) = record {
            out.push(delta);
        }
    }
    out
}

fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
    ToolCall {
        id: "call_1".into(),
        name: name.into(),
        arguments,
    }
}

#[tokio::test]
async fn test_create_text_document_streams_increments() {
    let (ctx, mut rx, store) = context();
    let skill = CreateDocumentSkill::new(canned(vec!["# Rates\n", "Rates rose."], ""));

    let result = skill
        .execute(call("create_document", json!({"title": "Rates", "kind": "text"})), &ctx)
        .await
        .unwrap();
    assert!(!result.is_error);
    let id = Uuid::parse_str(result.content["id"].as_str().unwrap()).unwrap();

    let deltas = deltas(&mut rx);
    assert_eq!(deltas[0], Delta::Id(id.to_string()));
    assert_eq!(deltas[1], Delta::Kind(ArtifactKind::Text));
    assert!(deltas.contains(&Delta::Text("Rates rose.".into())));
    assert_eq!(deltas.last(), Some(&Delta::Finish));

    let saved = store.get_document(id).await.unwrap().unwrap();
    assert_eq!(saved.content, "# Rates\nRates rose.");
    assert_eq!(saved.user_id, "user-1");
}

#[tokio::test]
async fn test_create_code_document_sends_full_draft() {
    let (ctx, mut rx, _store) = context();
    let skill = CreateDocumentSkill::new(canned(vec!["fn main() {", "}"], ""));
    skill
        .execute(call("create_document", json!({"title": "Hello", "kind": "code"})), &ctx)
        .await
        .unwrap();

    let texts: Vec<_> = deltas(&mut rx)
        .into_iter()
        .filter_map(|d| match d {
            Delta::Text(t) => Some(t),
            _ => None,
        })
        .collect();
    assert_eq!(texts, ["fn main() {", "fn main() {}"]);
}

#[tokio::test]
async fn test_create_document_rejects_unknown_kind() {
    let (ctx, _rx, _store) = context();
    let skill = CreateDocumentSkill::new(canned(vec![], ""));
    let result = skill
        .execute(call("create_document", json!({"title": "x", "kind": "financial"})), &ctx)
        .await
        .unwrap();
    assert!(result.is_error);
}

#[tokio::test]
async fn test_update_document_clears_and_adds_version() {
    let (ctx, mut rx, store) = context();
    let id = Uuid::new_v4();
    store
        .save_document(&Document::new(id, ctx.chat_id, "Notes", ArtifactKind::Text, "user-1", "v1"))
        .await
        .unwrap();

    let skill = UpdateDocumentSkill::new(canned(vec!["v2"], ""));
    let result = skill
        .execute(
            call("update_document", json!({"id": id.to_string(), "description": "rewrite"})),
            &ctx,
        )
        .await
        .unwrap();
    assert!(!result.is_error);

    let deltas = deltas(&mut rx);
    assert_eq!(deltas[0], Delta::Clear);
    assert_eq!(store.document_versions(id).await.unwrap().len(), 2);
    assert_eq!(store.get_document(id).await.unwrap().unwrap().content, "v2");
}

#[tokio::test]
async fn test_update_foreign_document_is_not_found() {
    let (ctx, _rx, store) = context();
    let id = Uuid::new_v4();
    store
        .save_document(&Document::new(id, ctx.chat_id, "Notes", ArtifactKind::Text, "someone-else", "v1"))
        .await
        .unwrap();
    let skill = UpdateDocumentSkill::new(canned(vec!["v2"], ""));
    let result = skill
        .execute(
            call("update_document", json!({"id": id.to_string(), "description": "rewrite"})),
            &ctx,
        )
        .await
        .unwrap();
    assert!(result.is_error);
    assert_eq!(store.document_versions(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_request_suggestions_emits_metadata() {
    let (ctx, mut rx, store) = context();
    let id = Uuid::new_v4();
    store
        .save_document(&Document::new(id, ctx.chat_id, "Essay", ArtifactKind::Text, "user-1", "Teh market rose."))
        .await
        .unwrap();
    let skill = RequestSuggestionsSkill::new(canned(
        vec![],
        r#"[{"originalSentence":"Teh market rose.","suggestedSentence":"The market rose.","description":"typo"}]"#,
    ));
    let result = skill
        .execute(call("request_suggestions", json!({"documentId": id.to_string()})), &ctx)
        .await
        .unwrap();
    assert!(!result.is_error);

    let metadata = deltas(&mut rx)
        .into_iter()
        .find_map(|d| match d {
            Delta::Metadata(v) => Some(v),
            _ => None,
        })
        .unwrap();
    assert_eq!(metadata["suggestions"][0]["suggestedSentence"], "The market rose.");
    assert_eq!(metadata["suggestions"][0]["documentId"], id.to_string());
}

#[tokio::test]
async fn test_news_reports_loading_then_ready() {
    let (ctx, mut rx, _store) = context();
    let skill = GetNewsSkill::new(canned(vec![], "The Fed held rates."));
    let result = skill
        .execute(
            call("get_news", json!({"query": "Fed", "timeframe": "this week", "location": "US"})),
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(result.content["content"], "The Fed held rates.");
    assert_eq!(result.content["query"], "Fed from this week in US");

    let stages: Vec<_> = deltas(&mut rx)
        .into_iter()
        .filter_map(|d| match d {
            Delta::ToolStatus(s) => Some(s.stage),
            _ => None,
        })
        .collect();
    assert_eq!(stages, [ToolStage::Loading, ToolStage::Ready]);
}

#[tokio::test]
async fn test_weather_forwards_forecast() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("latitude", "48.85"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "current": {"temperature_2m": 17.4}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (ctx, _rx, _store) = context();
    let skill = GetWeatherSkill::new(WeatherConfig {
        base_url: server.uri(),
        ..WeatherConfig::default()
    });
    let result = skill
        .execute(call("get_weather", json!({"latitude": 48.85, "longitude": 2.35})), &ctx)
        .await
        .unwrap();
    assert_eq!(result.content["current"]["temperature_2m"], 17.4);
}

fn rent_templates(rent: u32) -> serde_json::Value {
    json!({
        "status": "success",
        "user_input_template": {"data": {"acquisition.purchase_price": 1_250_000}},
        "revenue_template": {
            "columns": [{"name": "Unit"}, {"name": "Rent"}],
            "sections": [{"name": "Residential", "rows": [{"Unit": "1BR", "Rent": rent}]}]
        }
    })
}

#[tokio::test]
async fn test_template_update_versions_changed_sheets() {
    let server = MockServer::start().await;
    for (query, rent) in [("Set rent to 1800", 1800), ("Raise rent to 2100", 2100)] {
        Mock::given(method("POST"))
            .and(path("/update_assumptions"))
            .and(body_partial_json(json!({"user_query": query, "user_id": "user-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(rent_templates(rent)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let (ctx, mut rx, store) = context();
    let skill = TemplateUpdateSkill::new(AnalyticsClient::new(AnalyticsConfig {
        base_url: server.uri(),
        retry_delay_ms: 1,
        ..AnalyticsConfig::default()
    }));

    let first = skill
        .execute(
            call("request_template_update", json!({"userQuery": "Set rent to 1800"})),
            &ctx,
        )
        .await
        .unwrap();
    assert!(!first.is_error);
    let created = first.content["updatedTemplates"].as_array().unwrap();
    let kinds: Vec<_> = created.iter().map(|u| u["templateType"].clone()).collect();
    assert_eq!(kinds, [json!("user_input"), json!("revenue")]);
    assert!(created.iter().all(|u| u["version"] == 1));
    let revenue_id = Uuid::parse_str(created[1]["documentId"].as_str().unwrap()).unwrap();
    let inputs_id = Uuid::parse_str(created[0]["documentId"].as_str().unwrap()).unwrap();

    let second = skill
        .execute(
            call("request_template_update", json!({"userQuery": "Raise rent to 2100"})),
            &ctx,
        )
        .await
        .unwrap();
    let revised = second.content["updatedTemplates"].as_array().unwrap();
    assert_eq!(revised.len(), 1);
    assert_eq!(revised[0]["templateType"], "revenue");
    assert_eq!(revised[0]["version"], 2);
    assert_eq!(revised[0]["documentId"], revenue_id.to_string());

    let versions = store.document_versions(revenue_id).await.unwrap();
    assert_eq!(versions.len(), 2);
    let latest = versions.last().unwrap();
    assert_eq!(latest.kind, ArtifactKind::Sheet);
    assert_eq!(latest.title, "Revenue Template");
    assert!(latest.content.ends_with("1BR,2100"));
    let metadata = latest.metadata.as_ref().unwrap();
    assert_eq!(metadata["version"], 2);
    assert_eq!(metadata["templateType"], "revenue");
    assert_eq!(metadata["trigger"]["content"], "Raise rent to 2100");
    assert_eq!(store.document_versions(inputs_id).await.unwrap().len(), 1);

    let stages: Vec<_> = deltas(&mut rx)
        .into_iter()
        .filter_map(|d| match d {
            Delta::ToolStatus(s) => Some(s.stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        [ToolStage::Loading, ToolStage::Ready, ToolStage::Loading, ToolStage::Ready]
    );
}

#[tokio::test]
async fn test_template_update_reports_service_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/update_assumptions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (ctx, mut rx, store) = context();
    let skill = TemplateUpdateSkill::new(AnalyticsClient::new(AnalyticsConfig {
        base_url: server.uri(),
        retry_delay_ms: 1,
        ..AnalyticsConfig::default()
    }));
    let result = skill
        .execute(call("request_template_update", json!({"userQuery": "Raise rent"})), &ctx)
        .await
        .unwrap();
    assert!(result.is_error);
    assert_eq!(result.content["isTimeout"], false);
    assert!(store
        .documents_by_chat(ctx.chat_id, None)
        .await
        .unwrap()
        .is_empty());
    assert!(deltas(&mut rx)
        .iter()
        .any(|d| matches!(d, Delta::ToolStatus(s) if s.stage == ToolStage::Error)));
}
