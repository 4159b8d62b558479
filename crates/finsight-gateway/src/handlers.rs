//! Request handlers for the `/api` routes.

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::server::{AppState, DATA_STREAM_HEADER};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use finsight_agent::TurnRequest;
use finsight_core::{most_recent_user_message, Message, Role};
use finsight_protocol::{encode, ArtifactKind};
use finsight_store::{chat_title_from_message, Chat, Document};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};
use uuid::Uuid;

/// One message as the client sends it.
#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

/// Body of `POST /api/chat`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub id: Uuid,
    pub messages: Vec<IncomingMessage>,
    /// Accepted for client compatibility; the model pair is fixed per server.
    #[serde(default)]
    pub selected_chat_model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentsQuery {
    pub chat_id: Option<String>,
    pub kind: Option<String>,
}

/// Client history as domain messages. Tool traffic is server-side only.
fn to_history(chat_id: Uuid, incoming: Vec<IncomingMessage>) -> Vec<Message> {
    incoming
        .into_iter()
        .filter(|m| m.role != Role::Tool && !m.content.trim().is_empty())
        .map(|m| Message::new(m.role, m.content, chat_id))
        .collect()
}

/// `POST /api/chat`: stream one turn as framed records.
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let lease = state.pool.acquire();
    let chat_id = request.id;
    let messages = to_history(chat_id, request.messages);

    let user_message = most_recent_user_message(&messages)
        .cloned()
        .ok_or_else(|| ApiError::BadRequest("No user message found".into()))?;

    match state.store.get_chat(chat_id).await? {
        Some(chat) if chat.user_id != user_id => return Err(ApiError::Unauthorized),
        Some(_) => {}
        None => {
            let title = chat_title_from_message(&user_message.content);
            let chat = Chat::new(chat_id, user_id.clone(), title);
            state.store.save_chat(&chat).await?;
            info!(chat_id = %chat_id, title = %chat.title, "Created chat");
        }
    }
    state
        .store
        .save_messages(std::slice::from_ref(&user_message))
        .await?;

    if let Some(model) = &request.selected_chat_model {
        info!(chat_id = %chat_id, model = %model, "Client selected a chat model");
    }

    let (rx, _handle) = state.orchestrator.spawn(
        TurnRequest {
            chat_id,
            user_id,
            messages,
        },
        lease,
    );

    let frames = UnboundedReceiverStream::new(rx).filter_map(|record| match encode(&record) {
        Ok(line) => Some(Ok::<_, Infallible>(line)),
        Err(e) => {
            warn!(error = %e, "Dropping record that failed to encode");
            None
        }
    });

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (HeaderName::from_static(DATA_STREAM_HEADER), "v1"),
        ],
        Body::from_stream(frames),
    )
        .into_response())
}

/// `DELETE /api/chat?id=`.
pub async fn delete_chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(query): Query<IdQuery>,
) -> Result<StatusCode, ApiError> {
    let not_found = || ApiError::NotFound("Not Found".into());
    let id = query
        .id
        .as_deref()
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(not_found)?;

    let chat = state.store.get_chat(id).await?.ok_or_else(not_found)?;
    if chat.user_id != user_id {
        return Err(ApiError::Unauthorized);
    }

    state.store.delete_chat(id).await?;
    info!(chat_id = %id, "Deleted chat");
    Ok(StatusCode::OK)
}

/// `GET /api/document?id=`: every version, oldest first.
pub async fn document_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let raw = query
        .id
        .ok_or_else(|| ApiError::BadRequest("Missing id".into()))?;
    let not_found = || ApiError::NotFound("Not Found".into());
    let id = Uuid::parse_str(&raw).map_err(|_| not_found())?;

    let versions = state.store.document_versions(id).await?;
    let latest = versions.last().ok_or_else(not_found)?;
    if latest.user_id != user_id {
        return Err(ApiError::Unauthorized);
    }
    Ok(Json(versions))
}

/// `GET /api/documents?chatId=[&kind=]`: the caller's documents in a chat.
pub async fn documents_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(query): Query<DocumentsQuery>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let raw = query
        .chat_id
        .ok_or_else(|| ApiError::BadRequest("Missing chatId".into()))?;
    let Ok(chat_id) = Uuid::parse_str(&raw) else {
        return Ok(Json(Vec::new()));
    };
    let kind = query.kind.as_deref().and_then(ArtifactKind::parse);

    let documents = state
        .store
        .documents_by_chat(chat_id, kind)
        .await?
        .into_iter()
        .filter(|d| d.user_id == user_id)
        .collect();
    Ok(Json(documents))
}

/// `GET /api/history`: the caller's chats.
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Vec<Chat>>, ApiError> {
    Ok(Json(state.store.chats_by_user(&user_id).await?))
}
