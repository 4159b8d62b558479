use crate::model::{Chat, Document};
use async_trait::async_trait;
use finsight_core::{FinsightResult, Message};
use finsight_protocol::ArtifactKind;
use uuid::Uuid;

/// Versioned document persistence with full-replace semantics.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Appends `document` as the newest version of `document.id`.
    async fn save_document(&self, document: &Document) -> FinsightResult<()>;

    /// Newest version of a document.
    async fn get_document(&self, id: Uuid) -> FinsightResult<Option<Document>>;

    /// Every version of a document, oldest first.
    async fn document_versions(&self, id: Uuid) -> FinsightResult<Vec<Document>>;

    /// Newest version of every document in a chat, optionally of one kind.
    async fn documents_by_chat(
        &self,
        chat_id: Uuid,
        kind: Option<ArtifactKind>,
    ) -> FinsightResult<Vec<Document>>;
}

/// Chat metadata persistence.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn save_chat(&self, chat: &Chat) -> FinsightResult<()>;
    async fn get_chat(&self, id: Uuid) -> FinsightResult<Option<Chat>>;
    /// Chats owned by `user_id`, newest first.
    async fn chats_by_user(&self, user_id: &str) -> FinsightResult<Vec<Chat>>;
    /// Removes a chat together with its messages and documents.
    async fn delete_chat(&self, id: Uuid) -> FinsightResult<()>;
}

/// Message history persistence.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn save_messages(&self, messages: &[Message]) -> FinsightResult<()>;
    /// Messages of a chat in insertion order.
    async fn messages_by_chat(&self, chat_id: Uuid) -> FinsightResult<Vec<Message>>;
}

/// Everything a chat request persists through.
pub trait Storage: DocumentStore + ChatStore + MessageStore {}

impl<T: DocumentStore + ChatStore + MessageStore> Storage for T {}
