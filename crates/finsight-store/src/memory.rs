use crate::model::{Chat, Document};
use crate::store::{ChatStore, DocumentStore, MessageStore};
use async_trait::async_trait;
use finsight_core::{FinsightResult, Message};
use finsight_protocol::ArtifactKind;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local store; the default for tests and single-node setups.
#[derive(Default)]
pub struct InMemoryStore {
    documents: RwLock<HashMap<Uuid, Vec<Document>>>,
    chats: RwLock<HashMap<Uuid, Chat>>,
    messages: RwLock<HashMap<Uuid, Vec<Message>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn save_document(&self, document: &Document) -> FinsightResult<()> {
        self.documents
            .write()
            .await
            .entry(document.id)
            .or_default()
            .push(document.clone());
        Ok(())
    }

    async fn get_document(&self, id: Uuid) -> FinsightResult<Option<Document>> {
        Ok(self
            .documents
            .read()
            .await
            .get(&id)
            .and_then(|versions| versions.last().cloned()))
    }

    async fn document_versions(&self, id: Uuid) -> FinsightResult<Vec<Document>> {
        Ok(self
            .documents
            .read()
            .await
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn documents_by_chat(
        &self,
        chat_id: Uuid,
        kind: Option<ArtifactKind>,
    ) -> FinsightResult<Vec<Document>> {
        let documents = self.documents.read().await;
        let mut found: Vec<Document> = documents
            .values()
            .filter_map(|versions| versions.last())
            .filter(|doc| doc.chat_id == chat_id)
            .filter(|doc| kind.map_or(true, |k| doc.kind == k))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }
}

#[async_trait]
impl ChatStore for InMemoryStore {
    async fn save_chat(&self, chat: &Chat) -> FinsightResult<()> {
        self.chats.write().await.insert(chat.id, chat.clone());
        Ok(())
    }

    async fn get_chat(&self, id: Uuid) -> FinsightResult<Option<Chat>> {
        Ok(self.chats.read().await.get(&id).cloned())
    }

    async fn chats_by_user(&self, user_id: &str) -> FinsightResult<Vec<Chat>> {
        let mut chats: Vec<Chat> = self
            .chats
            .read()
            .await
            .values()
            .filter(|chat| chat.user_id == user_id)
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(chats)
    }

    async fn delete_chat(&self, id: Uuid) -> FinsightResult<()> {
        self.chats.write().await.remove(&id);
        self.messages.write().await.remove(&id);
        self.documents
            .write()
            .await
            .retain(|_, versions| versions.first().map_or(true, |doc| doc.chat_id != id));
        Ok(())
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn save_messages(&self, messages: &[Message]) -> FinsightResult<()> {
        let mut stored = self.messages.write().await;
        for message in messages {
            stored
                .entry(message.chat_id)
                .or_default()
                .push(message.clone());
        }
        Ok(())
    }

    async fn messages_by_chat(&self, chat_id: Uuid) -> FinsightResult<Vec<Message>> {
        Ok(self
            .messages
            .read()
            .await
            .get(&chat_id)
            .cloned()
            .unwrap_or_default())
    }
}
