use crate::model::{Chat, Document};
use crate::store::{ChatStore, DocumentStore, MessageStore};
use async_trait::async_trait;
use finsight_core::{FinsightError, FinsightResult, Message};
use finsight_protocol::ArtifactKind;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// File-based store (JSON files on disk).
///
/// Layout under the root directory:
/// - `documents/<id>.json`: every version of a document, oldest first
/// - `chats/<id>.json`: one chat
/// - `messages/<chat_id>.jsonl`: one message per line, append-only
/// - `tmp/`: staging area; files are written here and renamed into place
pub struct FileStore {
    dir: PathBuf,
    // Serializes read-modify-write of version files.
    write_lock: Mutex<()>,
}

impl FileStore {
    pub async fn new(dir: PathBuf) -> FinsightResult<Self> {
        for sub in ["documents", "chats", "messages", "tmp"] {
            tokio::fs::create_dir_all(dir.join(sub)).await?;
        }
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn document_path(&self, id: Uuid) -> PathBuf {
        self.dir.join("documents").join(format!("{id}.json"))
    }

    fn chat_path(&self, id: Uuid) -> PathBuf {
        self.dir.join("chats").join(format!("{id}.json"))
    }

    fn messages_path(&self, chat_id: Uuid) -> PathBuf {
        self.dir.join("messages").join(format!("{chat_id}.jsonl"))
    }

    /// Replaces `path` with `contents` without ever exposing a partial file.
    ///
    /// The staging file lives under the store root, so the rename stays on
    /// one filesystem.
    async fn write_atomic(&self, path: &Path, contents: &str) -> FinsightResult<()> {
        let staging = self.dir.join("tmp").join(format!("{}.tmp", Uuid::new_v4()));
        let mut file = tokio::fs::File::create(&staging).await?;
        let written = async {
            file.write_all(contents.as_bytes()).await?;
            file.sync_all().await
        }
        .await;
        drop(file);
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&staging, path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(FinsightError::Store(format!(
                "Failed to replace {}: {e}",
                path.display()
            )));
        }
        Ok(())
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> FinsightResult<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(path).await?;
        let value = serde_json::from_str(&data).map_err(|e| {
            FinsightError::Store(format!("Failed to parse {}: {e}", path.display()))
        })?;
        Ok(Some(value))
    }

    async fn read_versions(&self, id: Uuid) -> FinsightResult<Vec<Document>> {
        Ok(Self::read_json(&self.document_path(id))
            .await?
            .unwrap_or_default())
    }

    async fn json_files(dir: &Path) -> FinsightResult<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn save_document(&self, document: &Document) -> FinsightResult<()> {
        let _lock = self.write_lock.lock().await;
        let mut versions = self.read_versions(document.id).await?;
        versions.push(document.clone());
        let json = serde_json::to_string_pretty(&versions)?;
        self.write_atomic(&self.document_path(document.id), &json)
            .await
    }

    async fn get_document(&self, id: Uuid) -> FinsightResult<Option<Document>> {
        Ok(self.read_versions(id).await?.pop())
    }

    async fn document_versions(&self, id: Uuid) -> FinsightResult<Vec<Document>> {
        self.read_versions(id).await
    }

    async fn documents_by_chat(
        &self,
        chat_id: Uuid,
        kind: Option<ArtifactKind>,
    ) -> FinsightResult<Vec<Document>> {
        let mut found = Vec::new();
        for path in Self::json_files(&self.dir.join("documents")).await? {
            let versions: Vec<Document> = Self::read_json(&path).await?.unwrap_or_default();
            if let Some(newest) = versions.into_iter().last() {
                if newest.chat_id == chat_id && kind.map_or(true, |k| newest.kind == k) {
                    found.push(newest);
                }
            }
        }
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }
}

#[async_trait]
impl ChatStore for FileStore {
    async fn save_chat(&self, chat: &Chat) -> FinsightResult<()> {
        let json = serde_json::to_string_pretty(chat)?;
        self.write_atomic(&self.chat_path(chat.id), &json).await
    }

    async fn get_chat(&self, id: Uuid) -> FinsightResult<Option<Chat>> {
        Self::read_json(&self.chat_path(id)).await
    }

    async fn chats_by_user(&self, user_id: &str) -> FinsightResult<Vec<Chat>> {
        let mut chats = Vec::new();
        for path in Self::json_files(&self.dir.join("chats")).await? {
            if let Some(chat) = Self::read_json::<Chat>(&path).await? {
                if chat.user_id == user_id {
                    chats.push(chat);
                }
            }
        }
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(chats)
    }

    async fn delete_chat(&self, id: Uuid) -> FinsightResult<()> {
        let _lock = self.write_lock.lock().await;
        for path in Self::json_files(&self.dir.join("documents")).await? {
            let versions: Vec<Document> = Self::read_json(&path).await?.unwrap_or_default();
            if versions.first().is_some_and(|doc| doc.chat_id == id) {
                tokio::fs::remove_file(path).await?;
            }
        }
        for path in [self.chat_path(id), self.messages_path(id)] {
            if path.exists() {
                tokio::fs::remove_file(path).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for FileStore {
    async fn save_messages(&self, messages: &[Message]) -> FinsightResult<()> {
        let _lock = self.write_lock.lock().await;
        for message in messages {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.messages_path(message.chat_id))
                .await?;
            let mut line = serde_json::to_string(message)?;
            line.push('\n');
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
        }
        Ok(())
    }

    async fn messages_by_chat(&self, chat_id: Uuid) -> FinsightResult<Vec<Message>> {
        let path = self.messages_path(chat_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = tokio::fs::read_to_string(&path).await?;
        let messages = data
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }
}
