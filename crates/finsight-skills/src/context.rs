use finsight_protocol::DeltaSink;
use finsight_store::Storage;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Everything a tool invocation may touch for the request it belongs to.
#[derive(Clone)]
pub struct ToolContext {
    pub chat_id: Uuid,
    pub user_id: String,
    pub sink: DeltaSink,
    pub store: Arc<dyn Storage>,
    /// Shared by every clone made for the same request.
    artifact: Arc<Mutex<()>>,
}

impl ToolContext {
    pub fn new(
        chat_id: Uuid,
        user_id: impl Into<String>,
        sink: DeltaSink,
        store: Arc<dyn Storage>,
    ) -> Self {
        Self {
            chat_id,
            user_id: user_id.into(),
            sink,
            store,
            artifact: Arc::new(Mutex::new(())),
        }
    }

    /// Exclusive right to write one artifact run (`id` through `finish`).
    ///
    /// The client folds a single artifact per turn, so tools that open one
    /// must not interleave on the sink. Hold the guard until `finish` is sent.
    pub async fn claim_artifact(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.artifact).lock_owned().await
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("chat_id", &self.chat_id)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}
