//! Persistence for chats, messages and versioned documents.
//!
//! Every document save is a full-content replace that appends a new version;
//! reads return the newest version. The request-scoped [`ConnectionGuard`]
//! models the single pooled connection a chat request holds.

pub mod file;
pub mod lease;
pub mod memory;
pub mod model;
pub mod store;

pub use file::FileStore;
pub use lease::{ConnectionGuard, ConnectionPool};
pub use memory::InMemoryStore;
pub use model::{chat_title_from_message, Chat, Document};
pub use store::{ChatStore, DocumentStore, MessageStore, Storage};
