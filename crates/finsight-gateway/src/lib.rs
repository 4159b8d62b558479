//! HTTP surface: the streaming chat endpoint plus document and history reads.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;

pub use error::ApiError;
pub use middleware::{AuthConfig, AuthUser};
pub use server::{AppState, GatewayServer, DATA_STREAM_HEADER};
