use crate::handlers::{
    chat_handler, delete_chat_handler, document_handler, documents_handler, history_handler,
};
use crate::middleware::{auth_middleware, AuthConfig};
use axum::{
    middleware as axum_mw,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use finsight_agent::Orchestrator;
use finsight_store::{ConnectionPool, Storage};
use std::sync::Arc;

/// Header announcing the framed data-stream protocol on chat responses.
pub const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";

/// Shared application state.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<dyn Storage>,
    /// One lease per in-flight chat turn.
    pub pool: ConnectionPool,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, store: Arc<dyn Storage>) -> Self {
        Self {
            orchestrator,
            store,
            pool: ConnectionPool::new(),
        }
    }
}

/// The HTTP gateway.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the router. `/health` stays outside authentication.
    pub fn build(state: Arc<AppState>, auth: AuthConfig) -> Router {
        let api = Router::new()
            .route("/api/chat", post(chat_handler).delete(delete_chat_handler))
            .route("/api/document", get(document_handler))
            .route("/api/documents", get(documents_handler))
            .route("/api/history", get(history_handler))
            .route_layer(axum_mw::from_fn_with_state(Arc::new(auth), auth_middleware))
            .with_state(state);

        Router::new()
            .route("/health", get(health_handler))
            .merge(api)
    }
}

async fn health_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({"status": "ok", "service": "finsight"}))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use finsight_agent::{LlmClient, LlmProvider, ModelConfig, OrchestratorConfig};
    use finsight_skills::SkillRegistry;
    use finsight_store::InMemoryStore;
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn app(auth: AuthConfig) -> Router {
        let llm = LlmClient::new(ModelConfig {
            provider: LlmProvider::OpenAi,
            model_id: "unused".into(),
            api_key: String::new(),
            api_base_url: Some("http://127.0.0.1:1".into()),
            temperature: 0.0,
            max_tokens: 16,
        });
        let store: Arc<dyn Storage> = Arc::new(InMemoryStore::new());
        let orchestrator = Arc::new(Orchestrator::new(
            llm.clone(),
            llm,
            Arc::new(SkillRegistry::new()),
            Arc::clone(&store),
            OrchestratorConfig::default(),
        ));
        GatewayServer::build(Arc::new(AppState::new(orchestrator, store)), auth)
    }

    #[tokio::test]
    async fn test_health_bypasses_auth() {
        let auth = AuthConfig::new(HashMap::from([("k".to_string(), "u".to_string())]));
        let resp = app(auth)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_open_mode_serves_anonymous_history() {
        let resp = app(AuthConfig::default())
            .oneshot(Request::get("/api/history").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
