use axum::{
    extract::{Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// User id assigned to every request when no keys are configured.
pub const ANONYMOUS_USER: &str = "anonymous";

/// API keys and the user each one authenticates.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Bearer key to user id. Empty = every request runs as [`ANONYMOUS_USER`].
    pub api_keys: HashMap<String, String>,
}

impl AuthConfig {
    pub fn new(api_keys: HashMap<String, String>) -> Self {
        Self { api_keys }
    }

    /// Returns true if authentication is enabled (at least one key configured).
    pub fn is_enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }

    pub fn user_for(&self, key: &str) -> Option<&str> {
        self.api_keys.get(key).map(String::as_str)
    }
}

/// The authenticated caller, inserted as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

#[derive(serde::Deserialize, Default)]
pub struct AuthQuery {
    pub api_key: Option<String>,
}

/// Auth middleware: resolves the caller from an API key.
///
/// Checks `Authorization: Bearer <key>` first, then `?api_key=<key>`.
pub async fn auth_middleware(
    State(auth): State<Arc<AuthConfig>>,
    headers: HeaderMap,
    query: Query<AuthQuery>,
    mut request: Request,
    next: Next,
) -> Response {
    if !auth.is_enabled() {
        request
            .extensions_mut()
            .insert(AuthUser(ANONYMOUS_USER.to_string()));
        return next.run(request).await;
    }

    let key = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
        .or_else(|| query.api_key.clone());

    match key.as_deref().and_then(|k| auth.user_for(k)) {
        Some(user) => {
            request.extensions_mut().insert(AuthUser(user.to_string()));
            next.run(request).await
        }
        None if key.is_some() => {
            warn!("Rejected request: invalid API key");
            (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
        None => {
            warn!("Rejected request: missing API key");
            (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_config_disabled() {
        assert!(!AuthConfig::default().is_enabled());
    }

    #[test]
    fn test_key_maps_to_user() {
        let config = AuthConfig::new(HashMap::from([("k1".to_string(), "alice".to_string())]));
        assert!(config.is_enabled());
        assert_eq!(config.user_for("k1"), Some("alice"));
        assert_eq!(config.user_for("k2"), None);
    }
}
