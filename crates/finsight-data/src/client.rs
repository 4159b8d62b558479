use crate::config::AnalyticsConfig;
use crate::error::{FetchFailure, PipelineError};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a single attempt.
#[derive(Debug)]
enum AttemptError {
    Timeout(Duration),
    Failed(String),
}

impl AttemptError {
    fn message(&self) -> String {
        match self {
            AttemptError::Timeout(limit) => {
                format!("Request timed out after {}ms", limit.as_millis())
            }
            AttemptError::Failed(message) => message.clone(),
        }
    }
}

/// Linear backoff: the wait after attempt `n` (1-based) is `n` delay units.
fn compute_backoff(config: &AnalyticsConfig, attempt: u32) -> u64 {
    config.retry_delay_ms.saturating_mul(u64::from(attempt))
}

/// Client for the analytics service.
///
/// Every query is retried up to [`AnalyticsConfig::attempts`] times, each
/// attempt bounded by [`AnalyticsConfig::timeout`].
#[derive(Debug, Clone)]
pub struct AnalyticsClient {
    http: reqwest::Client,
    config: AnalyticsConfig,
}

impl AnalyticsClient {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Resolves a natural-language query into series or fundamentals.
    pub async fn process_query(
        &self,
        query: &str,
        time_range: &str,
        session_id: &str,
    ) -> Result<Value, FetchFailure> {
        let body = json!({
            "query": query,
            "timeRange": time_range,
            "session_id": session_id,
        });
        self.post_with_retry("process_query", &body).await
    }

    /// Runs a screening/ranking query over the supported universe.
    pub async fn process_universe_query(
        &self,
        query: &str,
        session_id: &str,
    ) -> Result<Value, FetchFailure> {
        let body = json!({
            "query": query,
            "session_id": session_id,
        });
        self.post_with_retry("process_universe_query", &body).await
    }

    /// Asks the modelling service to revise a chat's templates after
    /// `user_query`; answers with the chat's current template set.
    pub async fn update_assumptions(
        &self,
        chat_id: &str,
        user_query: &str,
        user_id: &str,
    ) -> Result<Value, FetchFailure> {
        let body = json!({
            "chat_id": chat_id,
            "user_query": user_query,
            "user_id": user_id,
        });
        self.post_with_retry("update_assumptions", &body).await
    }

    /// Downloads a result payload from a presigned URL.
    ///
    /// The payload must carry a `data` array.
    pub async fn fetch_payload(&self, url: &str) -> Result<Value, PipelineError> {
        let timeout = self.config.timeout();
        let request = async {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| PipelineError::Payload(format!("Failed to fetch data: {e}")))?;
            let status = response.status();
            if !status.is_success() {
                return Err(PipelineError::Payload(format!(
                    "Failed to fetch data: {}",
                    status.as_u16()
                )));
            }
            response
                .json::<Value>()
                .await
                .map_err(|e| PipelineError::Payload(format!("Failed to read data: {e}")))
        };

        let payload = match tokio::time::timeout(timeout, request).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(FetchFailure {
                    attempts: 1,
                    is_timeout: true,
                    message: AttemptError::Timeout(timeout).message(),
                }
                .into())
            }
        };

        if !payload.get("data").is_some_and(Value::is_array) {
            return Err(PipelineError::Payload(
                "Invalid data format: expected data array".into(),
            ));
        }
        debug!(url = %url, "Fetched result payload");
        Ok(payload)
    }

    async fn post_with_retry(&self, path: &str, body: &Value) -> Result<Value, FetchFailure> {
        let attempts = self.config.attempts();
        let mut last = AttemptError::Failed("no attempt made".into());

        for attempt in 1..=attempts {
            info!(endpoint = %path, attempt, max_attempts = attempts, "Querying analytics service");
            match self.attempt(path, body).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(endpoint = %path, attempt, error = %e.message(), "Analytics attempt failed");
                    last = e;
                }
            }
            if attempt < attempts {
                let delay = compute_backoff(&self.config, attempt);
                debug!(delay_ms = delay, "Backing off before retry");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(FetchFailure {
            attempts,
            is_timeout: matches!(last, AttemptError::Timeout(_)),
            message: last.message(),
        })
    }

    async fn attempt(&self, path: &str, body: &Value) -> Result<Value, AttemptError> {
        let timeout = self.config.timeout();
        let request = async {
            let response = self
                .http
                .post(self.config.endpoint(path))
                .json(body)
                .send()
                .await
                .map_err(|e| AttemptError::Failed(format!("Request failed: {e}")))?;
            let status = response.status();
            if !status.is_success() {
                return Err(AttemptError::Failed(format!(
                    "API request failed with status {}",
                    status.as_u16()
                )));
            }
            response
                .json::<Value>()
                .await
                .map_err(|e| AttemptError::Failed(format!("Invalid response body: {e}")))
        };

        let value = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| AttemptError::Timeout(timeout))??;
        check_status(value)
    }
}

/// Rejects answers whose `status` is present and not `success`.
fn check_status(value: Value) -> Result<Value, AttemptError> {
    match value.get("status").and_then(Value::as_str) {
        None | Some("success") => Ok(value),
        Some(_) => {
            let message = match value.get("error") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown API error")
                    .to_string(),
                None => "Unknown API error".to_string(),
            };
            Err(AttemptError::Failed(message))
        }
    }
}
