use finsight_agent::{ModelConfig, OrchestratorConfig};
use finsight_builtins::WeatherConfig;
use finsight_data::AnalyticsConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Contents of `finsight.toml`.
#[derive(Debug, Deserialize)]
pub struct FinsightConfig {
    /// Answer model.
    pub model: ModelConfig,
    /// Reasoning model; the answer model is reused when absent.
    #[serde(default)]
    pub reasoning_model: Option<ModelConfig>,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Bearer key to user id. Empty disables authentication.
#[derive(Debug, Default, Deserialize)]
pub struct AuthSection {
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}

impl FinsightConfig {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let mut config: FinsightConfig = toml::from_str(raw)?;
        config.analytics = config.analytics.with_env_overrides();
        Ok(config)
    }

    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        Self::parse(&raw)
    }

    pub fn reasoning_model(&self) -> &ModelConfig {
        self.reasoning_model.as_ref().unwrap_or(&self.model)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use finsight_agent::LlmProvider;

    #[test]
    fn test_minimal_config_takes_defaults() {
        let config = FinsightConfig::parse(
            r#"
            [model]
            provider = "openai"
            model_id = "gpt-4o-mini"
            "#,
        )
        .unwrap();
        assert_eq!(config.model.provider, LlmProvider::OpenAi);
        assert_eq!(config.reasoning_model().model_id, "gpt-4o-mini");
        assert_eq!(config.orchestrator.reasoning_timeout_secs, 30);
        assert_eq!(config.analytics.max_retries, 3);
        assert_eq!(config.analytics.chunk_size, 100);
        assert_eq!(config.server.port, 3000);
        assert!(config.auth.api_keys.is_empty());
        assert_eq!(config.data_dir, PathBuf::from("./data"));
    }

    #[test]
    fn test_full_config() {
        let config = FinsightConfig::parse(
            r#"
            data_dir = "/var/lib/finsight"

            [model]
            provider = "openrouter"
            model_id = "openai/gpt-4o"
            api_key = "sk-or"

            [reasoning_model]
            provider = "deepseek"
            model_id = "deepseek-reasoner"
            api_key = "sk-ds"

            [orchestrator]
            reasoning_timeout_secs = 10
            max_steps = 3

            [analytics]
            timeout_ms = 5000
            retry_delay_ms = 500

            [weather]
            base_url = "http://weather.local"

            [server]
            host = "127.0.0.1"
            port = 8080

            [auth.api_keys]
            "key-1" = "alice"
            "#,
        )
        .unwrap();
        assert_eq!(config.reasoning_model().provider, LlmProvider::DeepSeek);
        assert_eq!(config.orchestrator.max_steps, 3);
        assert_eq!(config.analytics.timeout_ms, 5000);
        assert_eq!(config.weather.base_url, "http://weather.local");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.auth.api_keys["key-1"], "alice");
    }

    #[test]
    fn test_missing_model_is_an_error() {
        assert!(FinsightConfig::parse("[server]\nport = 1").is_err());
    }

    #[tokio::test]
    async fn test_load_reports_the_path() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope.toml");
        let err = FinsightConfig::load(&missing).await.unwrap_err();
        assert!(err.to_string().contains("nope.toml"));

        let present = tmp.path().join("finsight.toml");
        std::fs::write(&present, "[model]\nprovider = \"ollama\"\nmodel_id = \"llama3\"\n").unwrap();
        let config = FinsightConfig::load(&present).await.unwrap();
        assert_eq!(config.model.base_url(), "http://localhost:11434");
    }
}
