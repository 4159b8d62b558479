use async_trait::async_trait;
use finsight_core::{FinsightError, FinsightResult, ToolCall, ToolResult};
use finsight_skills::{Skill, SkillDescriptor, ToolContext};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::info;

/// Settings for the forecast service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_weather_url")]
    pub base_url: String,
    #[serde(default = "default_weather_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_weather_url() -> String {
    "https://api.open-meteo.com".into()
}
fn default_weather_timeout_secs() -> u64 {
    15
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_url(),
            timeout_secs: default_weather_timeout_secs(),
        }
    }
}

fn coordinate(call: &ToolCall, key: &str, limit: f64) -> FinsightResult<f64> {
    let value = call.arguments[key]
        .as_f64()
        .ok_or_else(|| FinsightError::Tool(format!("{}: missing '{key}' argument", call.name)))?;
    if value.abs() > limit {
        return Err(FinsightError::Tool(format!("{key} {value} is out of range")));
    }
    Ok(value)
}

/// Current weather at a location.
pub struct GetWeatherSkill {
    descriptor: SkillDescriptor,
    client: reqwest::Client,
    config: WeatherConfig,
}

impl GetWeatherSkill {
    pub fn new(config: WeatherConfig) -> Self {
        Self {
            descriptor: SkillDescriptor {
                name: "get_weather".to_string(),
                description: "Get the current weather at a location".to_string(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "latitude": {"type": "number"},
                        "longitude": {"type": "number"}
                    },
                    "required": ["latitude", "longitude"]
                }),
            },
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Skill for GetWeatherSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall, _ctx: &ToolContext) -> FinsightResult<ToolResult> {
        let latitude = coordinate(&call, "latitude", 90.0)?;
        let longitude = coordinate(&call, "longitude", 180.0)?;
        info!(latitude, longitude, "Fetching weather");

        let url = format!("{}/v1/forecast", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current", "temperature_2m".to_string()),
                ("hourly", "temperature_2m".to_string()),
                ("daily", "sunrise,sunset".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .send()
            .await
            .map_err(|e| FinsightError::Http(format!("Weather request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Ok(ToolResult::error(
                &call.id,
                format!("Weather service returned status {}", status.as_u16()),
            ));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FinsightError::Http(format!("Invalid weather response: {e}")))?;
        Ok(ToolResult::success(&call.id, body))
    }
}
