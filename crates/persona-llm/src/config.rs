// Connection settings for the OpenAI provider

use serde::{Deserialize, Serialize};

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    pub api_key: String,
    /// Base URL of the API (defaults to https://api.openai.com/v1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            organization: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(OPENAI_API_BASE)
            .trim_end_matches('/')
    }

    /// Read `OPENAI_API_KEY` and the optional `OPENAI_BASE_URL`.
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable is required"))?;
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            if !base_url.trim().is_empty() {
                config = config.with_base_url(base_url);
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_url() {
        let config = OpenAIConfig::new("test-key");
        assert_eq!(config.base_url(), OPENAI_API_BASE);
        assert_eq!(config.timeout_secs, 120);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = OpenAIConfig::new("test-key").with_base_url("http://localhost:8080/v1/");
        assert_eq!(config.base_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: OpenAIConfig = serde_json::from_str(r#"{"api_key":"k"}"#).unwrap();
        assert_eq!(config.api_key, "k");
        assert!(config.base_url.is_none());
        assert_eq!(config.timeout_secs, 120);
    }
}
