use config::builder::DefaultState;
use config::{Config as ConfigLoader, ConfigBuilder, ConfigError, Environment, File, Source};
use persona_agent::{AgentConfig, LLMConfig};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub agent: AgentSettings,
    pub logging: LoggingConfig,

    // Secrets (from ENV only)
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub openai_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl From<LlmConfig> for LLMConfig {
    fn from(config: LlmConfig) -> Self {
        Self {
            model: config.model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentSettings {
    /// Person the agent speaks as
    pub persona_name: String,
    /// Resume or biography (PDF, text or markdown)
    pub background_path: String,
    #[serde(default)]
    pub markdown: bool,
    pub max_iterations: usize,
    pub execution_timeout_secs: u64,
    pub history_runs: usize,
}

impl From<&AgentSettings> for AgentConfig {
    fn from(settings: &AgentSettings) -> Self {
        AgentConfig::new()
            .with_max_iterations(settings.max_iterations)
            .with_timeout(Duration::from_secs(settings.execution_timeout_secs))
            .with_history_runs(settings.history_runs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

/// Extra time the router grants past the agent's execution timeout.
const RUN_TIMEOUT_MARGIN_SECS: u64 = 5;

/// Environment prefixes and the config section each one overrides.
const ENV_SECTIONS: &[(&str, &str)] = &[
    ("SERVER", "server"),
    ("DATABASE", "database"),
    ("LLM", "llm"),
    ("AGENT", "agent"),
    ("LOG", "logging"),
    ("CORS", "cors"),
];

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables (SERVER_PORT, DATABASE_PATH, LLM_MODEL, ...)
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let mut builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false));

        for (prefix, section) in ENV_SECTIONS {
            builder = with_env_section(builder, prefix, section)?;
        }

        let mut cfg: Config = builder.build()?.try_deserialize()?;

        // Secrets come from the environment only
        cfg.openai_api_key = non_empty_env("OPENAI_API_KEY");
        cfg.openai_base_url = non_empty_env("OPENAI_BASE_URL");

        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        ConfigLoader::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }

    /// Router-level request timeout.
    ///
    /// Never shorter than a run may take, so a slow run ends with the
    /// agent's own timeout error and is stored before the connection is cut.
    pub fn request_timeout(&self) -> Duration {
        let run_budget = self
            .agent
            .execution_timeout_secs
            .saturating_add(RUN_TIMEOUT_MARGIN_SECS);
        Duration::from_secs(self.server.request_timeout_secs.max(run_budget))
    }

    /// The OpenAI key, required to talk to the model.
    pub fn require_openai_key(&self) -> anyhow::Result<&str> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY environment variable is required"))
    }
}

/// Map `{PREFIX}_{KEY}` variables onto `{section}.{key}`.
fn with_env_section(
    mut builder: ConfigBuilder<DefaultState>,
    prefix: &str,
    section: &str,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let vars = Environment::with_prefix(prefix)
        .prefix_separator("_")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("origins")
        .collect()?;

    for (key, value) in vars {
        builder = builder.set_override(format!("{}.{}", section, key), value)?;
    }
    Ok(builder)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 3000

        [cors]
        enabled = true
        origins = ["*"]

        [database]
        path = "data/agno.db"
        max_connections = 5
        busy_timeout_ms = 5000

        [llm]
        model = "gpt-4o"
        timeout_secs = 120

        [agent]
        persona_name = "Jane"
        background_path = "me/resume.pdf"
        markdown = true
        max_iterations = 10
        execution_timeout_secs = 300
        history_runs = 3

        [logging]
        level = "debug"
        format = "json"
    "#;

    #[test]
    fn test_config_structure() {
        let config: Config = toml::from_str(SAMPLE).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.request_timeout_secs, 300);
        assert_eq!(config.database.path, "data/agno.db");
        assert!(config.llm.temperature.is_none());
        assert!(config.openai_api_key.is_none());
        assert!(config.require_openai_key().is_err());

        let agent: AgentConfig = (&config.agent).into();
        assert_eq!(agent.history_runs, 3);
        assert_eq!(agent.execution_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_request_timeout_outlasts_run_timeout() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(305));

        config.server.request_timeout_secs = 900;
        assert_eq!(config.request_timeout(), Duration::from_secs(900));

        config.server.request_timeout_secs = 1;
        config.agent.execution_timeout_secs = 1;
        assert!(config.request_timeout() > Duration::from_secs(1));
    }

    #[test]
    fn test_env_section_overrides_nested_keys() {
        std::env::set_var("PERSONATESTDB_MAX_CONNECTIONS", "9");
        std::env::set_var("PERSONATESTDB_PATH", "/data/agno.db");

        let builder = ConfigLoader::builder()
            .set_default("database.path", "agno.db")
            .unwrap()
            .set_default("database.busy_timeout_ms", 5000)
            .unwrap();
        let builder = with_env_section(builder, "PERSONATESTDB", "database").unwrap();
        let database: DatabaseConfig = builder.build().unwrap().get("database").unwrap();

        assert_eq!(database.max_connections, 9);
        assert_eq!(database.path, "/data/agno.db");
        assert_eq!(database.busy_timeout_ms, 5000);

        std::env::remove_var("PERSONATESTDB_MAX_CONNECTIONS");
        std::env::remove_var("PERSONATESTDB_PATH");
    }

    #[test]
    fn test_repository_default_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/default.toml");
        let config = Config::from_file(path).unwrap();

        assert_eq!(config.database.path, "agno.db");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.llm.model, "gpt-4o");
    }
}
