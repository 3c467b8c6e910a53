use std::sync::Arc;

use anyhow::Context;
use persona_agent::{Agent, Persona, SendLeadTool, TelegramConfig};
use persona_llm::{ChatClient, OpenAIClient, OpenAIConfig};
use persona_persist::{PersistClientBuilder, PersistenceClient, SqlitePersistenceClient};

use crate::config::Config;

/// Open (and migrate) the database named in the config.
pub async fn connect_store(config: &Config) -> anyhow::Result<SqlitePersistenceClient> {
    tracing::info!(path = %config.database.path, "Opening database");
    PersistClientBuilder::new()
        .path(&config.database.path)
        .max_connections(config.database.max_connections)
        .busy_timeout_ms(config.database.busy_timeout_ms)
        .build()
        .await
        .with_context(|| format!("Failed to open database at {}", config.database.path))
}

/// Build the OpenAI client from the secrets in the config.
pub fn openai_client(config: &Config) -> anyhow::Result<Arc<dyn ChatClient>> {
    let mut openai = OpenAIConfig::new(config.require_openai_key()?)
        .with_timeout_secs(config.llm.timeout_secs);
    if let Some(base_url) = &config.openai_base_url {
        openai = openai.with_base_url(base_url);
    }
    Ok(Arc::new(OpenAIClient::from_config(openai)?))
}

/// Assemble the persona agent: background, model, lead tool and storage.
pub fn build_agent(
    config: &Config,
    client: Arc<dyn ChatClient>,
    telegram: &TelegramConfig,
    store: Arc<dyn PersistenceClient>,
) -> anyhow::Result<Agent> {
    let persona = Persona::from_file(&config.agent.persona_name, &config.agent.background_path)
        .with_context(|| {
            format!(
                "Failed to load persona background from {}",
                config.agent.background_path
            )
        })?;

    let lead_tool = SendLeadTool::new(telegram)?;
    if !lead_tool.is_configured() {
        tracing::warn!("Telegram credentials missing; lead capture will report an error");
    }

    let agent = Agent::builder()
        .persona(&persona, config.agent.markdown)
        .llm_client(client)
        .llm_config(config.llm.clone().into())
        .config((&config.agent).into())
        .tool(lead_tool)
        .with_persistence(store)
        .build()?;

    tracing::info!(
        agent_id = %agent.id(),
        model = %agent.model(),
        tools = ?agent.tool_names(),
        "Agent ready"
    );
    Ok(agent)
}
