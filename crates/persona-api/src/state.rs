use std::sync::Arc;

use persona_agent::Agent;
use persona_persist::PersistenceClient;

use crate::config::Config;

/// Shared application state passed to all handlers
///
/// The agent is built once at startup; clones share its client, tools and store.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub agent: Agent,
    pub store: Arc<dyn PersistenceClient>,
    pub telegram_configured: bool,
}

impl AppState {
    pub fn new(
        config: Config,
        agent: Agent,
        store: Arc<dyn PersistenceClient>,
        telegram_configured: bool,
    ) -> Self {
        Self {
            config: Arc::new(config),
            agent,
            store,
            telegram_configured,
        }
    }

    /// Only one agent is served; look it up by id.
    pub fn agent_by_id(&self, agent_id: &str) -> Option<&Agent> {
        (self.agent.id() == agent_id).then_some(&self.agent)
    }
}
