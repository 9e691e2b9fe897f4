/// Assistant configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Display name the assistant introduces itself with.
    pub name: String,
    /// When false, detected intents are acknowledged but no external call
    /// is made.
    pub enable_external_calls: bool,
    /// Room to join. Empty means a fresh room is generated at startup.
    pub room_name: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "Aria".to_string(),
            enable_external_calls: true,
            room_name: String::new(),
        }
    }
}

impl AgentConfig {
    /// Environment variables:
    /// - `AGENT_NAME` overrides `name`
    /// - `ENABLE_EXTERNAL_API_CALLS` ("true"/"false") overrides
    ///   `enable_external_calls`
    /// - `AGENT_ROOM` overrides `room_name`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(name) = std::env::var("AGENT_NAME") {
            if !name.trim().is_empty() {
                config.name = name;
            }
        }
        if let Ok(flag) = std::env::var("ENABLE_EXTERNAL_API_CALLS") {
            config.enable_external_calls = flag.to_lowercase() == "true" || flag == "1";
        }
        if let Ok(room) = std::env::var("AGENT_ROOM") {
            config.room_name = room;
        }
        config
    }
}
