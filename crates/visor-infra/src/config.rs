//! Configuration loader for Visor.
//!
//! Reads `config.toml` from the data directory (`~/.visor/` by default)
//! and deserializes it into [`VisorConfig`]. Falls back to defaults when
//! the file is missing or malformed -- a head-worn client must come up
//! even with a broken config, it just runs with stock settings.

use std::path::{Path, PathBuf};

use visor_types::agent::{Agent, AgentRegistry};
use visor_types::config::VisorConfig;

/// Resolve the data directory: `$VISOR_DATA_DIR`, else `~/.visor`.
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("VISOR_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".visor")
}

/// Load configuration from `{data_dir}/config.toml`.
pub async fn load_config(data_dir: &Path) -> VisorConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("no config.toml at {}, using defaults", config_path.display());
            return VisorConfig::default();
        }
        Err(err) => {
            tracing::warn!("failed to read {}: {err}, using defaults", config_path.display());
            return VisorConfig::default();
        }
    };

    match toml::from_str::<VisorConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            VisorConfig::default()
        }
    }
}

/// Build the static agent registry from configuration.
///
/// An empty `[[agents]]` list gets one built-in placeholder so the menu
/// tree is never empty on first launch.
pub fn agent_registry(config: &VisorConfig) -> AgentRegistry {
    if config.agents.is_empty() {
        return AgentRegistry::new(vec![Agent {
            id: "asst_default".to_string(),
            name: "Assistant".to_string(),
            menu: "agent_menu".to_string(),
            active_menu: "agent_active_menu".to_string(),
        }]);
    }
    AgentRegistry::new(
        config
            .agents
            .iter()
            .map(|entry| Agent {
                id: entry.id.clone(),
                name: entry.name.clone(),
                menu: entry.menu.clone(),
                active_menu: entry.active_menu.clone(),
            })
            .collect(),
    )
}
