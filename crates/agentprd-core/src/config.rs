//! Configuration loaded from `~/.agentprd/config.toml`.
//!
//! ```toml
//! [gateway]
//! listen = "127.0.0.1:8787"
//! store = "sqlite"          # or "memory"
//! db_path = "agentprd.db"   # relative to the settings dir
//! history_window = 10
//! max_steps = 5
//!
//! [provider]
//! base_url = "https://api.openai.com/v1"
//! model = "gpt-4o-mini"
//! api_key_env = "OPENAI_API_KEY"
//!
//! [client]
//! gateway_url = "http://127.0.0.1:8787/chat"
//! timeout_secs = 120
//! channel = "cli"
//! show_reasoning = false
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::protocol::Channel;
use crate::sessions::HISTORY_WINDOW;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a product-management assistant. \
Help the user shape product requirements documents, keep notes and track their current work context. \
Use the available tools to store and retrieve PRDs, notes and work contexts.";

/// Which key-value backend the gateway uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Socket address the HTTP gateway binds to
    pub listen: String,
    pub store: StoreBackend,
    /// SQLite database path, relative paths resolve against the settings dir
    pub db_path: PathBuf,
    /// Messages kept in persisted sessions and metadata frames
    pub history_window: usize,
    /// Maximum model steps per turn
    pub max_steps: usize,
    pub system_prompt: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8787".to_string(),
            store: StoreBackend::default(),
            db_path: PathBuf::from("agentprd.db"),
            history_window: HISTORY_WINDOW,
            max_steps: 5,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// OpenAI-compatible base URL
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl ProviderConfig {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Full URL of the gateway chat endpoint
    pub gateway_url: String,
    /// Absolute per-request timeout
    pub timeout_secs: u64,
    pub channel: Channel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Highlight reasoning-style replies in the front ends
    pub show_reasoning: bool,
    /// Ask the agent to hold mutating tool calls for approval
    pub approval_mode: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            gateway_url: "http://127.0.0.1:8787/chat".to_string(),
            timeout_secs: 120,
            channel: Channel::Cli,
            user_id: None,
            show_reasoning: false,
            approval_mode: false,
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root state directory
    pub settings_dir: PathBuf,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings_dir: default_settings_dir(),
            gateway: GatewayConfig::default(),
            provider: ProviderConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

fn default_settings_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agentprd")
}

impl Config {
    /// Load configuration from `path` (or the default location). A missing
    /// file yields the defaults.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path.unwrap_or_else(|| default_settings_dir().join("config.toml"));

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("parsing {}", config_path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to `path` (or `<settings_dir>/config.toml`).
    pub fn save(&self, path: Option<PathBuf>) -> Result<()> {
        let config_path = path.unwrap_or_else(|| self.settings_dir.join("config.toml"));

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Database path with `~` expanded and relative paths anchored at the
    /// settings dir.
    pub fn db_path(&self) -> PathBuf {
        let raw = self.gateway.db_path.to_string_lossy();
        let expanded = PathBuf::from(shellexpand::tilde(&raw).into_owned());
        if expanded.is_absolute() {
            expanded
        } else {
            self.settings_dir.join(expanded)
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.settings_dir.join("logs").join("agentprd.log")
    }
}
