use crate::config::Config;
use clap::{ArgAction, Args};
use std::path::PathBuf;

// Global flags shared by every AgentPRD binary.
//
//   -c / --config      Path to a config.toml file
//   --settings-dir     Root state directory override
//   --no-color         Disable coloured terminal output
//   --gateway          Gateway chat URL override
//   -v / --verbose     Debug logging
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Path to a config.toml file
    #[arg(
        short = 'c',
        long,
        value_name = "PATH",
        env = "AGENTPRD_CONFIG",
        global = true
    )]
    pub config: Option<PathBuf>,

    /// Settings directory (default: ~/.agentprd)
    #[arg(
        long,
        value_name = "DIR",
        env = "AGENTPRD_SETTINGS_DIR",
        global = true
    )]
    pub settings_dir: Option<PathBuf>,

    /// Disable coloured terminal output
    #[arg(long = "no-color", action = ArgAction::SetTrue, env = "NO_COLOR", global = true)]
    pub no_color: bool,

    /// Gateway chat endpoint (http://host:port/chat)
    #[arg(
        long = "gateway",
        value_name = "URL",
        env = "AGENTPRD_GATEWAY",
        global = true
    )]
    pub gateway: Option<String>,

    /// Verbose (debug) logging
    #[arg(short, long, action = ArgAction::SetTrue, global = true)]
    pub verbose: bool,
}

impl CommonArgs {
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(config) = &self.config {
            return Some(config.clone());
        }
        self.settings_dir
            .as_ref()
            .map(|dir| dir.join("config.toml"))
    }

    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(settings_dir) = &self.settings_dir {
            config.settings_dir = settings_dir.clone();
        }
        if let Some(gateway) = &self.gateway {
            config.client.gateway_url = gateway.clone();
        }
    }

    /// Load the config file and apply command-line overrides.
    pub fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = Config::load(self.config_path())?;
        self.apply_overrides(&mut config);
        Ok(config)
    }
}
