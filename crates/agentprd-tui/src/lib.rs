// ── AgentPRD TUI ────────────────────────────────────────────────────────────
//
// Ratatui front end for the chat gateway. Terminal events and streamed turn
// updates are both turned into `Action`s and folded into `AppState` on one
// task; the gateway call itself runs on a spawned task per turn.

pub mod action;
pub mod app;
pub mod components;
pub mod palette;
pub mod state;
pub mod tui;

pub use app::App;

use agentprd_core::config::Config;
use agentprd_core::logging::{self, LogConfig};

/// Run the TUI until the user quits. Logs go to `<settings_dir>/logs` since
/// the terminal belongs to the UI.
pub async fn run(config: Config, verbose: bool) -> anyhow::Result<()> {
    let log_config = if verbose {
        LogConfig::debug()
    } else {
        LogConfig::from_env()
    };
    logging::init_to_file(log_config, &config.log_path())?;

    let mut app = App::new(config)?;
    app.run().await
}
