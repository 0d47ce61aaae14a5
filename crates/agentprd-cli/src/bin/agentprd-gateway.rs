use std::net::SocketAddr;
use std::sync::Arc;

use agentprd_core::agent::Agent;
use agentprd_core::args::CommonArgs;
use agentprd_core::config::StoreBackend;
use agentprd_core::gateway::{open_store, run_gateway};
use agentprd_core::logging::{self, LogConfig};
use agentprd_core::providers::{ModelProvider, OpenAiProvider, ScriptedProvider};
use agentprd_core::theme as t;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;

// ── Store backends ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StoreArg {
    Memory,
    Sqlite,
}

impl From<StoreArg> for StoreBackend {
    fn from(arg: StoreArg) -> Self {
        match arg {
            StoreArg::Memory => StoreBackend::Memory,
            StoreArg::Sqlite => StoreBackend::Sqlite,
        }
    }
}

// ── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "agentprd-gateway",
    version,
    about = "AgentPRD gateway — serve the chat endpoint in the foreground"
)]
struct GatewayCli {
    #[command(flatten)]
    common: CommonArgs,
    /// Socket address to listen on (host:port)
    #[arg(long, value_name = "ADDR", env = "AGENTPRD_LISTEN")]
    listen: Option<String>,
    /// Key-value backend
    #[arg(long, value_enum)]
    store: Option<StoreArg>,
    /// Answer with an echo model instead of calling the provider
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = GatewayCli::parse();
    t::init_color(cli.common.no_color);
    logging::init(if cli.common.verbose {
        LogConfig::debug()
    } else {
        LogConfig::from_env()
    });

    let mut config = cli.common.load_config()?;
    if let Some(store) = cli.store {
        config.gateway.store = store.into();
    }
    let listen = cli
        .listen
        .clone()
        .unwrap_or_else(|| config.gateway.listen.clone());
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("invalid listen address '{listen}'"))?;

    // ── Resolve the model provider ───────────────────────────────────────
    let provider: Arc<dyn ModelProvider> = if cli.offline {
        println!(
            "{}",
            t::icon_warn("Offline mode: replies echo your message, no model is called")
        );
        Arc::new(ScriptedProvider::echo("You said: "))
    } else {
        if config.provider.api_key().is_none() {
            eprintln!(
                "{} {} is not set; requests to {} will be sent without credentials",
                t::muted("⚠"),
                config.provider.api_key_env,
                config.provider.base_url,
            );
        }
        println!(
            "{} {} ({})",
            t::icon_ok("Model:"),
            t::info(&config.provider.model),
            t::muted(&config.provider.base_url),
        );
        Arc::new(OpenAiProvider::from_config(&config.provider))
    };

    let kv = open_store(&config)?;
    let agent = Arc::new(Agent::new(provider, kv, &config.gateway));

    // Set up graceful shutdown on Ctrl+C (all platforms).
    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_for_signal.cancel();
    });

    #[cfg(unix)]
    {
        let cancel_for_term = cancel.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{SignalKind, signal};
            if let Ok(mut sig) = signal(SignalKind::terminate()) {
                sig.recv().await;
                cancel_for_term.cancel();
            }
        });
    }

    println!(
        "{}",
        t::icon_ok(&format!(
            "Gateway listening on {}",
            t::info(&format!("http://{addr}/chat"))
        ))
    );

    run_gateway(addr, agent, async move { cancel.cancelled().await }).await
}
