use std::io::Write;

use agentprd_core::args::CommonArgs;
use agentprd_core::client::{AgentClient, Conversation};
use agentprd_core::commands::{CommandAction, CommandContext, handle_command, is_command};
use agentprd_core::config::Config;
use agentprd_core::error::ClientError;
use agentprd_core::logging::{self, LogConfig};
use agentprd_core::protocol::{DecodedStream, DecoderUpdate, ToolEvent, ToolEventKind};
use agentprd_core::reasoning::ReasoningDetector;
use agentprd_core::theme as t;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};

// ── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "agentprd",
    version,
    about = "AgentPRD — talk to the product-management agent"
)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Interactive chat in the terminal (default)
    Chat,
    /// Send a single message and print the reply
    Ask {
        /// The message to send
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
        /// Wait for the full reply instead of streaming it
        #[arg(long)]
        buffered: bool,
        /// Hold changes to saved documents for approval
        #[arg(long)]
        approval: bool,
    },
    /// Full-screen terminal UI
    #[cfg(feature = "tui")]
    Tui,
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    t::init_color(cli.common.no_color);
    let config = cli.common.load_config()?;

    match cli.command.unwrap_or(Commands::Chat) {
        #[cfg(feature = "tui")]
        Commands::Tui => agentprd_tui::run(config, cli.common.verbose).await,
        Commands::Chat => {
            init_logging(cli.common.verbose);
            run_chat(config).await
        }
        Commands::Ask {
            message,
            buffered,
            approval,
        } => {
            init_logging(cli.common.verbose);
            run_ask(config, &message.join(" "), buffered, approval).await
        }
        Commands::Config => {
            print_config(&cli.common, &config);
            Ok(())
        }
    }
}

/// Keep the terminal quiet unless asked otherwise; replies share stdout.
fn init_logging(verbose: bool) {
    if verbose {
        logging::init(LogConfig::debug());
        return;
    }
    let explicit = std::env::var_os("AGENTPRD_LOG").is_some() || std::env::var_os("RUST_LOG").is_some();
    let mut log_config = LogConfig::from_env();
    if !explicit {
        log_config.filter = "warn".to_string();
    }
    logging::init(log_config);
}

// ── Rendering ───────────────────────────────────────────────────────────────

fn describe_tool_event(event: &ToolEvent) -> Option<String> {
    let name = event.tool_name.as_deref().unwrap_or("tool");
    match event.kind {
        ToolEventKind::CallStart => Some(format!("● {name}…")),
        ToolEventKind::Call => None,
        ToolEventKind::Result => {
            let result = event.result.as_ref();
            if let Some(error) = result.and_then(|r| r.get("error")).and_then(Value::as_str) {
                Some(format!("× {name}: {error}"))
            } else if result.and_then(|r| r.get("status")).and_then(Value::as_str)
                == Some("pending_approval")
            {
                Some(format!("‖ {name} held for approval"))
            } else {
                Some(format!("✓ {name}"))
            }
        }
        ToolEventKind::StepFinish => None,
    }
}

/// Stream one turn to stdout as it arrives.
async fn stream_turn(
    client: &AgentClient,
    conversation: &mut Conversation,
    message: &str,
    show_reasoning: bool,
) -> Result<DecodedStream, ClientError> {
    let spinner = t::spinner("Thinking…");
    let mut detector = ReasoningDetector::new(show_reasoning);
    let mut started = false;
    let mut at_line_start = true;
    let mut stdout = std::io::stdout();

    let result = client
        .send_turn(message, conversation, |update| {
            if !started {
                spinner.finish_and_clear();
                started = true;
            }
            match update {
                DecoderUpdate::Text(text) => {
                    if detector.observe(text) {
                        print!("{}", t::muted(text));
                    } else {
                        print!("{text}");
                    }
                    let _ = stdout.flush();
                    at_line_start = text.ends_with('\n');
                }
                DecoderUpdate::ToolEvent(event) => {
                    if let Some(line) = describe_tool_event(event) {
                        if !at_line_start {
                            println!();
                        }
                        println!("{}", t::muted(&line));
                        at_line_start = true;
                    }
                }
                DecoderUpdate::Metadata(_) => {}
            }
        })
        .await;
    spinner.finish_and_clear();
    if !at_line_start {
        println!();
    }
    result
}

fn print_turn_notes(decoded: &DecodedStream, conversation: &Conversation) {
    match &decoded.metadata {
        Some(meta) if meta.needs_approval => {
            println!(
                "{}",
                t::icon_warn("Some changes are waiting for your approval. Reply to confirm them.")
            );
        }
        Some(_) => {}
        None => println!(
            "{}",
            t::icon_warn(&format!(
                "The reply was cut short. Continuing in a new session ({}).",
                conversation.session_id()
            ))
        ),
    }
}

// ── Commands ────────────────────────────────────────────────────────────────

async fn run_chat(mut config: Config) -> Result<()> {
    let mut client = AgentClient::new(&config.client).context("creating the gateway client")?;
    let mut conversation = Conversation::new();

    println!("{}", t::heading("AgentPRD"));
    println!("{}", t::label_value("Gateway", client.url().as_str()));
    println!("{}", t::label_value("Session", conversation.session_id()));
    println!("  {}", t::muted("Type /help for commands, /quit to leave."));
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", t::accent("you ›"));
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if is_command(line) {
            let response = {
                let mut ctx = CommandContext {
                    conversation: &mut conversation,
                    config: &mut config.client,
                };
                handle_command(line, &mut ctx)
            };
            for message in &response.messages {
                println!("{}", t::info(message));
            }
            match response.action {
                CommandAction::SetApproval(enabled) => client.set_approval_mode(enabled),
                CommandAction::Quit => break,
                CommandAction::None
                | CommandAction::ClearMessages
                | CommandAction::SetReasoning(_) => {}
            }
            continue;
        }

        println!("{}", t::accent("agent ›"));
        match stream_turn(&client, &mut conversation, line, config.client.show_reasoning).await {
            Ok(decoded) => print_turn_notes(&decoded, &conversation),
            Err(e) => {
                tracing::warn!(error = %e, "Turn failed");
                conversation.reset();
                eprintln!("{}", t::icon_fail(&e.user_message()));
                eprintln!(
                    "{}",
                    t::muted(&format!("Started a new session ({}).", conversation.session_id()))
                );
            }
        }
        println!();
    }
    Ok(())
}

async fn run_ask(mut config: Config, message: &str, buffered: bool, approval: bool) -> Result<()> {
    if approval {
        config.client.approval_mode = true;
    }
    let client = AgentClient::new(&config.client).context("creating the gateway client")?;
    let mut conversation = Conversation::new();

    if buffered {
        let reply = client
            .send_buffered(message, &mut conversation)
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
        println!("{}", reply.content);
        if reply.needs_approval {
            println!(
                "{}",
                t::icon_warn("Some changes are waiting for your approval.")
            );
        }
        return Ok(());
    }

    let decoded = stream_turn(&client, &mut conversation, message, config.client.show_reasoning)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    print_turn_notes(&decoded, &conversation);
    Ok(())
}

fn print_config(common: &CommonArgs, config: &Config) {
    let config_path = common
        .config_path()
        .unwrap_or_else(|| config.settings_dir.join("config.toml"));
    println!("{}", t::heading("AgentPRD configuration"));
    println!("{}", t::label_value("Config file", &config_path.display().to_string()));
    println!("{}", t::label_value("Settings dir", &config.settings_dir.display().to_string()));
    println!("{}", t::label_value("Gateway URL", &config.client.gateway_url));
    println!("{}", t::label_value("Timeout", &format!("{}s", config.client.timeout_secs)));
    println!("{}", t::label_value("Listen", &config.gateway.listen));
    println!("{}", t::label_value("Store", &format!("{:?}", config.gateway.store).to_lowercase()));
    println!("{}", t::label_value("Database", &config.db_path().display().to_string()));
    println!("{}", t::label_value("Model", &config.provider.model));
    println!("{}", t::label_value("Log file", &config.log_path().display().to_string()));
}
