//! Slash commands shared by the REPL and the TUI.

use crate::client::Conversation;
use crate::config::ClientConfig;
use crate::sessions::MessageRole;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandAction {
    None,
    /// The conversation was reset; front ends clear their message list
    ClearMessages,
    /// Approval mode changed
    SetApproval(bool),
    /// Reasoning highlighting changed
    SetReasoning(bool),
    Quit,
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub messages: Vec<String>,
    pub action: CommandAction,
}

impl CommandResponse {
    fn say(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
            action: CommandAction::None,
        }
    }

    fn quiet(action: CommandAction) -> Self {
        Self {
            messages: Vec::new(),
            action,
        }
    }
}

pub struct CommandContext<'a> {
    pub conversation: &'a mut Conversation,
    pub config: &'a mut ClientConfig,
}

/// Whether a line of input is a slash command rather than a chat message.
pub fn is_command(input: &str) -> bool {
    input.trim_start().starts_with('/')
}

/// List of all known command names (without the / prefix).
/// Includes argument forms so tab-completion works for them.
pub fn command_names() -> Vec<String> {
    [
        "help",
        "new",
        "history",
        "session",
        "approval",
        "approval on",
        "approval off",
        "reasoning",
        "reasoning on",
        "reasoning off",
        "quit",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn parse_toggle(arg: Option<&str>) -> Option<bool> {
    match arg?.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

const HELP: &[&str] = &[
    "Available commands:",
    "  /help              Show this help",
    "  /new               Start a new conversation",
    "  /history           Show the conversation history",
    "  /session           Show the current session id",
    "  /approval on|off   Hold changes to saved documents for approval",
    "  /reasoning on|off  Highlight replies that think out loud",
    "  /quit              Exit",
];

pub fn handle_command(input: &str, context: &mut CommandContext<'_>) -> CommandResponse {
    // Strip the leading '/' if present
    let trimmed = input.trim().trim_start_matches('/');
    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    let Some(&name) = parts.first() else {
        return CommandResponse::quiet(CommandAction::None);
    };

    match name {
        "help" | "?" => CommandResponse {
            messages: HELP.iter().map(|s| s.to_string()).collect(),
            action: CommandAction::None,
        },
        "new" | "clear" => {
            context.conversation.reset();
            CommandResponse {
                messages: vec![format!(
                    "Started a new conversation ({})",
                    context.conversation.session_id()
                )],
                action: CommandAction::ClearMessages,
            }
        }
        "history" => {
            let history = context.conversation.history();
            if history.is_empty() {
                return CommandResponse::say("No messages yet.");
            }
            let messages = history
                .iter()
                .map(|m| {
                    let who = match m.role {
                        MessageRole::User => "you",
                        MessageRole::Assistant => "agent",
                    };
                    format!(
                        "[{}] {}: {}",
                        m.timestamp.format("%H:%M:%S"),
                        who,
                        m.content
                    )
                })
                .collect();
            CommandResponse {
                messages,
                action: CommandAction::None,
            }
        }
        "session" => CommandResponse::say(format!(
            "Session {} ({} turns)",
            context.conversation.session_id(),
            context.conversation.user_turns()
        )),
        "approval" => match parse_toggle(parts.get(1).copied()) {
            Some(enabled) => {
                context.config.approval_mode = enabled;
                CommandResponse {
                    messages: vec![format!("Approval mode {}", on_off(enabled))],
                    action: CommandAction::SetApproval(enabled),
                }
            }
            None => CommandResponse::say(format!(
                "Approval mode is {}. Usage: /approval on|off",
                on_off(context.config.approval_mode)
            )),
        },
        "reasoning" => match parse_toggle(parts.get(1).copied()) {
            Some(enabled) => {
                context.config.show_reasoning = enabled;
                CommandResponse {
                    messages: vec![format!("Reasoning highlighting {}", on_off(enabled))],
                    action: CommandAction::SetReasoning(enabled),
                }
            }
            None => CommandResponse::say(format!(
                "Reasoning highlighting is {}. Usage: /reasoning on|off",
                on_off(context.config.show_reasoning)
            )),
        },
        "quit" | "exit" | "q" => CommandResponse::quiet(CommandAction::Quit),
        other => CommandResponse::say(format!(
            "Unknown command: /{other}. Type /help for a list of commands."
        )),
    }
}
