use std::sync::Arc;

use agentprd_core::client::{AgentClient, Conversation};
use agentprd_core::commands::{CommandAction, CommandContext, handle_command, is_command};
use agentprd_core::config::Config;
use agentprd_core::protocol::DecoderUpdate;
use anyhow::{Context, Result};
use crossterm::event::KeyEvent;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::action::{Action, TurnResult};
use crate::components::{Component, InputBar, MessagesPane, StatusBar};
use crate::state::{AppState, DisplayRole};
use crate::tui::{Event, Tui};

const SCROLL_STEP: u16 = 5;

pub struct App {
    config: Config,
    client: Arc<AgentClient>,
    conversation: Conversation,
    state: AppState,
    messages: MessagesPane,
    input: InputBar,
    status_bar: StatusBar,
    action_tx: UnboundedSender<Action>,
    action_rx: UnboundedReceiver<Action>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let client = AgentClient::new(&config.client).context("creating the gateway client")?;
        let conversation = Conversation::new();
        let state = AppState::new(
            conversation.session_id(),
            config.client.approval_mode,
            config.client.show_reasoning,
        );
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        Ok(Self {
            config,
            client: Arc::new(client),
            conversation,
            state,
            messages: MessagesPane::new(),
            input: InputBar::new(),
            status_bar: StatusBar::new(),
            action_tx,
            action_rx,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut tui = Tui::new()?;
        tui.enter()?;
        info!(gateway = %self.client.url(), "TUI started");

        loop {
            if let Some(event) = tui.next().await {
                if let Some(action) = self.handle_event(event) {
                    self.action_tx.send(action)?;
                }
            }

            while let Ok(action) = self.action_rx.try_recv() {
                match action {
                    Action::Render => {
                        tui.draw(|f| self.draw(f))?;
                    }
                    Action::Resize(w, h) => {
                        debug!(width = w, height = h, "Resized");
                        tui.draw(|f| self.draw(f))?;
                    }
                    other => {
                        if let Some(next) = self.update(other)? {
                            self.action_tx.send(next)?;
                        }
                    }
                }
            }

            if self.state.should_quit {
                break;
            }
        }

        tui.exit()?;
        info!("TUI exited");
        Ok(())
    }

    fn handle_event(&mut self, event: Event) -> Option<Action> {
        match event {
            Event::Tick => Some(Action::Tick),
            Event::Render => Some(Action::Render),
            Event::Resize(w, h) => Some(Action::Resize(w, h)),
            Event::Key(key) => self.handle_key(key),
            Event::Paste(text) => {
                if !self.state.is_streaming() {
                    self.input.insert_str(&text);
                }
                None
            }
            Event::Error(e) => {
                warn!(error = %e, "Terminal event error");
                None
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        self.messages
            .handle_key_event(key, &self.state)
            .or_else(|| self.input.handle_key_event(key, &self.state))
    }

    /// Fold one action into the state, possibly producing a follow-up.
    pub fn update(&mut self, action: Action) -> Result<Option<Action>> {
        match action {
            Action::Tick | Action::Render | Action::Resize(..) => {}
            Action::Quit => self.state.should_quit = true,
            Action::ScrollUp => self.state.scroll = self.state.scroll.saturating_add(SCROLL_STEP),
            Action::ScrollDown => self.state.scroll = self.state.scroll.saturating_sub(SCROLL_STEP),
            Action::ScrollBottom => self.state.scroll = 0,
            Action::InputSubmit(text) => {
                if is_command(&text) {
                    return self.run_command(&text);
                }
                if self.state.is_streaming() {
                    debug!("Ignoring input while a turn is in flight");
                } else {
                    self.start_turn(text);
                }
            }
            Action::StreamText(text) => self.state.append_text(&text),
            Action::StreamToolEvent(event) => self.state.apply_tool_event(&event),
            Action::TurnFinished(result) => {
                let TurnResult {
                    conversation,
                    decoded,
                } = *result;
                self.conversation = conversation;
                self.state
                    .finish_turn(&decoded, self.conversation.session_id());
            }
            Action::TurnFailed(message) => {
                self.conversation.reset();
                self.state
                    .fail_turn(&message, self.conversation.session_id());
            }
            Action::StatusLine(status) => self.state.status = Some(status),
        }
        Ok(None)
    }

    fn run_command(&mut self, input: &str) -> Result<Option<Action>> {
        if self.state.is_streaming() {
            self.state.push(
                DisplayRole::Warning,
                "Wait for the current reply before running commands.",
            );
            return Ok(None);
        }

        let response = {
            let mut ctx = CommandContext {
                conversation: &mut self.conversation,
                config: &mut self.config.client,
            };
            handle_command(input, &mut ctx)
        };

        let mut follow_up = None;
        match response.action {
            CommandAction::None => {}
            CommandAction::ClearMessages => {
                self.state.clear();
                self.state.session_id = self.conversation.session_id().to_string();
            }
            CommandAction::SetApproval(enabled) => {
                self.state.approval_mode = enabled;
                match Arc::get_mut(&mut self.client) {
                    Some(client) => client.set_approval_mode(enabled),
                    None => {
                        self.client = Arc::new(
                            AgentClient::new(&self.config.client)
                                .context("recreating the gateway client")?,
                        );
                    }
                }
            }
            CommandAction::SetReasoning(enabled) => self.state.set_show_reasoning(enabled),
            CommandAction::Quit => follow_up = Some(Action::Quit),
        }
        for message in response.messages {
            self.state.push(DisplayRole::Info, message);
        }
        Ok(follow_up)
    }

    /// Run one turn on its own task; updates come back as actions.
    fn start_turn(&mut self, text: String) {
        self.state.begin_turn(&text);
        let tx = self.action_tx.clone();
        let client = Arc::clone(&self.client);
        let mut conversation = self.conversation.clone();

        tokio::spawn(async move {
            let updates = tx.clone();
            let result = client
                .send_turn(&text, &mut conversation, |update| {
                    let action = match update {
                        DecoderUpdate::Text(text) => Action::StreamText(text.clone()),
                        DecoderUpdate::ToolEvent(event) => Action::StreamToolEvent(event.clone()),
                        DecoderUpdate::Metadata(_) => return,
                    };
                    let _ = updates.send(action);
                })
                .await;

            let action = match result {
                Ok(decoded) => Action::TurnFinished(Box::new(TurnResult {
                    conversation,
                    decoded,
                })),
                Err(e) => {
                    warn!(error = %e, "Turn failed");
                    Action::TurnFailed(e.user_message())
                }
            };
            let _ = tx.send(action);
        });
    }

    fn draw(&mut self, frame: &mut Frame) {
        let [messages, input, status] = Layout::vertical([
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        self.messages.draw(frame, messages, &self.state);
        self.input.draw(frame, input, &self.state);
        self.status_bar.draw(frame, status, &self.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use agentprd_core::protocol::{DecodedStream, StreamMetadata, ToolEvent};
    use agentprd_core::sessions::ChatMessage;

    fn app_with_url(url: &str) -> App {
        let mut config = Config::default();
        config.client.gateway_url = url.to_string();
        config.client.timeout_secs = 5;
        App::new(config).unwrap()
    }

    fn app() -> App {
        app_with_url("http://127.0.0.1:8787/chat")
    }

    #[tokio::test]
    async fn approval_command_updates_client_and_state() {
        let mut app = app();
        let next = app
            .update(Action::InputSubmit("/approval on".into()))
            .unwrap();
        assert!(next.is_none());
        assert!(app.state().approval_mode);
        assert!(app.client.approval_mode());
        assert_eq!(app.state().messages.last().unwrap().content, "Approval mode on");
    }

    #[tokio::test]
    async fn new_command_clears_messages_and_session() {
        let mut app = app();
        let before = app.conversation().session_id().to_string();
        app.update(Action::InputSubmit("/new".into())).unwrap();
        assert_ne!(app.state().session_id, before);
        assert_eq!(app.state().session_id, app.conversation().session_id());
        assert_eq!(app.state().messages.len(), 1);
    }

    #[tokio::test]
    async fn quit_command_requests_quit() {
        let mut app = app();
        let next = app.update(Action::InputSubmit("/quit".into())).unwrap();
        assert!(matches!(next, Some(Action::Quit)));
        app.update(Action::Quit).unwrap();
        assert!(app.state().should_quit);
    }

    #[tokio::test]
    async fn finished_turn_adopts_conversation() {
        let mut app = app();
        app.state.begin_turn("hello");
        app.update(Action::StreamText("Hi there".into())).unwrap();
        app.update(Action::StreamToolEvent(ToolEvent::step_finish(false)))
            .unwrap();

        let mut conversation = Conversation::with_session("server-session");
        conversation.push_unique(ChatMessage::user("hello"));
        let decoded = DecodedStream {
            content: "Hi there".into(),
            metadata: Some(StreamMetadata {
                session_id: "server-session".into(),
                conversation_history: vec![],
                needs_approval: false,
            }),
            ..Default::default()
        };
        app.update(Action::TurnFinished(Box::new(TurnResult {
            conversation,
            decoded,
        })))
        .unwrap();

        assert!(!app.state().is_streaming());
        assert_eq!(app.conversation().session_id(), "server-session");
        assert_eq!(app.state().session_id, "server-session");
    }

    #[tokio::test]
    async fn unreachable_gateway_fails_the_turn() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut app = app_with_url(&format!("http://127.0.0.1:{port}/chat"));
        let before = app.conversation().session_id().to_string();

        app.update(Action::InputSubmit("hello".into())).unwrap();
        assert!(app.state().is_streaming());

        let action = tokio::time::timeout(Duration::from_secs(10), app.action_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(action, Action::TurnFailed(_)));
        app.update(action).unwrap();

        assert!(!app.state().is_streaming());
        assert_ne!(app.conversation().session_id(), before);
        assert!(app.conversation().history().is_empty());
        assert!(
            app.state()
                .messages
                .iter()
                .any(|m| m.role == DisplayRole::Error)
        );
    }

    #[tokio::test]
    async fn commands_wait_for_streaming_turn() {
        let mut app = app();
        app.state.begin_turn("hello");
        app.update(Action::InputSubmit("/new".into())).unwrap();
        assert_eq!(
            app.state().messages.last().unwrap().role,
            DisplayRole::Warning
        );
        assert!(app.state().is_streaming());
    }
}
