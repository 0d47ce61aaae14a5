use agentprd_core::commands::command_names;
use crossterm::event::{Event as CrosstermEvent, KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Position, Rect};
use ratatui::text::Span;
use ratatui::widgets::{Block, Borders, Paragraph};
use tui_input::backend::crossterm::EventHandler;
use tui_input::{Input, InputRequest};

use super::Component;
use crate::action::Action;
use crate::palette;
use crate::state::AppState;

/// Single-line prompt with command completion and input history.
pub struct InputBar {
    input: Input,
    commands: Vec<String>,
    history: Vec<String>,
    /// Position while browsing history; `None` means editing a fresh line
    history_index: Option<usize>,
}

impl Default for InputBar {
    fn default() -> Self {
        Self::new()
    }
}

impl InputBar {
    pub fn new() -> Self {
        Self {
            input: Input::default(),
            commands: command_names(),
            history: Vec::new(),
            history_index: None,
        }
    }

    pub fn value(&self) -> &str {
        self.input.value()
    }

    pub fn insert_str(&mut self, text: &str) {
        for c in text.chars().filter(|c| *c != '\r') {
            let c = if c == '\n' { ' ' } else { c };
            self.input.handle(InputRequest::InsertChar(c));
        }
    }

    /// Candidates for the `/command` being typed.
    pub fn completions(&self) -> Vec<&str> {
        let Some(prefix) = self.input.value().strip_prefix('/') else {
            return Vec::new();
        };
        self.commands
            .iter()
            .map(String::as_str)
            .filter(|c| c.starts_with(prefix) && *c != prefix)
            .collect()
    }

    fn complete(&mut self) {
        let next = self.completions().first().map(|c| format!("/{c}"));
        if let Some(next) = next {
            self.input = Input::new(next);
        }
    }

    fn submit(&mut self) -> Option<Action> {
        let text = self.input.value().trim().to_string();
        if text.is_empty() {
            return None;
        }
        if self.history.last() != Some(&text) {
            self.history.push(text.clone());
        }
        self.history_index = None;
        self.input.reset();
        Some(Action::InputSubmit(text))
    }

    fn browse(&mut self, older: bool) {
        if self.history.is_empty() {
            return;
        }
        let last = self.history.len() - 1;
        self.history_index = match (self.history_index, older) {
            (None, true) => Some(last),
            (None, false) => None,
            (Some(i), true) => Some(i.saturating_sub(1)),
            (Some(i), false) if i < last => Some(i + 1),
            (Some(_), false) => None,
        };
        let value = self
            .history_index
            .and_then(|i| self.history.get(i))
            .cloned()
            .unwrap_or_default();
        self.input = Input::new(value);
    }
}

impl Component for InputBar {
    fn handle_key_event(&mut self, key: KeyEvent, state: &AppState) -> Option<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Action::Quit);
        }
        match key.code {
            // One turn at a time
            KeyCode::Enter if state.is_streaming() => None,
            KeyCode::Enter => self.submit(),
            KeyCode::Tab => {
                self.complete();
                None
            }
            KeyCode::Up if key.modifiers.is_empty() => {
                self.browse(true);
                None
            }
            KeyCode::Down if key.modifiers.is_empty() => {
                self.browse(false);
                None
            }
            _ => {
                self.input.handle_event(&CrosstermEvent::Key(key));
                None
            }
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, state: &AppState) {
        let (title, border) = if state.is_streaming() {
            (" Waiting for the reply… ", palette::unfocused_border())
        } else {
            (" Message (Enter to send, /help) ", palette::focused_border())
        };
        let mut block = Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(Span::styled(title, border));
        let hints = self.completions();
        if !hints.is_empty() {
            let hint = format!(" Tab: /{} ", hints.join("  /"));
            block = block.title_bottom(Span::styled(hint, palette::dim()));
        }

        let width = area.width.saturating_sub(2).max(1) as usize;
        let scroll = self.input.visual_scroll(width);
        let style = if state.is_streaming() {
            palette::dim()
        } else {
            palette::text()
        };
        let paragraph = Paragraph::new(self.input.value())
            .style(style)
            .scroll((0, u16::try_from(scroll).unwrap_or(0)))
            .block(block);
        frame.render_widget(paragraph, area);

        if !state.is_streaming() {
            let offset = self.input.visual_cursor().saturating_sub(scroll);
            let x = area.x + 1 + u16::try_from(offset).unwrap_or(0);
            frame.set_cursor_position(Position::new(x, area.y + 1));
        }
    }
}
