use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use unicode_width::UnicodeWidthStr;

use super::Component;
use crate::action::Action;
use crate::palette;
use crate::state::{AppState, DisplayMessage, DisplayRole};

#[derive(Debug, Default)]
pub struct MessagesPane;

impl MessagesPane {
    pub fn new() -> Self {
        Self
    }
}

fn role_style(role: DisplayRole) -> Style {
    match role {
        DisplayRole::User => palette::accent_bold(),
        DisplayRole::Assistant => palette::success().add_modifier(Modifier::BOLD),
        DisplayRole::Tool => palette::dim(),
        DisplayRole::Info => palette::info(),
        DisplayRole::Warning => palette::warn(),
        DisplayRole::Error => palette::error(),
    }
}

fn body_style(message: &DisplayMessage) -> Style {
    match message.role {
        DisplayRole::Assistant if message.reasoning => palette::reasoning(),
        DisplayRole::User | DisplayRole::Assistant => palette::text(),
        other => role_style(other),
    }
}

/// Render every message as stripe-prefixed lines.
pub(crate) fn message_lines(state: &AppState) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for message in &state.messages {
        let stripe = Span::styled(
            format!("{} ", palette::BORDER_THICK),
            role_style(message.role),
        );

        // Tool activity stays on one compact line
        if message.role == DisplayRole::Tool {
            lines.push(Line::from(vec![
                stripe,
                Span::styled(message.content.clone(), palette::dim()),
            ]));
            continue;
        }

        let mut header = vec![
            stripe.clone(),
            Span::styled(message.role.label(), role_style(message.role)),
        ];
        if message.reasoning {
            header.push(Span::styled("  thinking", palette::dim()));
        }
        lines.push(Line::from(header));

        let style = body_style(message);
        if message.streaming && message.content.is_empty() {
            lines.push(Line::from(vec![
                stripe.clone(),
                Span::styled("…", palette::dim()),
            ]));
        }
        for text in message.content.lines() {
            lines.push(Line::from(vec![
                stripe.clone(),
                Span::styled(text.to_string(), style),
            ]));
        }
        lines.push(Line::default());
    }
    lines
}

/// Rows `lines` occupy once wrapped to `width` columns.
pub(crate) fn wrapped_height(lines: &[Line<'_>], width: u16) -> usize {
    let width = usize::from(width.max(1));
    lines
        .iter()
        .map(|line| {
            let w: usize = line.spans.iter().map(|s| s.content.width()).sum();
            w.div_ceil(width).max(1)
        })
        .sum()
}

impl Component for MessagesPane {
    fn handle_key_event(&mut self, key: KeyEvent, _state: &AppState) -> Option<Action> {
        match (key.code, key.modifiers) {
            (KeyCode::PageUp, _) | (KeyCode::Up, KeyModifiers::SHIFT) => Some(Action::ScrollUp),
            (KeyCode::PageDown, _) | (KeyCode::Down, KeyModifiers::SHIFT) => {
                Some(Action::ScrollDown)
            }
            (KeyCode::End, KeyModifiers::CONTROL) => Some(Action::ScrollBottom),
            _ => None,
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, state: &AppState) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(palette::unfocused_border())
            .title(Span::styled(" AgentPRD ", palette::accent_bold()));
        let inner = block.inner(area);

        let lines = message_lines(state);
        let total = wrapped_height(&lines, inner.width);
        let visible = usize::from(inner.height);
        let max_scroll = total.saturating_sub(visible);
        let from_bottom = usize::from(state.scroll).min(max_scroll);
        let top = u16::try_from(max_scroll - from_bottom).unwrap_or(u16::MAX);

        let paragraph = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((top, 0));
        frame.render_widget(paragraph, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_placeholder_renders_ellipsis() {
        let mut state = AppState::new("s1", false, false);
        state.begin_turn("hi");
        let lines = message_lines(&state);
        let text: Vec<String> = lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect();
        assert!(text.iter().any(|l| l.ends_with('…')));
        assert!(text.iter().any(|l| l.ends_with("You")));
    }

    #[test]
    fn wrapped_height_counts_rows() {
        let lines = vec![Line::from("abcdefghij"), Line::default()];
        assert_eq!(wrapped_height(&lines, 4), 4);
        assert_eq!(wrapped_height(&lines, 20), 2);
    }
}
