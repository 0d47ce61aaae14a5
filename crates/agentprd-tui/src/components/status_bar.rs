use std::time::Instant;

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use unicode_width::UnicodeWidthStr;

use super::Component;
use crate::palette;
use crate::state::AppState;

#[derive(Debug, Default)]
pub struct StatusBar;

impl StatusBar {
    pub fn new() -> Self {
        Self
    }
}

fn spinner_frame(since: Instant) -> &'static str {
    let step = (since.elapsed().as_millis() / 80) as usize;
    palette::SPINNER_FRAMES[step % palette::SPINNER_FRAMES.len()]
}

fn tools_label(active: usize) -> Option<String> {
    match active {
        0 => None,
        1 => Some("1 tool running".to_string()),
        n => Some(format!("{n} tools running")),
    }
}

/// Left and right halves of the status line.
pub(crate) fn status_spans(state: &AppState) -> (Vec<Span<'static>>, Vec<Span<'static>>) {
    let mut left = vec![
        Span::styled(" session ", palette::dim()),
        Span::styled(state.session_id.clone(), palette::info()),
    ];
    if let Some(since) = state.streaming_since() {
        left.push(Span::raw("  "));
        left.push(Span::styled(spinner_frame(since), palette::accent_bold()));
        left.push(Span::styled(
            format!(" streaming {}s", since.elapsed().as_secs()),
            palette::dim(),
        ));
    }
    if let Some(label) = tools_label(state.active_tools()) {
        left.push(Span::raw("  "));
        left.push(Span::styled(label, palette::warn()));
    }

    let mut right = Vec::new();
    if let Some(status) = &state.status {
        right.push(Span::styled(format!("{status}  "), palette::dim()));
    }
    if state.approval_mode {
        right.push(Span::styled("approval on  ", palette::warn()));
    }
    if state.show_reasoning() {
        right.push(Span::styled("reasoning on  ", palette::dim()));
    }
    (left, right)
}

impl Component for StatusBar {
    fn draw(&mut self, frame: &mut Frame, area: Rect, state: &AppState) {
        let (mut spans, right) = status_spans(state);
        let used: usize = spans
            .iter()
            .chain(right.iter())
            .map(|s| s.content.width())
            .sum();
        let gap = usize::from(area.width).saturating_sub(used);
        spans.push(Span::raw(" ".repeat(gap)));
        spans.extend(right);

        frame.render_widget(
            Paragraph::new(Line::from(spans)).style(palette::status_bar()),
            area,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentprd_core::protocol::ToolEvent;

    fn flatten(spans: &[Span<'_>]) -> String {
        spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn idle_line_shows_session_only() {
        let state = AppState::new("abc-123", false, false);
        let (left, right) = status_spans(&state);
        assert_eq!(flatten(&left), " session abc-123");
        assert!(right.is_empty());
    }

    #[test]
    fn streaming_line_counts_running_tools() {
        let mut state = AppState::new("abc", true, false);
        state.begin_turn("go");
        state.apply_tool_event(&ToolEvent::call_start("c1", "get_prd"));
        state.apply_tool_event(&ToolEvent::call_start("c2", "get_note"));
        let (left, right) = status_spans(&state);
        let left = flatten(&left);
        assert!(left.contains("streaming"));
        assert!(left.contains("2 tools running"));
        assert!(flatten(&right).contains("approval on"));
    }

    #[test]
    fn tool_label_pluralizes() {
        assert_eq!(tools_label(0), None);
        assert_eq!(tools_label(1).as_deref(), Some("1 tool running"));
    }
}
