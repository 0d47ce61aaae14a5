// ── Ratatui TUI palette ─────────────────────────────────────────────────────
//
// `ratatui::style::Color` and `Style` values derived from the core colour
// palette, so the TUI and the REPL agree on what each colour means.

use ratatui::style::{Color, Modifier, Style};

use agentprd_core::theme::palette;

const fn rgb(c: (u8, u8, u8)) -> Color {
    Color::Rgb(c.0, c.1, c.2)
}

// ── Glyphs ──────────────────────────────────────────────────────

/// Left stripe drawn beside every message
pub const BORDER_THICK: &str = "▌";

/// Tool call in progress
pub const ICON_PENDING: &str = "●";
pub const ICON_SUCCESS: &str = "✓";
pub const ICON_ERROR: &str = "×";
/// Tool call held for approval
pub const ICON_HELD: &str = "‖";

/// Braille spinner frames for the streaming indicator.
pub const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

// ── Colours ─────────────────────────────────────────────────────

pub const ACCENT: Color = rgb(palette::ACCENT);
pub const INFO: Color = rgb(palette::INFO);
pub const SUCCESS: Color = rgb(palette::SUCCESS);
pub const WARN: Color = rgb(palette::WARN);
pub const ERROR: Color = rgb(palette::ERROR);
pub const MUTED: Color = rgb(palette::MUTED);

pub const SURFACE: Color = Color::Rgb(0x14, 0x14, 0x14);
pub const TEXT: Color = Color::Rgb(0xEE, 0xEE, 0xEE);
pub const TEXT_DIM: Color = Color::Rgb(0x82, 0x82, 0x82);
pub const BG_THINKING: Color = Color::Rgb(0x18, 0x16, 0x14);

// ── Pre-built styles ────────────────────────────────────────────

pub const fn text() -> Style {
    Style::new().fg(TEXT)
}

pub const fn dim() -> Style {
    Style::new().fg(TEXT_DIM)
}

pub const fn accent_bold() -> Style {
    Style::new().fg(ACCENT).add_modifier(Modifier::BOLD)
}

/// Replies that open by thinking out loud.
pub const fn reasoning() -> Style {
    Style::new()
        .fg(MUTED)
        .bg(BG_THINKING)
        .add_modifier(Modifier::ITALIC)
}

pub const fn info() -> Style {
    Style::new().fg(INFO)
}

pub const fn success() -> Style {
    Style::new().fg(SUCCESS)
}

pub const fn warn() -> Style {
    Style::new().fg(WARN)
}

pub const fn error() -> Style {
    Style::new().fg(ERROR)
}

pub const fn focused_border() -> Style {
    Style::new().fg(ACCENT)
}

pub const fn unfocused_border() -> Style {
    Style::new().fg(MUTED)
}

pub const fn status_bar() -> Style {
    Style::new().fg(TEXT_DIM).bg(SURFACE)
}
