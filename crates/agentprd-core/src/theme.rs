//! Terminal colour helpers for the REPL and the gateway binary.
//!
//! Respects the `NO_COLOR` env-var and the `--no-color` flag.
//!
//! | Token   | Hex       | Usage                        |
//! |---------|-----------|------------------------------|
//! | accent  | `#4F8CFF` | prompts, headings            |
//! | info    | `#7FB2FF` | values, session ids          |
//! | success | `#2FBF71` | completed tool calls         |
//! | warn    | `#FFB020` | approvals, fallbacks         |
//! | error   | `#E23D2D` | failures                     |
//! | muted   | `#8B8F99` | tool activity, metadata      |

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

static COLOR_DISABLED: AtomicBool = AtomicBool::new(false);

/// Initialise the colour system from the `--no-color` flag and `NO_COLOR`.
pub fn init_color(no_color_flag: bool) {
    let env_disabled = std::env::var("NO_COLOR")
        .map(|v| !v.is_empty())
        .unwrap_or(false);
    if no_color_flag || env_disabled {
        COLOR_DISABLED.store(true, Ordering::Relaxed);
        colored::control::set_override(false);
    }
}

fn is_color() -> bool {
    !COLOR_DISABLED.load(Ordering::Relaxed)
}

pub mod palette {
    pub const ACCENT: (u8, u8, u8) = (0x4F, 0x8C, 0xFF);
    pub const INFO: (u8, u8, u8) = (0x7F, 0xB2, 0xFF);
    pub const SUCCESS: (u8, u8, u8) = (0x2F, 0xBF, 0x71);
    pub const WARN: (u8, u8, u8) = (0xFF, 0xB0, 0x20);
    pub const ERROR: (u8, u8, u8) = (0xE2, 0x3D, 0x2D);
    pub const MUTED: (u8, u8, u8) = (0x8B, 0x8F, 0x99);
}

fn apply(text: &str, rgb: (u8, u8, u8)) -> String {
    if is_color() {
        text.truecolor(rgb.0, rgb.1, rgb.2).to_string()
    } else {
        text.to_string()
    }
}

pub fn accent(text: &str) -> String {
    apply(text, palette::ACCENT)
}

pub fn info(text: &str) -> String {
    apply(text, palette::INFO)
}

pub fn success(text: &str) -> String {
    apply(text, palette::SUCCESS)
}

pub fn warn(text: &str) -> String {
    apply(text, palette::WARN)
}

pub fn error(text: &str) -> String {
    apply(text, palette::ERROR)
}

pub fn muted(text: &str) -> String {
    apply(text, palette::MUTED)
}

/// Bold heading in accent colour.
pub fn heading(text: &str) -> String {
    if is_color() {
        let (r, g, b) = palette::ACCENT;
        text.truecolor(r, g, b).bold().to_string()
    } else {
        text.to_string()
    }
}

pub fn icon_ok(label: &str) -> String {
    format!("{} {}", success("✓"), label)
}

pub fn icon_fail(label: &str) -> String {
    format!("{} {}", error("✗"), label)
}

pub fn icon_warn(label: &str) -> String {
    format!("{} {}", warn("⚠"), label)
}

/// "  Label : value" with the label muted.
pub fn label_value(label: &str, value: &str) -> String {
    format!("  {} : {}", muted(label), info(value))
}

const SPINNER_CHARS: &[&str] = &["◒", "◐", "◓", "◑"];

/// Indeterminate spinner shown while waiting for the first bytes of a reply.
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let template = if is_color() {
        "{spinner:.blue}  {msg}"
    } else {
        "{spinner}  {msg}"
    };
    if let Ok(style) = ProgressStyle::with_template(template) {
        pb.set_style(style.tick_strings(SPINNER_CHARS));
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
