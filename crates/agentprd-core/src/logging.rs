//! Structured logging configuration for AgentPRD.
//!
//! Uses `tracing` with `tracing-subscriber` for configurable log levels
//! and structured output.
//!
//! ## Environment Variables
//!
//! - `AGENTPRD_LOG` or `RUST_LOG`: log filter (e.g. `agentprd=debug,warp=warn`)
//! - `AGENTPRD_LOG_FORMAT`: output format (`pretty`, `compact`, `json`)
//!
//! ```bash
//! AGENTPRD_LOG=agentprd_core=debug,warn agentprd-gateway
//! AGENTPRD_LOG_FORMAT=json agentprd-gateway
//! ```

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

const DEFAULT_FILTER: &str = "agentprd_core=info,agentprd_tui=info,agentprd=info,warn";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable with colors and indentation
    #[default]
    Pretty,
    /// Compact single-line output
    Compact,
    /// JSON output for log aggregation
    Json,
}

impl LogFormat {
    /// Parse from string (case-insensitive); unknown values fall back to pretty.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            _ => Self::Pretty,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log filter directive
    pub filter: String,
    pub format: LogFormat,
    /// Include span events (enter/exit)
    pub with_spans: bool,
    /// Include file/line in logs
    pub with_file: bool,
    /// Include target (module path)
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::Pretty,
            with_spans: false,
            with_file: false,
            with_target: true,
        }
    }
}

impl LogConfig {
    /// Build from the `AGENTPRD_LOG*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let filter = lookup("AGENTPRD_LOG")
            .or_else(|| lookup("RUST_LOG"))
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let format = lookup("AGENTPRD_LOG_FORMAT")
            .map(|s| LogFormat::parse(&s))
            .unwrap_or_default();
        Self {
            filter,
            format,
            ..Default::default()
        }
    }

    /// Verbose configuration used by `--verbose`.
    pub fn debug() -> Self {
        Self {
            filter: "agentprd_core=debug,agentprd=debug,info".to_string(),
            with_file: true,
            ..Default::default()
        }
    }
}

/// Initialize the global subscriber writing to stderr. Later calls are
/// ignored.
pub fn init(config: LogConfig) {
    let env_filter = EnvFilter::try_new(&config.filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let span_events = if config.with_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_span_events(span_events)
        .with_file(config.with_file)
        .with_line_number(config.with_file)
        .with_target(config.with_target);

    let registry = tracing_subscriber::registry().with(env_filter);
    let _ = match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(registry.with(layer.json())),
        LogFormat::Compact => {
            tracing::subscriber::set_global_default(registry.with(layer.compact()))
        }
        LogFormat::Pretty => tracing::subscriber::set_global_default(registry.with(layer.pretty())),
    };
}

/// Initialize logging into a file, for front ends that own the terminal.
pub fn init_to_file(config: LogConfig, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let env_filter = EnvFilter::try_new(&config.filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(config.with_target),
    );
    let _ = tracing::subscriber::set_global_default(subscriber);
    Ok(())
}

/// Convenience for `init(LogConfig::from_env())`.
pub fn init_from_env() {
    init(LogConfig::from_env());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("unknown"), LogFormat::Pretty);
    }

    #[test]
    fn test_config_from_lookup() {
        let empty = LogConfig::from_lookup(|_| None);
        assert_eq!(empty.filter, DEFAULT_FILTER);
        assert_eq!(empty.format, LogFormat::Pretty);

        let vars: HashMap<&str, &str> = [
            ("RUST_LOG", "debug"),
            ("AGENTPRD_LOG", "agentprd_core=trace"),
            ("AGENTPRD_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();
        let config = LogConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.filter, "agentprd_core=trace");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_debug_config() {
        let config = LogConfig::debug();
        assert!(config.filter.contains("debug"));
        assert!(config.with_file);
    }
}
