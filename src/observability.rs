//! Logging configuration and initialization.

use std::env;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::DashboardConfig;
use crate::error::LoggingInitError;

pub const LOG_LEVEL_ENV: &str = "MARKET_DASHBOARD_LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "MARKET_DASHBOARD_LOG_FORMAT";
pub const LOG_TARGET_ENV: &str = "MARKET_DASHBOARD_LOG_TARGET";

/// HTTP stack crates kept at warn when only a bare level is configured
const QUIET_DEPENDENCIES: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
        }
    }
}

impl LoggingConfig {
    /// Filter directive handed to `EnvFilter`
    ///
    /// A bare level such as `debug` keeps the HTTP stack at warn. Full
    /// directives are used verbatim.
    pub fn filter_directive(&self) -> String {
        if self.level.contains('=') || self.level.contains(',') {
            return self.level.clone();
        }
        let mut directive = self.level.clone();
        for krate in QUIET_DEPENDENCIES {
            directive.push_str(&format!(",{}=warn", krate));
        }
        directive
    }
}

pub fn logging_config_from_env() -> LoggingConfig {
    let mut config = LoggingConfig::default();

    if let Ok(level) = env::var(LOG_LEVEL_ENV) {
        let trimmed = level.trim();
        if !trimmed.is_empty() {
            config.level = trimmed.to_string();
        }
    }

    if let Ok(format) = env::var(LOG_FORMAT_ENV) {
        if let Some(parsed) = parse_log_format(&format) {
            config.format = parsed;
        }
    }

    if let Ok(include_target) = env::var(LOG_TARGET_ENV) {
        if let Some(parsed) = parse_bool(&include_target) {
            config.include_target = parsed;
        }
    }

    config
}

/// Installs the global subscriber
///
/// Logs go to stderr; stdout belongs to the rendered dashboard.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let env_filter = EnvFilter::try_new(config.filter_directive())
        .unwrap_or_else(|_| EnvFilter::new(LoggingConfig::default().filter_directive()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.include_target)
        .with_writer(std::io::stderr)
        .with_ansi(matches!(config.format, LogFormat::Pretty));

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }

    Ok(())
}

pub fn log_app_start(config: &LoggingConfig, dashboard: &DashboardConfig, gateway: &str) {
    info!(
        component = "market_dashboard",
        event = "app.start",
        log_level = %config.level,
        log_format = ?config.format,
        include_target = config.include_target,
        gateway,
        currency = %dashboard.currency,
        page_size = dashboard.page_size
    );
}

pub fn log_seed_loaded(entries: usize) {
    info!(
        component = "market_dashboard",
        event = "seed.loaded",
        entries
    );
}

pub fn log_command_rejected(command: &str, reason: &str) {
    debug!(
        component = "market_dashboard",
        event = "command.rejected",
        command,
        reason
    );
}

pub fn log_app_shutdown(rendered_frames: u64) {
    info!(
        component = "market_dashboard",
        event = "app.shutdown",
        rendered_frames
    );
}

fn parse_log_format(raw: &str) -> Option<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => Some(LogFormat::Json),
        "pretty" => Some(LogFormat::Pretty),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
