//! Structured logging utilities for VFS log inspection.
//!
//! Provides consistent logging with component prefixes and structured fields.
//! The library crates only emit events; installing a subscriber is up to the
//! embedding tool (see [`init_logging`]).
//!
//! # Usage
//!
//! ```ignore
//! use vfslog_config::log_chronicle_debug;
//!
//! log_chronicle_debug!("Window exhausted", file_id = 7, reads = 12);
//! ```

/// Component identifiers for log filtering
pub struct Component;

impl Component {
    pub const CHRONICLE: &'static str = "CHRONICLE";
    pub const SNAPSHOT: &'static str = "SNAPSHOT";
    pub const ORACLE: &'static str = "ORACLE";
    pub const CACHE: &'static str = "CACHE";
}

/// Log levels for runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// === CHRONICLE logging macros ===

#[macro_export]
macro_rules! log_chronicle_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "CHRONICLE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_chronicle_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "CHRONICLE", $($key = $value,)* $msg)
    };
}

// === SNAPSHOT logging macros ===

#[macro_export]
macro_rules! log_snapshot_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "SNAPSHOT", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_snapshot_error {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::error!(component = "SNAPSHOT", $($key = $value,)* $msg)
    };
}

// === ORACLE logging macros ===

#[macro_export]
macro_rules! log_oracle_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "ORACLE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_oracle_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "ORACLE", $($key = $value,)* $msg)
    };
}

// === CACHE logging macros ===

#[macro_export]
macro_rules! log_cache_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "CACHE", $($key = $value,)* $msg)
    };
}

/// Initialize logging with the given level filter.
/// Call this once at application startup; `RUST_LOG` takes precedence.
pub fn init_logging(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // A second call (e.g. from another test) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}
