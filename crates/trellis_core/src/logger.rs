//! Logging facade.
//!
//! A [`Logger`] formats a single line out of the level, timestamp, process,
//! thread, prefix, calling location and message, then hands it to a
//! [`LogSink`]. Empty fields are dropped from the line so a logger without a
//! prefix does not print double spaces.
//!
//! The default sink forwards every line to `tracing`, so the host
//! application decides where records end up.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::panic::Location;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::DslError;

/// Severity of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Debug
    Debug,
    /// Info
    Info,
    /// Warn
    Warn,
    /// Error
    Error,
    /// Fatal
    Fatal,
    /// Unknown
    Unknown,
}

impl Level {
    /// Every level, least severe first
    pub const ALL: [Level; 6] = [
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
        Level::Unknown,
    ];

    /// Lowercase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = DslError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DslError::InvalidConfig {
                reason: format!("unknown log level: {}", s),
            })
    }
}

/// Format a level as its upper-cased first character
///
/// Returns `None` for an empty level name.
#[must_use]
pub fn format_level(level: &str) -> Option<String> {
    level.chars().next().map(|c| c.to_uppercase().collect())
}

/// Destination for formatted log lines
pub trait LogSink: Send + Sync {
    /// Write one formatted line
    fn write(&self, level: Level, line: &str);
}

/// Sink forwarding lines to `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, level: Level, line: &str) {
        match level {
            Level::Debug => tracing::debug!("{}", line),
            Level::Info => tracing::info!("{}", line),
            Level::Warn => tracing::warn!("{}", line),
            Level::Error | Level::Fatal | Level::Unknown => tracing::error!("{}", line),
        }
    }
}

/// Sink printing lines to standard output
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write(&self, _level: Level, line: &str) {
        println!("{}", line);
    }
}

/// Sink collecting lines in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines written so far
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    /// Drop collected lines
    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }
}

impl LogSink for MemorySink {
    fn write(&self, _level: Level, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

/// The fields making up one log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Severity
    pub level: Level,
    /// Wall-clock time
    pub timestamp: Option<DateTime<Utc>>,
    /// Process id
    pub process: Option<u32>,
    /// Thread name or id
    pub thread: Option<String>,
    /// Logger prefix
    pub prefix: String,
    /// Calling location
    pub caller: Option<String>,
    /// Message text
    pub message: String,
}

impl LogRecord {
    /// Record with only a level and message
    #[must_use]
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: None,
            process: None,
            thread: None,
            prefix: String::new(),
            caller: None,
            message: message.into(),
        }
    }

    /// Render the record, separating present fields with single spaces
    #[must_use]
    pub fn format(&self) -> String {
        let fields = [
            format_level(self.level.as_str()),
            self.timestamp
                .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
            self.process.map(|pid| pid.to_string()),
            self.thread.clone(),
            Some(self.prefix.clone()),
            self.caller.clone(),
            Some(self.message.clone()),
        ];

        fields
            .into_iter()
            .flatten()
            .filter(|field| !field.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn current_thread() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}

/// Prefixed logger writing to a shared sink
#[derive(Clone)]
pub struct Logger {
    prefix: String,
    sink: Arc<dyn LogSink>,
    print_caller: bool,
    enabled: Arc<AtomicBool>,
}

impl Logger {
    /// Create a logger writing to `tracing`
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_sink(prefix, Arc::new(TracingSink))
    }

    /// Create a logger writing to the given sink
    #[must_use]
    pub fn with_sink(prefix: impl Into<String>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            prefix: prefix.into(),
            sink,
            print_caller: true,
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Set whether the calling location is printed
    #[must_use]
    pub fn with_print_caller(mut self, print_caller: bool) -> Self {
        self.print_caller = print_caller;
        self
    }

    /// Prefix printed before every message
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether the calling location is printed
    #[must_use]
    pub fn print_caller(&self) -> bool {
        self.print_caller
    }

    /// Turn output on for this logger and every logger derived from it
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    /// Turn output off for this logger and every logger derived from it
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    /// Whether lines are written
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Write a message at the given level
    #[track_caller]
    pub fn log(&self, level: Level, message: impl AsRef<str>) {
        if !self.is_enabled() {
            return;
        }
        let line = self.format_message(level, message.as_ref(), Some(Location::caller()));
        self.sink.write(level, &line);
    }

    /// Build the record for a message without writing it
    #[must_use]
    pub fn record(
        &self,
        level: Level,
        message: &str,
        caller: Option<&Location<'_>>,
    ) -> LogRecord {
        LogRecord {
            level,
            timestamp: Some(Utc::now()),
            process: Some(std::process::id()),
            thread: Some(current_thread()),
            prefix: self.prefix.clone(),
            caller: caller
                .filter(|_| self.print_caller)
                .map(|loc| format!("{}:{}", loc.file(), loc.line())),
            message: message.to_string(),
        }
    }

    /// Format a message into a single line
    #[must_use]
    pub fn format_message(
        &self,
        level: Level,
        message: &str,
        caller: Option<&Location<'_>>,
    ) -> String {
        self.record(level, message, caller).format()
    }

    /// Derive a logger whose prefix is this prefix followed by `new_prefix`
    ///
    /// The derived logger shares the sink and the enable switch.
    #[must_use]
    pub fn with_prefix(&self, new_prefix: &str) -> Logger {
        let prefix = [self.prefix.as_str(), new_prefix]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Logger {
            prefix,
            sink: Arc::clone(&self.sink),
            print_caller: self.print_caller,
            enabled: Arc::clone(&self.enabled),
        }
    }

    /// Run `f` with a derived logger
    pub fn scoped<R>(&self, new_prefix: &str, f: impl FnOnce(&Logger) -> R) -> R {
        f(&self.with_prefix(new_prefix))
    }

    /// Debug
    #[track_caller]
    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(Level::Debug, message);
    }

    /// Info
    #[track_caller]
    pub fn info(&self, message: impl AsRef<str>) {
        self.log(Level::Info, message);
    }

    /// Warn
    #[track_caller]
    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(Level::Warn, message);
    }

    /// Error
    #[track_caller]
    pub fn error(&self, message: impl AsRef<str>) {
        self.log(Level::Error, message);
    }

    /// Fatal
    #[track_caller]
    pub fn fatal(&self, message: impl AsRef<str>) {
        self.log(Level::Fatal, message);
    }

    /// Unknown
    #[track_caller]
    pub fn unknown(&self, message: impl AsRef<str>) {
        self.log(Level::Unknown, message);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new("")
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("prefix", &self.prefix)
            .field("print_caller", &self.print_caller)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Types that own a [`Logger`] and log through it directly
///
/// Implementors only provide [`Logged::logger`]; the level methods forward to it.
pub trait Logged {
    /// Logger used by this value
    fn logger(&self) -> &Logger;

    /// Prefix for a logger created for this type: its unqualified type name
    fn logger_prefix() -> String
    where
        Self: Sized,
    {
        let path = std::any::type_name::<Self>();
        crate::naming::demodulize(path).to_string()
    }

    /// Write a message at the given level
    #[track_caller]
    fn log(&self, level: Level, message: impl AsRef<str>)
    where
        Self: Sized,
    {
        self.logger().log(level, message);
    }

    /// Derive a logger with an extra prefix
    fn with_prefix(&self, new_prefix: &str) -> Logger {
        self.logger().with_prefix(new_prefix)
    }

    /// Debug
    #[track_caller]
    fn debug(&self, message: impl AsRef<str>)
    where
        Self: Sized,
    {
        self.logger().debug(message);
    }

    /// Info
    #[track_caller]
    fn info(&self, message: impl AsRef<str>)
    where
        Self: Sized,
    {
        self.logger().info(message);
    }

    /// Warn
    #[track_caller]
    fn warn(&self, message: impl AsRef<str>)
    where
        Self: Sized,
    {
        self.logger().warn(message);
    }

    /// Error
    #[track_caller]
    fn error(&self, message: impl AsRef<str>)
    where
        Self: Sized,
    {
        self.logger().error(message);
    }

    /// Fatal
    #[track_caller]
    fn fatal(&self, message: impl AsRef<str>)
    where
        Self: Sized,
    {
        self.logger().fatal(message);
    }

    /// Unknown
    #[track_caller]
    fn unknown(&self, message: impl AsRef<str>)
    where
        Self: Sized,
    {
        self.logger().unknown(message);
    }
}
