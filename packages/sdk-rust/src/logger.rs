//! Logging interface for the SDK
//!
//! Every component reports through a [`Logger`], which doubles as the
//! diagnostic sink for frames and observers that fail during dispatch.
//! [`LogFacade`] forwards to the `log` crate so applications can plug in
//! `env_logger` or any other backend.

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Logger trait that can be implemented for custom logging behavior
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
    fn log(&self, level: LogLevel, message: &str);
}

/// Console logger that prints to stdout/stderr
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    level: LogLevel,
    prefix: String,
}

impl ConsoleLogger {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            prefix: "[DEX SDK]".to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn should_log(&self, level: LogLevel) -> bool {
        level >= self.level
    }

    fn format_message(&self, level: LogLevel, message: &str) -> String {
        let level_str = match level {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        format!("{} {}: {}", self.prefix, level_str, message)
    }
}

impl Logger for ConsoleLogger {
    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    fn log(&self, level: LogLevel, message: &str) {
        if !self.should_log(level) {
            return;
        }
        match level {
            LogLevel::Debug | LogLevel::Info => println!("{}", self.format_message(level, message)),
            LogLevel::Warn | LogLevel::Error => eprintln!("{}", self.format_message(level, message)),
        }
    }
}

/// Logger backed by the `log` crate facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFacade;

const LOG_TARGET: &str = "dex_sdk";

impl Logger for LogFacade {
    fn debug(&self, message: &str) {
        log::debug!(target: LOG_TARGET, "{}", message);
    }

    fn info(&self, message: &str) {
        log::info!(target: LOG_TARGET, "{}", message);
    }

    fn warn(&self, message: &str) {
        log::warn!(target: LOG_TARGET, "{}", message);
    }

    fn error(&self, message: &str) {
        log::error!(target: LOG_TARGET, "{}", message);
    }

    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => self.debug(message),
            LogLevel::Info => self.info(message),
            LogLevel::Warn => self.warn(message),
            LogLevel::Error => self.error(message),
        }
    }
}

/// No-op logger that discards all log messages
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn debug(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
    fn log(&self, _level: LogLevel, _message: &str) {}
}
