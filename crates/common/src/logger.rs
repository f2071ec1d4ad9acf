//! Console and per-scenario file logging
//!
//! Console output is plain `tracing`. Each scenario additionally keeps its
//! own buffer of formatted lines which the session writes to
//! `<root>/logs/<stem>.log` at teardown when the logging flags ask for it.

use chrono::Utc;
use std::path::PathBuf;
use std::time::Instant;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{ConfigKey, ConfigurationManager};
use crate::error::{Error, Result};
use crate::scenario::ScenarioContext;

pub const LOG_FOLDER: &str = "logs";
pub const DEFAULT_LEVEL: Level = Level::INFO;

/// Map a level name to a `tracing` level.
///
/// Accepts the `java.util.logging` names used by existing configuration
/// files as well as the `tracing` names.
pub fn parse_level(name: &str) -> Result<Level> {
    match name.trim().to_ascii_uppercase().as_str() {
        "SEVERE" | "ERROR" => Ok(Level::ERROR),
        "WARNING" | "WARN" => Ok(Level::WARN),
        "INFO" => Ok(Level::INFO),
        "CONFIG" | "FINE" | "DEBUG" => Ok(Level::DEBUG),
        "FINER" | "FINEST" | "ALL" | "TRACE" => Ok(Level::TRACE),
        other => Err(Error::Configuration(format!("Unknown log level {}", other))),
    }
}

fn configured_level(config: &ConfigurationManager, key: ConfigKey) -> Result<Level> {
    config
        .configuration()
        .string(key)
        .map(|name| parse_level(&name))
        .transpose()
        .map(|level| level.unwrap_or(DEFAULT_LEVEL))
}

/// Install the global console subscriber.
///
/// `RUST_LOG` wins when set; otherwise `minimumLogLevelConsole` decides.
/// Calling this twice is harmless.
pub fn init_tracing(config: &ConfigurationManager) -> Result<()> {
    let level = configured_level(config, ConfigKey::MinimumLogLevelConsole)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));

    if tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already installed");
    }
    Ok(())
}

/// Logger owned by one scenario
#[derive(Debug, Clone)]
pub struct ScenarioLogger {
    /// `None` when neither logging flag is set, nothing is buffered then
    file_level: Option<Level>,
    lines: Vec<String>,
}

impl ScenarioLogger {
    /// Buffer records at or above `file_level`, or nothing when `None`.
    pub fn new(file_level: Option<Level>) -> Self {
        Self {
            file_level,
            lines: Vec::new(),
        }
    }

    pub fn from_config(config: &ConfigurationManager) -> Result<Self> {
        let settings = config.configuration();
        let to_file = settings.flag_or(ConfigKey::LogToFileAlways, false)
            || settings.flag_or(ConfigKey::LogToFileOnFailure, false);

        let file_level = if to_file {
            Some(configured_level(config, ConfigKey::MinimumLogLevelFile)?)
        } else {
            None
        };
        Ok(Self::new(file_level))
    }

    pub fn log(&mut self, level: Level, message: impl AsRef<str>) {
        let message = message.as_ref();
        match level {
            Level::ERROR => tracing::error!("{}", message),
            Level::WARN => tracing::warn!("{}", message),
            Level::INFO => tracing::info!("{}", message),
            Level::DEBUG => tracing::debug!("{}", message),
            _ => tracing::trace!("{}", message),
        }

        // tracing orders levels by verbosity: ERROR < WARN < ... < TRACE
        if self.file_level.is_some_and(|min| level <= min) {
            self.lines.push(format!(
                "{} {:<5} {}",
                Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                level.as_str(),
                message
            ));
        }
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        self.log(Level::ERROR, message);
    }

    pub fn warn(&mut self, message: impl AsRef<str>) {
        self.log(Level::WARN, message);
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        self.log(Level::INFO, message);
    }

    pub fn debug(&mut self, message: impl AsRef<str>) {
        self.log(Level::DEBUG, message);
    }

    pub fn trace(&mut self, message: impl AsRef<str>) {
        self.log(Level::TRACE, message);
    }

    /// Run `action` and log how long it took at debug level.
    pub fn timed<T>(&mut self, label: &str, action: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let result = action();
        self.debug(format!("{} took {} ms", label, started.elapsed().as_millis()));
        result
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Write buffered lines to `<root>/logs/<stem>.log`.
    pub fn flush(&self, context: &ScenarioContext) -> Result<Option<PathBuf>> {
        if self.file_level.is_none() {
            return Ok(None);
        }

        let path = context.file_name_for(LOG_FOLDER, "log");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut content = self.lines.join("\n");
        content.push('\n');
        std::fs::write(&path, content)?;

        tracing::info!("Log written to: {}", path.display());
        Ok(Some(path))
    }

    pub fn teardown(&mut self) {
        self.lines.clear();
    }
}
