//! Logging
//!
//! `tracing-subscriber` setup: an `EnvFilter`, a stdout layer and, in debug
//! mode or when a log file is configured, a non-blocking file layer.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_FILE_PREFIX: &str = "pinbot.log";

#[derive(Debug, Clone)]
pub struct LogConfig {
    level: String,
    debug_mode: bool,
    log_dir: PathBuf,
    log_file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self {
            level: "info".to_string(),
            debug_mode: false,
            log_dir: crate::config::pinbot_home().join("logs"),
            log_file: None,
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Debug mode logs at `debug` and writes a daily-rotated file.
    pub fn with_debug_mode(mut self, debug: bool) -> Self {
        self.debug_mode = debug;
        self
    }

    pub fn with_log_dir(mut self, dir: PathBuf) -> Self {
        self.log_dir = dir;
        self
    }

    pub fn with_log_file(mut self, file: Option<PathBuf>) -> Self {
        self.log_file = file;
        self
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// `RUST_LOG` wins over the configured level.
    fn filter(&self) -> EnvFilter {
        let level = if self.debug_mode { "debug" } else { self.level.as_str() };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    }

    fn file_appender(&self) -> Result<Option<tracing_appender::rolling::RollingFileAppender>> {
        if self.debug_mode {
            std::fs::create_dir_all(&self.log_dir)?;
            return Ok(Some(tracing_appender::rolling::daily(
                &self.log_dir,
                LOG_FILE_PREFIX,
            )));
        }

        let Some(file) = &self.log_file else {
            return Ok(None);
        };
        let dir = file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = file
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("log file has no name: {:?}", file))?;
        std::fs::create_dir_all(dir)?;
        Ok(Some(tracing_appender::rolling::never(dir, name)))
    }
}

/// Install the global subscriber. Keep the returned guard alive for the
/// process lifetime so buffered file output is flushed.
pub fn init_logging(config: LogConfig) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match config.file_appender()? {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(true);

    tracing_subscriber::registry()
        .with(config.filter())
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;

    if config.debug_mode {
        tracing::debug!("Debug logging to {}", config.log_dir.display());
    }
    Ok(guard)
}

/// Delete rotated log files in `dir` older than `days`. Returns how many
/// were removed.
pub fn cleanup_old_logs(dir: &Path, days: u64) -> std::io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let max_age = Duration::from_secs(days * 24 * 60 * 60);
    let now = SystemTime::now();
    let mut removed = 0;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let is_log = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX));
        if !is_log || !entry.file_type()?.is_file() {
            continue;
        }

        let modified = entry.metadata()?.modified()?;
        let age = now.duration_since(modified).unwrap_or_default();
        if age >= max_age {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }

    Ok(removed)
}
