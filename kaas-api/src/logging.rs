//! Logging setup
//!
//! Console output plus an optional rolling JSON file, filtered through
//! `RUST_LOG` when set and the configured level otherwise.

use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config;

const LOG_FILE_NAME: &str = "kaas.log";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file_dir: Option<PathBuf>,
    pub rotation: LogRotation,
    pub json_format: bool,
}

/// Log rotation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

impl LogRotation {
    pub fn parse(value: &str) -> Self {
        match value {
            "hourly" => LogRotation::Hourly,
            "never" => LogRotation::Never,
            _ => LogRotation::Daily,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_dir: None,
            rotation: LogRotation::Daily,
            json_format: false,
        }
    }
}

impl From<&config::LoggingConfig> for LoggingConfig {
    fn from(cfg: &config::LoggingConfig) -> Self {
        Self {
            level: cfg.level.clone(),
            file_dir: cfg.file_logging_enabled.then(|| cfg.log_dir.clone()),
            rotation: LogRotation::parse(&cfg.rotation),
            json_format: cfg.json_format,
        }
    }
}

impl LoggingConfig {
    /// Install the global subscriber.
    ///
    /// The returned guard flushes the file writer on drop and must be held
    /// for the lifetime of the process.
    pub fn init(&self) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        let console_layer = if self.json_format {
            fmt::layer()
                .json()
                .with_target(true)
                .with_writer(io::stdout)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_ansi(true)
                .with_writer(io::stdout)
                .boxed()
        };

        let (file_layer, guard) = match self.file_dir {
            Some(ref dir) => {
                std::fs::create_dir_all(dir)?;
                let appender = match self.rotation {
                    LogRotation::Hourly => rolling::hourly(dir, LOG_FILE_NAME),
                    LogRotation::Daily => rolling::daily(dir, LOG_FILE_NAME),
                    LogRotation::Never => rolling::never(dir, LOG_FILE_NAME),
                };
                let (writer, guard) = non_blocking(appender);
                let layer = fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed();
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        tracing::info!(level = %self.level, file = ?self.file_dir, "Logging initialized");

        Ok(guard)
    }
}

/// Log a project-level operation with context
#[macro_export]
macro_rules! log_project_operation {
    ($op:expr, $project_id:expr) => {
        tracing::info!(
            operation = $op,
            project_id = %$project_id,
            "Project operation"
        )
    };
    ($op:expr, $project_id:expr, $($key:ident = $value:expr),+) => {
        tracing::info!(
            operation = $op,
            project_id = %$project_id,
            $($key = %$value),+,
            "Project operation"
        )
    };
}

/// Log drift between recorded intent and the live cluster
#[macro_export]
macro_rules! log_cluster_drift {
    ($op:expr, $project_id:expr, $err:expr) => {
        tracing::warn!(
            operation = $op,
            project_id = %$project_id,
            error = %$err,
            "Cluster projection failed; metadata kept"
        )
    };
}

/// Log database operation
#[macro_export]
macro_rules! log_db_operation {
    ($op:expr, $table:expr) => {
        tracing::debug!(
            operation = $op,
            table = $table,
            "Database operation"
        )
    };
    ($op:expr, $table:expr, $id:expr) => {
        tracing::debug!(
            operation = $op,
            table = $table,
            record_id = %$id,
            "Database operation"
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_parse() {
        assert_eq!(LogRotation::parse("hourly"), LogRotation::Hourly);
        assert_eq!(LogRotation::parse("never"), LogRotation::Never);
        assert_eq!(LogRotation::parse("daily"), LogRotation::Daily);
        assert_eq!(LogRotation::parse("bogus"), LogRotation::Daily);
    }

    #[test]
    fn test_from_app_config() {
        let mut cfg = config::LoggingConfig::default();
        assert!(LoggingConfig::from(&cfg).file_dir.is_none());

        cfg.file_logging_enabled = true;
        cfg.rotation = "hourly".to_string();
        let logging = LoggingConfig::from(&cfg);
        assert_eq!(logging.file_dir, Some(PathBuf::from("/var/log/kaas")));
        assert_eq!(logging.rotation, LogRotation::Hourly);
    }
}
