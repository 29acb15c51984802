use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::IngestError;

/// Output format of the daemon's own logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Line-delimited JSON log ingestion daemon", long_about = None)]
pub struct Settings {
    /// Interface to listen on
    #[arg(long, env = "LISTEN_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// TCP port to listen on
    #[arg(long, env = "LISTEN_PORT", default_value = "9898")]
    pub port: u16,

    /// Root directory of the dated log tree
    #[arg(long, env = "LOG_BASE_DIR", default_value = ".")]
    pub base_dir: PathBuf,

    /// Seconds between flush cycles of a session
    #[arg(long, env = "FLUSH_INTERVAL_SECS", default_value = "10")]
    pub flush_interval_secs: u64,

    /// Seconds without a line before a session is closed
    #[arg(long, env = "IDLE_TIMEOUT_SECS", default_value = "600")]
    pub idle_timeout_secs: u64,

    /// Seconds to wait after a transient read error
    #[arg(long, env = "READ_BACKOFF_SECS", default_value = "10")]
    pub read_backoff_secs: u64,

    /// Maximum number of concurrent sessions
    #[arg(long, env = "MAX_CONNECTIONS", default_value = "1024")]
    pub max_connections: usize,

    /// Log output format
    #[arg(long, env = "RUST_LOG_FORMAT", value_enum, default_value = "json")]
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9898,
            base_dir: PathBuf::from("."),
            flush_interval_secs: 10,
            idle_timeout_secs: 600,
            read_backoff_secs: 10,
            max_connections: 1024,
            log_format: LogFormat::Json,
        }
    }
}

impl Settings {
    /// Validates the settings and returns an error if invalid.
    pub fn validate(&self) -> Result<(), IngestError> {
        validate_host(&self.host)?;
        validate_port(self.port)?;
        validate_secs("flush interval", self.flush_interval_secs)?;
        validate_secs("idle timeout", self.idle_timeout_secs)?;
        validate_secs("read backoff", self.read_backoff_secs)?;
        if self.max_connections == 0 {
            return Err(IngestError::Config(
                "Max connections must be at least 1".into(),
            ));
        }
        if self.flush_interval_secs >= self.idle_timeout_secs {
            return Err(IngestError::Config(
                "Flush interval must be shorter than the idle timeout".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    #[must_use]
    pub fn read_backoff(&self) -> Duration {
        Duration::from_secs(self.read_backoff_secs)
    }
}

/// Validates that the host is not empty or whitespace-only.
fn validate_host(host: &str) -> Result<(), IngestError> {
    if host.trim().is_empty() {
        return Err(IngestError::Config("Host cannot be empty".into()));
    }
    Ok(())
}

/// Validates that the port is in valid range (1-65535).
fn validate_port(port: u16) -> Result<(), IngestError> {
    if port == 0 {
        return Err(IngestError::Config("Port cannot be 0".into()));
    }
    Ok(())
}

fn validate_secs(name: &str, secs: u64) -> Result<(), IngestError> {
    if secs == 0 {
        return Err(IngestError::Config(format!("{name} cannot be 0 seconds")));
    }
    Ok(())
}

/// Parse settings from the command line and environment, then validate them.
pub fn get_configuration() -> Result<Settings, IngestError> {
    let settings = Settings::parse();
    settings.validate()?;
    Ok(settings)
}
