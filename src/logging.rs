//! Logging System
//!
//! `tracing` subscriber setup. The `[logging]` section picks the level, format and
//! destination; `COURSEGEN_LOG`, `COURSEGEN_LOG_FORMAT` and `COURSEGEN_LOG_OUTPUT`
//! override it at process start.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Target used for operator-facing diagnostics (degraded job outcomes).
pub const OPERATOR_TARGET: &str = "coursegen::operator";

const ENV_FILTER: &str = "COURSEGEN_LOG";
const ENV_FORMAT: &str = "COURSEGEN_LOG_FORMAT";
const ENV_OUTPUT: &str = "COURSEGEN_LOG_OUTPUT";

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level directive, e.g. `info` or `off`
    pub level: String,
    /// `text` or `json`
    pub format: String,
    /// `stdout`, `stderr` or `file`
    pub output: String,
    /// Destination when `output = "file"`
    pub file: PathBuf,
    /// ANSI colors for text output on a terminal stream
    pub color: bool,
    /// Per-target levels, e.g. `coursegen::writer = "debug"`
    pub modules: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            // stdout carries command output
            output: "stderr".to_string(),
            file: PathBuf::from(".coursegen/coursegen.log"),
            color: true,
            modules: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Result<Self, PipelineError> {
        match raw {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(PipelineError::Config(format!(
                "Unknown log format '{}' (use text or json)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogOutput {
    Stdout,
    Stderr,
    File,
}

impl LogOutput {
    fn parse(raw: &str) -> Result<Self, PipelineError> {
        match raw {
            "stdout" => Ok(LogOutput::Stdout),
            "stderr" => Ok(LogOutput::Stderr),
            "file" => Ok(LogOutput::File),
            other => Err(PipelineError::Config(format!(
                "Unknown log output '{}' (use stdout, stderr or file)",
                other
            ))),
        }
    }
}

/// Install the global subscriber. Environment variables win over `config`.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), PipelineError> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);

    let filter = env_filter(config)?;
    let format = match std::env::var(ENV_FORMAT) {
        Ok(raw) => LogFormat::parse(raw.trim())?,
        Err(_) => LogFormat::parse(&config.format)?,
    };
    let output = match std::env::var(ENV_OUTPUT) {
        Ok(raw) => LogOutput::parse(raw.trim())?,
        Err(_) => LogOutput::parse(&config.output)?,
    };

    let writer = match output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::File => BoxMakeWriter::new(std::sync::Mutex::new(open_log_file(&config.file)?)),
    };
    let ansi = config.color && output != LogOutput::File;

    let registry = Registry::default().with(filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(ansi)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init(),
    };
    installed.map_err(|e| PipelineError::Config(format!("Logging already initialized: {}", e)))
}

fn open_log_file(path: &Path) -> Result<std::fs::File, PipelineError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| {
            PipelineError::Config(format!("Cannot create log directory {}: {}", dir.display(), e))
        })?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| PipelineError::Config(format!("Cannot open log file {}: {}", path.display(), e)))
}

/// `COURSEGEN_LOG` replaces the configured directives entirely.
fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, PipelineError> {
    if let Ok(filter) = EnvFilter::try_from_env(ENV_FILTER) {
        return Ok(filter);
    }
    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(&config.level);
    for (target, level) in &config.modules {
        let directive = format!("{}={}", target, level)
            .parse::<Directive>()
            .map_err(|e| {
                PipelineError::Config(format!("Bad log directive for {}: {}", target, e))
            })?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}
