//! Logging setup for hosts embedding the compiler
//!
//! Compilation and dispatch emit `tracing` events; this module installs the
//! subscriber that prints them, in one of three formats and to the console or
//! a daily-rotated file.

use crate::compiler::frontend::{LogFormatName, LoggingConfig};
use std::path::Path;
use tracing::Level;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-readable
    Pretty,
    /// One line per event
    Compact,
    /// Newline-delimited JSON
    Json,
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// File with daily rotation
    File { directory: String, prefix: String },
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Whether to log span open and close
    pub span_events: bool,
    /// Extra filter directives (e.g., "stylebind=debug,stylebind_runtime=trace")
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            span_events: false,
            filter: None,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Write to daily-rotated files `<directory>/<prefix>.<date>`
    pub fn with_file_output(self, directory: impl AsRef<Path>, prefix: impl Into<String>) -> Self {
        self.with_output(LogOutput::File {
            directory: directory.as_ref().to_string_lossy().to_string(),
            prefix: prefix.into(),
        })
    }
}

impl From<&LoggingConfig> for LogConfig {
    /// Console logging as described by the `[logging]` table; an unknown
    /// level name falls back to `info`
    fn from(config: &LoggingConfig) -> Self {
        let level = config.level.parse().unwrap_or_else(|_| {
            tracing::warn!(level = %config.level, "Unknown log level, using info");
            Level::INFO
        });
        let format = match config.format {
            LogFormatName::Pretty => LogFormat::Pretty,
            LogFormatName::Compact => LogFormat::Compact,
            LogFormatName::Json => LogFormat::Json,
        };

        Self {
            level,
            format,
            output: LogOutput::Stderr,
            span_events: false,
            filter: config.filter.clone(),
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Install the global subscriber
///
/// Returns the `WorkerGuard` of the background writer; keep it alive until
/// exit so buffered events are flushed. Returns `None` when a global
/// subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Option<WorkerGuard> {
    let filter = build_filter(config);

    let (layer, guard) = match &config.output {
        LogOutput::Stdout => {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
            (format_layer(config.format, writer, config.span_events), guard)
        }
        LogOutput::Stderr => {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
            (format_layer(config.format, writer, config.span_events), guard)
        }
        LogOutput::File { directory, prefix } => {
            let appender = rolling::daily(directory, prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (format_layer(config.format, writer, config.span_events), guard)
        }
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .ok()
        .map(|()| guard)
}

fn format_layer<W>(format: LogFormat, writer: W, span_events: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_span_events(span_events_config(span_events));

    match format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let base_filter = EnvFilter::from_default_env().add_directive(config.level.into());

    match &config.filter {
        Some(filter_str) => filter_str
            .split(',')
            .map(str::trim)
            .filter(|directive| !directive.is_empty())
            .fold(base_filter, |filter, directive| {
                filter.add_directive(directive.parse().unwrap_or_else(|_| {
                    tracing::warn!("Invalid filter directive: {}", directive);
                    config.level.into()
                }))
            }),
        None => base_filter,
    }
}

fn span_events_config(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// Debug-level pretty logging to stderr, including span events
pub fn init_dev_logging() -> Option<WorkerGuard> {
    init_logging(&LogConfig {
        level: Level::DEBUG,
        format: LogFormat::Pretty,
        output: LogOutput::Stderr,
        span_events: true,
        filter: Some("stylebind=debug,stylebind_runtime=debug".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = LogConfig::new()
            .with_level(Level::DEBUG)
            .with_format(LogFormat::Json)
            .with_span_events(true)
            .with_filter("stylebind=trace");

        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.span_events);
        assert_eq!(config.filter, Some("stylebind=trace".to_string()));
        assert_eq!(config.output, LogOutput::Stderr);
    }

    #[test]
    fn test_file_output() {
        let config = LogConfig::new().with_file_output("/var/log/app", "stylebind");
        assert_eq!(
            config.output,
            LogOutput::File {
                directory: "/var/log/app".to_string(),
                prefix: "stylebind".to_string(),
            }
        );
    }

    #[test]
    fn test_from_logging_config() {
        let logging = LoggingConfig {
            level: "warn".to_string(),
            format: LogFormatName::Json,
            filter: Some("stylebind_runtime=trace".to_string()),
        };
        let config = LogConfig::from(&logging);
        assert_eq!(config.level, Level::WARN);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter.as_deref(), Some("stylebind_runtime=trace"));

        let unknown = LoggingConfig {
            level: "loud".to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(LogConfig::from(&unknown).level, Level::INFO);
    }

    #[test]
    fn test_filter_directives() {
        let config = LogConfig::new().with_filter("stylebind=trace, ,stylebind_runtime=debug");
        let filter = build_filter(&config).to_string();
        assert!(filter.contains("stylebind=trace"));
        assert!(filter.contains("stylebind_runtime=debug"));
    }
}
