//! Logging configuration and setup.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// Compact single-line format.
    Compact,
    /// JSON format for structured logging.
    Json,
}

impl LogFormat {
    /// Parse a format name as accepted on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level.
    pub level: Level,
    /// Output format.
    pub format: LogFormat,
    /// Include source file location.
    pub include_location: bool,
    /// Include thread names (useful with background scene builds).
    pub include_thread_names: bool,
    /// Include span events (enter, exit).
    pub include_span_events: bool,
    /// Custom filter string (e.g., "svgkit_svg=debug,svgkit_index=warn").
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            include_location: false,
            include_thread_names: false,
            include_span_events: false,
            filter: None,
        }
    }
}

impl LogConfig {
    /// Create a debug configuration.
    pub fn debug() -> Self {
        Self {
            level: Level::DEBUG,
            include_location: true,
            include_span_events: true,
            ..Default::default()
        }
    }

    /// Create a trace configuration.
    pub fn trace() -> Self {
        Self {
            level: Level::TRACE,
            include_location: true,
            include_thread_names: true,
            include_span_events: true,
            ..Default::default()
        }
    }

    /// Quiet configuration for command-line use: warnings only, compact.
    pub fn quiet() -> Self {
        Self {
            level: Level::WARN,
            format: LogFormat::Compact,
            ..Default::default()
        }
    }

    /// Map a `-v` count to a configuration: none is quiet, one is debug,
    /// more is trace.
    pub fn from_verbosity(verbose: u8) -> Self {
        match verbose {
            0 => Self::quiet(),
            1 => Self::debug(),
            _ => Self::trace(),
        }
    }

    /// Set a custom filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Set the output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        match self.filter {
            Some(ref custom_filter) => EnvFilter::try_new(custom_filter)
                .unwrap_or_else(|_| EnvFilter::new(self.level.to_string())),
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.level.to_string())),
        }
    }
}

/// Initialize logging with the given configuration.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(config: LogConfig) -> bool {
    let filter = config.env_filter();

    let span_events = if config.include_span_events {
        FmtSpan::ENTER | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let result = match config.format {
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .with_target(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_names(config.include_thread_names)
                .with_span_events(span_events);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_span_events(span_events);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        LogFormat::Json => {
            let fmt_layer = fmt::layer().json().with_span_events(span_events);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
    };

    result.is_ok()
}
