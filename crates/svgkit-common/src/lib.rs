//! # SvgKit Common
//!
//! Common error types, logging configuration, and viewer settings shared by
//! the SvgKit crates.
//!
//! ## Features
//!
//! - Unified error type with backtrace support for internal failures
//! - Logging configuration and setup
//! - JSON-backed viewer configuration
//! - Result extension traits

use thiserror::Error;

pub mod config;
pub mod logging;

pub use config::{IndexConfig, RenderConfig, TextConfig, ViewerConfig};
pub use logging::{init_logging, LogConfig, LogFormat};

/// Unified error type for SvgKit.
#[derive(Error, Debug)]
pub enum SvgKitError {
    /// Markup could not be read as a document at all.
    #[error("Parse error: {message}")]
    Parse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Rendering errors.
    #[error("Render error: {message}")]
    Render {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors.
    #[error("Config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A background build was dropped before it produced a scene.
    #[error("Operation cancelled")]
    Cancelled,

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        backtrace: Option<backtrace::Backtrace>,
    },
}

impl SvgKitError {
    /// Create a parse error with source.
    pub fn parse_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Parse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a render error with source.
    pub fn render_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Render {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a config error with source.
    pub fn config_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Get the error category for diagnostics.
    pub fn category(&self) -> &'static str {
        match self {
            SvgKitError::Parse { .. } => "parse",
            SvgKitError::Render { .. } => "render",
            SvgKitError::Config { .. } => "config",
            SvgKitError::Io(_) => "io",
            SvgKitError::Cancelled => "cancelled",
            SvgKitError::NotFound(_) => "not_found",
            SvgKitError::InvalidArgument(_) => "invalid_argument",
            SvgKitError::Internal { .. } => "internal",
        }
    }
}

/// Result type alias for SvgKit operations.
pub type Result<T> = std::result::Result<T, SvgKitError>;

/// Extension trait for Result.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| SvgKitError::Internal {
            message: format!("{}: {}", message.into(), e),
            backtrace: Some(backtrace::Backtrace::new()),
        })
    }
}

/// Extension trait for Option.
pub trait OptionExt<T> {
    /// Convert None to a NotFound error.
    fn ok_or_not_found(self, resource: impl Into<String>) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, resource: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| SvgKitError::NotFound(resource.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_error() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::InvalidData, "unexpected end of input")
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(SvgKitError::parse_with_source("test", io_error()).category(), "parse");
        assert_eq!(SvgKitError::render_with_source("test", io_error()).category(), "render");
        assert_eq!(SvgKitError::config("test").category(), "config");
        assert_eq!(SvgKitError::Cancelled.category(), "cancelled");
    }

    #[test]
    fn test_error_display() {
        let err = SvgKitError::parse_with_source("failed to build SVG scene", io_error());
        assert_eq!(err.to_string(), "Parse error: failed to build SVG scene");
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("unexpected end of input"));
    }

    #[test]
    fn test_result_context() {
        let res: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        let err = res.context("reading document").unwrap_err();
        assert_eq!(err.category(), "internal");
        assert!(err.to_string().contains("reading document: boom"));
    }

    #[test]
    fn test_option_ext() {
        let some: Option<i32> = Some(42);
        assert_eq!(some.ok_or_not_found("test").unwrap(), 42);

        let none: Option<i32> = None;
        assert!(matches!(
            none.ok_or_not_found("test"),
            Err(SvgKitError::NotFound(_))
        ));
    }
}
