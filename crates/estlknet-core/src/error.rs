//! Error types for the rewriting engine.
//!
//! Config comment decode failures are recoverable and only ever logged by the
//! rewriter. Everything else (missing source, I/O) aborts the run.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while rewriting a program.
#[derive(Error, Debug)]
pub enum KnetError {
    /// The source program does not exist.
    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// The source path has no usable file name.
    #[error("Invalid source path: {}", .0.display())]
    InvalidSourcePath(PathBuf),

    /// I/O error while reading the source or writing a segment.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A core config comment could not be decoded.
    #[error("Failed to parse core config '{line}': {source}")]
    ConfigDecode {
        line: String,
        #[source]
        source: ConfigError,
    },
}

/// Errors related to decoding a core config comment.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The line has no `(...)` fragment to decode.
    #[error("No parenthesized fragment")]
    MissingFragment,

    /// The normalized fragment is not a valid object.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required field is missing or empty.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// The axis letter is not a single letter.
    #[error("Invalid axis letter: '{0}'")]
    InvalidAxis(String),
}

/// Result type alias for run-level operations.
pub type KnetResult<T> = Result<T, KnetError>;

/// Result type alias for config decoding.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knet_error_display() {
        let err = KnetError::SourceNotFound(PathBuf::from("job.gcode"));
        assert_eq!(err.to_string(), "Source file not found: job.gcode");

        let err = KnetError::ConfigDecode {
            line: "(Core: )".to_string(),
            source: ConfigError::MissingField("Core".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Failed to parse core config '(Core: )': Missing required field: Core"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidAxis("XY".to_string());
        assert_eq!(err.to_string(), "Invalid axis letter: 'XY'");

        let err = ConfigError::MissingFragment;
        assert_eq!(err.to_string(), "No parenthesized fragment");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: KnetError = io_err.into();
        assert!(matches!(err, KnetError::Io(_)));

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ConfigError = json_err.into();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
