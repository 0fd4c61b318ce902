//! Error types for configuration operations.

use std::path::PathBuf;

use sondeo_analysis::PipelineError;
use thiserror::Error;

/// Errors that can occur while loading, saving or building a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create directory
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        /// Path of the directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// `legacy_version` is not a known protocol version
    #[error("legacy_version: {0}")]
    Version(#[source] PipelineError),

    /// A timeout is negative or not finite
    #[error("invalid {name}: {value} ms")]
    InvalidTimeout {
        /// Field name.
        name: &'static str,
        /// Rejected value.
        value: f64,
    },

    /// A channel name is not recognised
    #[error("processing '{processing}': {reason}")]
    UnknownChannel {
        /// Processing declaring the channel.
        processing: String,
        /// Description of the rejected name.
        reason: String,
    },

    /// A processing failed to build
    #[error("processing '{processing}': {source}")]
    Processing {
        /// Processing name.
        processing: String,
        /// Underlying pipeline error.
        #[source]
        source: PipelineError,
    },
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Create a create directory error.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::CreateDir {
            path: path.into(),
            source,
        }
    }

    /// Wrap a pipeline error of `processing`.
    pub fn processing(processing: impl Into<String>, source: PipelineError) -> Self {
        ConfigError::Processing {
            processing: processing.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn mock_io_err() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::NotFound, "mock")
    }

    #[test]
    fn read_file_display() {
        let err = ConfigError::read_file("/a/b.toml", mock_io_err());
        let msg = err.to_string();
        assert!(msg.contains("failed to read file"), "got: {msg}");
        assert!(msg.contains("/a/b.toml"), "got: {msg}");
        assert!(err.source().is_some(), "ReadFile must expose I/O source");
    }

    #[test]
    fn write_file_factory_produces_correct_variant() {
        let err = ConfigError::write_file("/out/path", mock_io_err());
        assert!(matches!(
            err,
            ConfigError::WriteFile { ref path, .. } if path == std::path::Path::new("/out/path")
        ));
    }

    #[test]
    fn processing_display_names_processing() {
        let err = ConfigError::processing("main", PipelineError::Cycle("fft".into()));
        assert_eq!(err.to_string(), "processing 'main': dependency cycle through handler 'fft'");
        assert!(err.source().is_some());
    }

    #[test]
    fn version_display() {
        let err = ConfigError::Version(PipelineError::UnknownVersion(7));
        let msg = err.to_string();
        assert!(msg.starts_with("legacy_version: "), "got: {msg}");
        assert!(msg.contains('7'), "got: {msg}");
    }
}
