//! Error types for handler parsing, configuration and pipeline assembly.

use sondeo_core::{FilterError, TransformError};
use thiserror::Error;

/// Raw options could not be turned into typed params.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Handler type name not recognised.
    #[error("unknown handler type: {0}")]
    UnknownHandlerKind(String),

    /// Option value has the wrong form.
    #[error("invalid value for '{key}': '{value}' (expected {expected})")]
    InvalidValue {
        /// Option key.
        key: String,
        /// Offending text.
        value: String,
        /// What was expected.
        expected: &'static str,
    },

    /// Required option missing.
    #[error("option '{0}' is required")]
    MissingOption(&'static str),

    /// Handler needs a `source` option.
    #[error("source is required")]
    MissingSource,

    /// More than one source requested.
    #[error("only one source is supported, {0} requested")]
    MultipleSources(usize),

    /// Band description rejected.
    #[error("invalid bands: {0}")]
    InvalidBands(String),

    /// Value transformer description rejected.
    #[error("invalid transform: {0}")]
    Transform(#[from] TransformError),

    /// Any other handler-specific rejection.
    #[error("{0}")]
    Invalid(String),
}

impl ParseError {
    /// Creates an [`InvalidValue`](Self::InvalidValue) error.
    pub fn invalid_value(key: &str, value: &str, expected: &'static str) -> Self {
        Self::InvalidValue {
            key: key.to_owned(),
            value: value.to_owned(),
            expected,
        }
    }
}

/// Typed params were rejected when linking a handler into its graph.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigureError {
    /// Declared source does not exist earlier in the channel graph.
    #[error("source '{0}' not found")]
    SourceNotFound(String),

    /// Declared source produces no data.
    #[error("source '{0}' has no data")]
    EmptySource(String),

    /// Source exists but is of the wrong kind.
    #[error("source '{name}' is not compatible, need {expected}")]
    IncompatibleSource {
        /// Source handler name.
        name: String,
        /// Required kind.
        expected: &'static str,
    },

    /// No band resampler in the source chain.
    #[error("no BandResampler found in the source chain of '{0}'")]
    NoResampler(String),

    /// Any other handler-specific rejection.
    #[error("{0}")]
    Invalid(String),
}

/// A processing definition cannot be assembled.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Unsupported parameter protocol version.
    #[error("unsupported params version {0}: only 0 and 104 are accepted")]
    UnknownVersion(u32),

    /// Two handlers share a name.
    #[error("duplicate handler name '{0}'")]
    DuplicateHandler(String),

    /// A handler references a source that is not declared.
    #[error("handler '{handler}' references unknown source '{source_name}'")]
    UnknownSource {
        /// Referencing handler.
        handler: String,
        /// Missing source name.
        source_name: String,
    },

    /// Source references form a cycle.
    #[error("dependency cycle through handler '{0}'")]
    Cycle(String),

    /// A handler's options failed to parse.
    #[error("handler '{handler}': {error}")]
    Parse {
        /// Handler name.
        handler: String,
        /// Underlying parse error.
        #[source]
        error: ParseError,
    },

    /// The pre-filter description is invalid.
    #[error("filter: {0}")]
    Filter(#[from] FilterError),
}
