//! Processing and handler entries of a pipeline file.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sondeo_analysis::{
    Channel, HandlerDefinition, OptionMap, ParamsVersion, PipelineError, ProcessingDefinition,
};
use sondeo_core::FilterDescription;

use crate::error::ConfigError;

/// Raw option value: TOML strings, integers, floats and booleans are all
/// accepted and handed to the handlers as text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OptionValue {
    /// `true` / `false`.
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// Anything else.
    Text(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// One handler of a processing.
///
/// ```toml
/// [[processing.main.handlers]]
/// name = "bands"
/// type = "BandResampler"
/// options = { source = "fft", bands = "log 32 40 16000" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandlerConfig {
    /// Name other handlers use as `source`.
    pub name: String,

    /// Handler kind, e.g. `fft`, `BandResampler`, `rms`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Raw options passed to the handler's parser.
    #[serde(default)]
    pub options: BTreeMap<String, OptionValue>,
}

impl HandlerConfig {
    /// Handler without options.
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            options: BTreeMap::new(),
        }
    }

    /// Add an option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Options folded into text form.
    pub fn option_map(&self) -> OptionMap {
        let mut map = OptionMap::new();
        for (key, value) in &self.options {
            map.insert(key, value.to_string());
        }
        map
    }

    /// Parses the kind and options into a typed definition.
    pub fn build(&self, version: ParamsVersion) -> Result<HandlerDefinition, PipelineError> {
        let kind = self
            .kind
            .parse()
            .map_err(|error| PipelineError::Parse {
                handler: self.name.clone(),
                error,
            })?;
        HandlerDefinition::parse(&self.name, kind, &self.option_map(), version)
    }
}

fn default_channels() -> Vec<String> {
    vec!["auto".to_owned()]
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// One processing: channels, pre-filter, target rate and handlers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingConfig {
    /// Channel names (`left`, `right`, `auto`, ...).
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,

    /// Downsampling target in Hz; 0 keeps the capture rate.
    #[serde(default)]
    pub target_rate: u32,

    /// Disabled processings are not built.
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,

    /// Pre-filter preset name or explicit stages.
    #[serde(default)]
    pub filter: FilterDescription,

    /// Handlers in any order.
    #[serde(default)]
    pub handlers: Vec<HandlerConfig>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            channels: default_channels(),
            target_rate: 0,
            disabled: false,
            filter: FilterDescription::default(),
            handlers: Vec::new(),
        }
    }
}

impl ProcessingConfig {
    /// Set the channels.
    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = channels.into_iter().map(Into::into).collect();
        self
    }

    /// Set the downsampling target.
    pub fn with_target_rate(mut self, target_rate: u32) -> Self {
        self.target_rate = target_rate;
        self
    }

    /// Set the pre-filter.
    pub fn with_filter(mut self, filter: FilterDescription) -> Self {
        self.filter = filter;
        self
    }

    /// Add a handler.
    pub fn with_handler(mut self, handler: HandlerConfig) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Parsed channel list; an empty list means `auto`.
    pub fn parsed_channels(&self, name: &str) -> Result<Vec<Channel>, ConfigError> {
        if self.channels.is_empty() {
            return Ok(vec![Channel::Auto]);
        }
        self.channels
            .iter()
            .map(|channel| {
                channel
                    .parse()
                    .map_err(|reason| ConfigError::UnknownChannel {
                        processing: name.to_owned(),
                        reason,
                    })
            })
            .collect()
    }

    /// Builds the typed definition of processing `name`.
    pub fn build(
        &self,
        name: &str,
        version: ParamsVersion,
    ) -> Result<ProcessingDefinition, ConfigError> {
        let channels = self.parsed_channels(name)?;
        let handlers = self
            .handlers
            .iter()
            .map(|handler| handler.build(version))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::processing(name, e))?;
        ProcessingDefinition::new(channels, self.target_rate, &self.filter, version, handlers)
            .map_err(|e| ConfigError::processing(name, e))
    }
}
