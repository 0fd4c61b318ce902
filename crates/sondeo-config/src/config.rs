//! Pipeline file format and operations.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sondeo_analysis::{OrchestratorParams, ParamsVersion};

use crate::error::ConfigError;
use crate::processing::ProcessingConfig;

/// Complete analyzer description.
///
/// # TOML Format
///
/// ```toml
/// legacy_version = 104
/// compute_timeout_ms = 8.0
/// finish_timeout_ms = 2.0
///
/// [processing.main]
/// channels = ["left", "right", "auto"]
/// target_rate = 44100
/// filter = "like-a"
///
/// [[processing.main.handlers]]
/// name = "fft"
/// type = "fft"
/// options = { binWidth = 20, overlap = 0.5, cascadesCount = 4 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Option protocol version: 0 (legacy) or 104 (current).
    #[serde(default = "default_legacy_version")]
    pub legacy_version: u32,

    /// Compute budget per cycle in milliseconds.
    #[serde(default = "default_compute_timeout")]
    pub compute_timeout_ms: f64,

    /// Finish budget per cycle in milliseconds.
    #[serde(default = "default_finish_timeout")]
    pub finish_timeout_ms: f64,

    /// Processings by name.
    #[serde(default)]
    pub processing: BTreeMap<String, ProcessingConfig>,
}

fn default_legacy_version() -> u32 {
    ParamsVersion::CURRENT.number()
}

fn default_compute_timeout() -> f64 {
    8.0
}

fn default_finish_timeout() -> f64 {
    2.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            legacy_version: default_legacy_version(),
            compute_timeout_ms: default_compute_timeout(),
            finish_timeout_ms: default_finish_timeout(),
            processing: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Add a processing.
    pub fn with_processing(
        mut self,
        name: impl Into<String>,
        processing: ProcessingConfig,
    ) -> Self {
        self.processing.insert(name.into(), processing);
        self
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(
            path = %path.display(),
            processings = config.processing.len(),
            "config loaded"
        );
        Ok(config)
    }

    /// Load a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
            }
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validated protocol version.
    pub fn version(&self) -> Result<ParamsVersion, ConfigError> {
        ParamsVersion::new(self.legacy_version).map_err(ConfigError::Version)
    }

    /// Builds typed processing definitions and cycle budgets.
    ///
    /// Disabled processings are left out. The first failing processing
    /// aborts the build.
    pub fn build(&self) -> Result<OrchestratorParams, ConfigError> {
        let version = self.version()?;
        let compute_timeout = timeout("compute_timeout_ms", self.compute_timeout_ms)?;
        let finish_timeout = timeout("finish_timeout_ms", self.finish_timeout_ms)?;

        let mut processings = BTreeMap::new();
        for (name, processing) in &self.processing {
            if processing.disabled {
                tracing::debug!(processing = %name, "processing disabled");
                continue;
            }
            processings.insert(name.clone(), processing.build(name, version)?);
        }

        Ok(OrchestratorParams {
            processings,
            compute_timeout,
            finish_timeout,
        })
    }
}

fn timeout(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidTimeout { name, value });
    }
    Ok(Duration::from_secs_f64(value / 1000.0))
}
