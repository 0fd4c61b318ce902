//! Parameter protocol version.

use std::fmt;

use crate::error::PipelineError;

/// Version number selecting backward-compatible option semantics.
///
/// Only [`LEGACY`](Self::LEGACY) (`0`) and [`CURRENT`](Self::CURRENT) (`104`)
/// exist. Every legacy branch compares against 104.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParamsVersion(u32);

impl ParamsVersion {
    /// Pre-104 behaviour.
    pub const LEGACY: Self = Self(0);
    /// Current behaviour.
    pub const CURRENT: Self = Self(104);

    /// Validates a raw version number.
    pub fn new(number: u32) -> Result<Self, PipelineError> {
        match number {
            0 => Ok(Self::LEGACY),
            104 => Ok(Self::CURRENT),
            other => Err(PipelineError::UnknownVersion(other)),
        }
    }

    /// True for any version below 104.
    pub fn is_legacy(self) -> bool {
        self.0 < 104
    }

    /// The raw number.
    pub fn number(self) -> u32 {
        self.0
    }
}

impl Default for ParamsVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for ParamsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
