//! Customizable per-value transformation chains.
//!
//! A [`TransformDescription`] is parsed from a comma-separated list of stages:
//!
//! ```text
//! db, map -70 0, clamp, filter 10 200
//! ```
//!
//! | stage | arguments | effect |
//! |-------|-----------|--------|
//! | `db` | | `10·log10(v)`, floored at `f32::EPSILON` |
//! | `map` | `from_min from_max [to_min to_max]` | affine map, target defaults to `0 1` |
//! | `clamp` | `[min max]` | clamp, defaults to `0 1` |
//! | `filter` | `attack_ms [decay_ms]` | one-pole attack/decay smoothing, decay defaults to attack |

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::interpolation::LinearInterpolator;
use crate::math::{attack_decay_constant, power_to_db};

/// Malformed transform description.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    /// Stage name not recognised.
    #[error("unknown transform stage: {0}")]
    UnknownStage(String),

    /// Wrong number of arguments for a stage.
    #[error("stage '{stage}' expects {expected} arguments, got {got}")]
    ArgumentCount {
        /// Stage name.
        stage: &'static str,
        /// Human-readable accepted counts.
        expected: &'static str,
        /// Number supplied.
        got: usize,
    },

    /// Argument is not a number.
    #[error("stage '{stage}': invalid number '{value}'")]
    InvalidNumber {
        /// Stage name.
        stage: &'static str,
        /// Offending text.
        value: String,
    },

    /// `map` source range has zero width.
    #[error("map range is empty: {0} .. {0}")]
    DegenerateRange(f64),
}

/// One transformation stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformStage {
    /// Power to decibels.
    Db,
    /// Affine map between ranges.
    Map {
        /// Source range start.
        from_min: f64,
        /// Source range end.
        from_max: f64,
        /// Target range start.
        to_min: f64,
        /// Target range end.
        to_max: f64,
    },
    /// Clamp into `[min, max]`.
    Clamp {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
    /// Attack/decay smoothing, times in milliseconds.
    Filter {
        /// Time constant for rising values.
        attack_ms: f64,
        /// Time constant for falling values.
        decay_ms: f64,
    },
}

impl fmt::Display for TransformStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Db => write!(f, "db"),
            Self::Map {
                from_min,
                from_max,
                to_min,
                to_max,
            } => write!(f, "map {from_min} {from_max} {to_min} {to_max}"),
            Self::Clamp { min, max } => write!(f, "clamp {min} {max}"),
            Self::Filter {
                attack_ms,
                decay_ms,
            } => write!(f, "filter {attack_ms} {decay_ms}"),
        }
    }
}

fn numbers(stage: &'static str, args: &[&str]) -> Result<Vec<f64>, TransformError> {
    args.iter()
        .map(|a| {
            a.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| TransformError::InvalidNumber {
                    stage,
                    value: (*a).to_owned(),
                })
        })
        .collect()
}

impl FromStr for TransformStage {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let name = words.next().unwrap_or_default().to_ascii_lowercase();
        let args: Vec<&str> = words.collect();

        match name.as_str() {
            "db" => {
                if !args.is_empty() {
                    return Err(TransformError::ArgumentCount {
                        stage: "db",
                        expected: "0",
                        got: args.len(),
                    });
                }
                Ok(Self::Db)
            }
            "map" => {
                let n = numbers("map", &args)?;
                let (from_min, from_max, to_min, to_max) = match n.as_slice() {
                    [a, b] => (*a, *b, 0.0, 1.0),
                    [a, b, c, d] => (*a, *b, *c, *d),
                    _ => {
                        return Err(TransformError::ArgumentCount {
                            stage: "map",
                            expected: "2 or 4",
                            got: n.len(),
                        });
                    }
                };
                if from_min == from_max {
                    return Err(TransformError::DegenerateRange(from_min));
                }
                Ok(Self::Map {
                    from_min,
                    from_max,
                    to_min,
                    to_max,
                })
            }
            "clamp" => {
                let n = numbers("clamp", &args)?;
                match n.as_slice() {
                    [] => Ok(Self::Clamp { min: 0.0, max: 1.0 }),
                    [a, b] => Ok(Self::Clamp {
                        min: a.min(*b),
                        max: a.max(*b),
                    }),
                    _ => Err(TransformError::ArgumentCount {
                        stage: "clamp",
                        expected: "0 or 2",
                        got: n.len(),
                    }),
                }
            }
            "filter" => {
                let n = numbers("filter", &args)?;
                match n.as_slice() {
                    [a] => Ok(Self::Filter {
                        attack_ms: a.max(0.0),
                        decay_ms: a.max(0.0),
                    }),
                    [a, d] => Ok(Self::Filter {
                        attack_ms: a.max(0.0),
                        decay_ms: d.max(0.0),
                    }),
                    _ => Err(TransformError::ArgumentCount {
                        stage: "filter",
                        expected: "1 or 2",
                        got: n.len(),
                    }),
                }
            }
            _ => Err(TransformError::UnknownStage(name)),
        }
    }
}

/// Ordered list of stages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransformDescription {
    stages: Vec<TransformStage>,
}

impl TransformDescription {
    /// Builds a description from stages.
    pub fn new(stages: Vec<TransformStage>) -> Self {
        Self { stages }
    }

    /// The stages in application order.
    pub fn stages(&self) -> &[TransformStage] {
        &self.stages
    }

    /// True when no stage is present.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl FromStr for TransformDescription {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stages = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect::<Result<_, _>>()?;
        Ok(Self { stages })
    }
}

impl fmt::Display for TransformDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{stage}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct FilterState {
    attack: f64,
    decay: f64,
    result: f64,
}

/// Stateful executor of a [`TransformDescription`].
///
/// Equality compares the description only.
#[derive(Debug, Clone, Default)]
pub struct ValueTransformer {
    description: TransformDescription,
    maps: Vec<LinearInterpolator>,
    filters: Vec<FilterState>,
}

impl PartialEq for ValueTransformer {
    fn eq(&self, other: &Self) -> bool {
        self.description == other.description
    }
}

impl ValueTransformer {
    /// Creates a transformer; `filter` stages stay pass-through until
    /// [`set_params`](Self::set_params) is called.
    pub fn new(description: TransformDescription) -> Self {
        let maps = description
            .stages
            .iter()
            .filter_map(|s| match *s {
                TransformStage::Map {
                    from_min,
                    from_max,
                    to_min,
                    to_max,
                } => Some(LinearInterpolator::new(from_min, from_max, to_min, to_max)),
                _ => None,
            })
            .collect();
        let filters = description
            .stages
            .iter()
            .filter(|s| matches!(s, TransformStage::Filter { .. }))
            .map(|_| FilterState::default())
            .collect();
        Self {
            description,
            maps,
            filters,
        }
    }

    /// The description this transformer executes.
    pub fn description(&self) -> &TransformDescription {
        &self.description
    }

    /// True when the chain keeps state between values.
    pub fn is_stateful(&self) -> bool {
        !self.filters.is_empty()
    }

    /// Recomputes smoothing constants for values produced once every
    /// `block_size` samples at `sample_rate`.
    pub fn set_params(&mut self, sample_rate: u32, block_size: usize) {
        let times = self.description.stages.iter().filter_map(|s| match *s {
            TransformStage::Filter {
                attack_ms,
                decay_ms,
            } => Some((attack_ms, decay_ms)),
            _ => None,
        });
        for (state, (attack_ms, decay_ms)) in self.filters.iter_mut().zip(times) {
            state.attack = attack_decay_constant(attack_ms * 0.001, sample_rate, block_size);
            state.decay = attack_decay_constant(decay_ms * 0.001, sample_rate, block_size);
        }
    }

    /// Runs `value` through every stage.
    pub fn apply(&mut self, value: f64) -> f64 {
        let mut maps = self.maps.iter();
        let mut filters = self.filters.iter_mut();
        let mut v = value;
        for stage in &self.description.stages {
            v = match *stage {
                TransformStage::Db => power_to_db(v),
                TransformStage::Map { .. } => maps.next().map_or(v, |m| m.to_value(v)),
                TransformStage::Clamp { min, max } => v.clamp(min, max),
                TransformStage::Filter { .. } => match filters.next() {
                    Some(state) => {
                        let k = if v < state.result {
                            state.decay
                        } else {
                            state.attack
                        };
                        state.result = v + k * (state.result - v);
                        state.result
                    }
                    None => v,
                },
            };
        }
        v
    }

    /// Clears smoothing state.
    pub fn reset(&mut self) {
        for state in &mut self.filters {
            state.result = 0.0;
        }
    }
}
