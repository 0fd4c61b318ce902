//! Pre-filter cascades.
//!
//! A [`FilterDescription`] is either a preset name or an explicit list of
//! [`FilterStage`]s. [`FilterCascade`] instantiates the stages for one sample
//! rate and filters a channel's wave in place before the handler graph sees
//! it.
//!
//! Presets:
//!
//! | name     | stages |
//! |----------|--------|
//! | `none`   | (empty) |
//! | `like-a` | high-pass q 0.3 @ 200 Hz (+3.58 dB), Butterworth low-pass order 5 @ 10 kHz |
//! | `like-d` | high-pass q 0.3 @ 200 Hz (+3.68 dB), peak q 0.7 @ 6 kHz +5.5 dB, Butterworth low-pass order 5 @ 10 kHz |

use thiserror::Error;

use crate::biquad::{self, Biquad, BiquadCoefficients};
use crate::butterworth::ButterworthCoefficients;
use crate::iir::IirFilter;
use crate::math::db_to_amplitude;

/// Invalid filter design or description.
#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    /// Filter order must be at least 1.
    #[error("invalid filter order: {0}")]
    InvalidOrder(usize),

    /// A frequency or Q is not a positive finite number.
    #[error("invalid filter frequency: {0}")]
    InvalidFrequency(f64),

    /// Band edges are reversed or equal.
    #[error("invalid band: lower {lower} Hz must be below upper {upper} Hz")]
    InvalidBand {
        /// Lower edge in Hz.
        lower: f64,
        /// Upper edge in Hz.
        upper: f64,
    },

    /// Unknown preset name.
    #[error("unknown filter preset: {0}")]
    UnknownPreset(String),
}

/// One stage of a filter cascade.
///
/// `forced_gain` is an extra output gain in dB applied after the stage.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "type", rename_all = "kebab-case")
)]
pub enum FilterStage {
    /// RBJ high-pass.
    BqHighPass {
        /// Quality factor.
        q: f64,
        /// Cutoff in Hz.
        freq: f64,
        /// Output gain in dB.
        #[cfg_attr(feature = "serde", serde(default))]
        forced_gain: f64,
    },
    /// RBJ low-pass.
    BqLowPass {
        /// Quality factor.
        q: f64,
        /// Cutoff in Hz.
        freq: f64,
        /// Output gain in dB.
        #[cfg_attr(feature = "serde", serde(default))]
        forced_gain: f64,
    },
    /// RBJ high shelf.
    BqHighShelf {
        /// Quality factor.
        q: f64,
        /// Corner frequency in Hz.
        freq: f64,
        /// Shelf gain in dB.
        gain: f64,
        /// Output gain in dB.
        #[cfg_attr(feature = "serde", serde(default))]
        forced_gain: f64,
    },
    /// RBJ low shelf.
    BqLowShelf {
        /// Quality factor.
        q: f64,
        /// Corner frequency in Hz.
        freq: f64,
        /// Shelf gain in dB.
        gain: f64,
        /// Output gain in dB.
        #[cfg_attr(feature = "serde", serde(default))]
        forced_gain: f64,
    },
    /// RBJ peaking EQ.
    BqPeak {
        /// Quality factor.
        q: f64,
        /// Centre frequency in Hz.
        freq: f64,
        /// Peak gain in dB.
        gain: f64,
        /// Output gain in dB.
        #[cfg_attr(feature = "serde", serde(default))]
        forced_gain: f64,
    },
    /// Butterworth low-pass.
    BwLowPass {
        /// Filter order.
        order: usize,
        /// Cutoff in Hz.
        freq: f64,
        /// Output gain in dB.
        #[cfg_attr(feature = "serde", serde(default))]
        forced_gain: f64,
    },
    /// Butterworth high-pass.
    BwHighPass {
        /// Filter order.
        order: usize,
        /// Cutoff in Hz.
        freq: f64,
        /// Output gain in dB.
        #[cfg_attr(feature = "serde", serde(default))]
        forced_gain: f64,
    },
    /// Butterworth band-pass.
    BwBandPass {
        /// Prototype order (the realised filter is twice this).
        order: usize,
        /// Lower edge in Hz.
        low: f64,
        /// Upper edge in Hz.
        high: f64,
        /// Output gain in dB.
        #[cfg_attr(feature = "serde", serde(default))]
        forced_gain: f64,
    },
    /// Butterworth band-stop.
    BwBandStop {
        /// Prototype order (the realised filter is twice this).
        order: usize,
        /// Lower edge in Hz.
        low: f64,
        /// Upper edge in Hz.
        high: f64,
        /// Output gain in dB.
        #[cfg_attr(feature = "serde", serde(default))]
        forced_gain: f64,
    },
}

fn positive(value: f64) -> Result<(), FilterError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FilterError::InvalidFrequency(value))
    }
}

fn valid_order(order: usize) -> Result<(), FilterError> {
    if order == 0 {
        Err(FilterError::InvalidOrder(order))
    } else {
        Ok(())
    }
}

impl FilterStage {
    /// Checks that the stage can be designed at any sample rate.
    pub fn validate(&self) -> Result<(), FilterError> {
        match *self {
            Self::BqHighPass { q, freq, .. } | Self::BqLowPass { q, freq, .. } => {
                positive(q)?;
                positive(freq)
            }
            Self::BqHighShelf { q, freq, .. }
            | Self::BqLowShelf { q, freq, .. }
            | Self::BqPeak { q, freq, .. } => {
                positive(q)?;
                positive(freq)
            }
            Self::BwLowPass { order, freq, .. } | Self::BwHighPass { order, freq, .. } => {
                valid_order(order)?;
                positive(freq)
            }
            Self::BwBandPass {
                order, low, high, ..
            }
            | Self::BwBandStop {
                order, low, high, ..
            } => {
                valid_order(order)?;
                positive(low)?;
                positive(high)?;
                if low >= high {
                    return Err(FilterError::InvalidBand {
                        lower: low,
                        upper: high,
                    });
                }
                Ok(())
            }
        }
    }

    fn forced_gain(&self) -> f64 {
        match *self {
            Self::BqHighPass { forced_gain, .. }
            | Self::BqLowPass { forced_gain, .. }
            | Self::BqHighShelf { forced_gain, .. }
            | Self::BqLowShelf { forced_gain, .. }
            | Self::BqPeak { forced_gain, .. }
            | Self::BwLowPass { forced_gain, .. }
            | Self::BwHighPass { forced_gain, .. }
            | Self::BwBandPass { forced_gain, .. }
            | Self::BwBandStop { forced_gain, .. } => forced_gain,
        }
    }

    fn build(&self, sample_rate: f64) -> Result<StageFilter, FilterError> {
        self.validate()?;
        let gain = db_to_amplitude(self.forced_gain());

        let bq =
            |c: BiquadCoefficients| StageFilter::Biquad(Biquad::with_coefficients(c.scaled(gain)));
        let bw = |mut c: ButterworthCoefficients| {
            c.gain *= gain;
            StageFilter::Iir(IirFilter::new(&c))
        };

        Ok(match *self {
            Self::BqHighPass { q, freq, .. } => bq(biquad::high_pass(q, freq, sample_rate)),
            Self::BqLowPass { q, freq, .. } => bq(biquad::low_pass(q, freq, sample_rate)),
            Self::BqHighShelf { q, freq, gain, .. } => {
                bq(biquad::high_shelf(gain, q, freq, sample_rate))
            }
            Self::BqLowShelf { q, freq, gain, .. } => {
                bq(biquad::low_shelf(gain, q, freq, sample_rate))
            }
            Self::BqPeak { q, freq, gain, .. } => bq(biquad::peak(gain, q, freq, sample_rate)),
            Self::BwLowPass { order, freq, .. } => {
                bw(ButterworthCoefficients::low_pass(order, sample_rate, freq)?)
            }
            Self::BwHighPass { order, freq, .. } => {
                bw(ButterworthCoefficients::high_pass(order, sample_rate, freq)?)
            }
            Self::BwBandPass {
                order, low, high, ..
            } => bw(ButterworthCoefficients::band_pass(
                order,
                sample_rate,
                low,
                high,
            )?),
            Self::BwBandStop {
                order, low, high, ..
            } => bw(ButterworthCoefficients::band_stop(
                order,
                sample_rate,
                low,
                high,
            )?),
        })
    }
}

/// Pre-filter description: a preset name or an explicit stage list.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(untagged)
)]
pub enum FilterDescription {
    /// Named preset (`none`, `like-a`, `like-d`).
    Preset(String),
    /// Explicit stages, applied in order.
    Stages(Vec<FilterStage>),
}

impl Default for FilterDescription {
    fn default() -> Self {
        Self::Preset("none".to_owned())
    }
}

impl FilterDescription {
    /// Resolves presets and validates every stage.
    pub fn stages(&self) -> Result<Vec<FilterStage>, FilterError> {
        let stages = match self {
            Self::Preset(name) => preset(name)?,
            Self::Stages(stages) => stages.clone(),
        };
        for stage in &stages {
            stage.validate()?;
        }
        Ok(stages)
    }
}

fn preset(name: &str) -> Result<Vec<FilterStage>, FilterError> {
    let like_low_pass = FilterStage::BwLowPass {
        order: 5,
        freq: 10_000.0,
        forced_gain: 0.0,
    };
    match name.to_ascii_lowercase().as_str() {
        "" | "none" => Ok(Vec::new()),
        "like-a" => Ok(vec![
            FilterStage::BqHighPass {
                q: 0.3,
                freq: 200.0,
                forced_gain: 3.58,
            },
            like_low_pass,
        ]),
        "like-d" => Ok(vec![
            FilterStage::BqHighPass {
                q: 0.3,
                freq: 200.0,
                forced_gain: 3.68,
            },
            FilterStage::BqPeak {
                q: 0.7,
                freq: 6000.0,
                gain: 5.5,
                forced_gain: 0.0,
            },
            like_low_pass,
        ]),
        _ => Err(FilterError::UnknownPreset(name.to_owned())),
    }
}

#[derive(Debug, Clone)]
enum StageFilter {
    Biquad(Biquad),
    Iir(IirFilter),
}

impl StageFilter {
    fn apply(&mut self, wave: &mut [f32]) {
        match self {
            Self::Biquad(f) => f.process_in_place(wave),
            Self::Iir(f) => f.process_in_place(wave),
        }
    }

    fn clear(&mut self) {
        match self {
            Self::Biquad(f) => f.clear(),
            Self::Iir(f) => f.clear(),
        }
    }
}

/// Instantiated filter chain for one channel at one sample rate.
#[derive(Debug, Clone, Default)]
pub struct FilterCascade {
    stages: Vec<FilterStage>,
    sample_rate: u32,
    filters: Vec<StageFilter>,
}

impl FilterCascade {
    /// Builds the chain. Stages that cannot be designed at this rate are skipped.
    pub fn new(stages: &[FilterStage], sample_rate: u32) -> Self {
        let mut filters = Vec::with_capacity(stages.len());
        for stage in stages {
            match stage.build(f64::from(sample_rate)) {
                Ok(filter) => filters.push(filter),
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(?stage, error = %_e, "skipping filter stage");
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(stages = filters.len(), sample_rate, "filter cascade rebuilt");

        Self {
            stages: stages.to_vec(),
            sample_rate,
            filters,
        }
    }

    /// True when the cascade was built from exactly these inputs.
    pub fn matches(&self, stages: &[FilterStage], sample_rate: u32) -> bool {
        self.sample_rate == sample_rate && self.stages == stages
    }

    /// True when no stage is active.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Filters `wave` in place through every stage.
    pub fn apply(&mut self, wave: &mut [f32]) {
        for filter in &mut self.filters {
            filter.apply(wave);
        }
    }

    /// Clears all delay lines.
    pub fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.clear();
        }
    }
}
