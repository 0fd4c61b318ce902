//! FFT bins → frequency bands.
//!
//! Band boundaries come from `|`-separated descriptors:
//!
//! | descriptor            | boundaries                              |
//! |-----------------------|-----------------------------------------|
//! | `linear N min max`    | `N + 1` evenly spaced values            |
//! | `log N min max`       | `N + 1` values with a constant ratio    |
//! | `custom f1 f2 ...`    | the listed values                       |
//!
//! All descriptors are merged by [`make_bands_from_freqs`].
//!
//! Each band of each used cascade is either the average of the FFT bins it
//! covers or, for bands narrower than one bin with cubic interpolation on, the
//! spectrum interpolated at the band centre. Per band and cascade a weight is
//! precomputed: the band width actually covered by the cascade's spectrum, in
//! bins. [`BandCascadeTransformer`](super::BandCascadeTransformer) uses it to
//! blend cascades.

use sondeo_core::{Buffer2D, LinearInterpolator, cubic_at};

use crate::error::{ConfigureError, ParseError};
use crate::handler::{
    ConfigureContext, DataSize, Handler, HandlerInfo, HandlerKind, LayerBuffer, Params,
    ParseResult, ProcessContext, required_sources,
};
use crate::options::OptionMap;
use crate::version::ParamsVersion;

/// Minimum distance between two kept band boundaries.
pub const MIN_BAND_SEPARATION: f32 = 0.07;

/// Band resampler parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BandResamplerParams {
    /// Ascending boundary frequencies, at least two.
    pub freqs: Vec<f32>,
    /// First cascade to use, 1-based; 0 uses all.
    pub min_cascade: usize,
    /// Last cascade to use, 1-based.
    pub max_cascade: usize,
    /// Let the DC bin cover frequencies down to `-binWidth / 2`.
    pub include_dc: bool,
    /// Legacy: scale bands by `ln(width + 1)` normalised to mean 1.
    pub proportional_values: bool,
    /// Interpolate bands narrower than a bin.
    pub cubic_interpolation: bool,
}

/// Sorts `freqs` and drops boundaries closer than [`MIN_BAND_SEPARATION`] to
/// the previously kept one.
///
/// Fails on a non-positive frequency or when fewer than two remain.
pub fn make_bands_from_freqs(mut freqs: Vec<f32>) -> Result<Vec<f32>, ParseError> {
    freqs.sort_by(f32::total_cmp);

    let mut result = Vec::with_capacity(freqs.len());
    let mut last = -1.0f32;
    for value in freqs {
        if value <= 0.0 || !value.is_finite() {
            return Err(ParseError::InvalidBands(format!(
                "frequencies must be > 0 but {value} found"
            )));
        }
        if value - last < MIN_BAND_SEPARATION {
            continue;
        }
        result.push(value);
        last = value;
    }

    if result.len() < 2 {
        return Err(ParseError::InvalidBands(format!(
            "need >= 2 frequencies but only {} found",
            result.len()
        )));
    }
    Ok(result)
}

/// Parses a `|`-separated band description into merged boundaries.
pub fn parse_bands(description: &str) -> Result<Vec<f32>, ParseError> {
    let mut freqs = Vec::new();
    for element in description.split('|') {
        parse_bands_element(element, &mut freqs)?;
    }
    make_bands_from_freqs(freqs)
}

fn parse_bands_element(element: &str, freqs: &mut Vec<f32>) -> Result<(), ParseError> {
    let words: Vec<&str> = element.split_whitespace().collect();
    let Some((kind, args)) = words.split_first() else {
        return Err(ParseError::InvalidBands("empty band descriptor".into()));
    };
    let number = |text: &str| {
        text.parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ParseError::InvalidBands(format!("'{text}' is not a number")))
    };

    let kind = kind.to_ascii_lowercase();
    match kind.as_str() {
        "custom" => {
            if args.len() < 2 {
                return Err(ParseError::InvalidBands(format!(
                    "custom must have at least two frequencies but {} found",
                    args.len()
                )));
            }
            for arg in args {
                freqs.push(number(*arg)?);
            }
        }
        "linear" | "log" => {
            let [count, min, max] = args else {
                return Err(ParseError::InvalidBands(format!(
                    "{kind} must have 3 options (count, min, max)"
                )));
            };
            let count: usize = count
                .parse()
                .ok()
                .filter(|&c| c >= 1)
                .ok_or_else(|| ParseError::InvalidBands("count must be >= 1".into()))?;
            let (min, max) = (number(*min)?, number(*max)?);
            if max <= min {
                return Err(ParseError::InvalidBands("max must be > min".into()));
            }

            if kind == "linear" {
                let delta = max - min;
                freqs.extend((0..=count).map(|i| min + delta * i as f32 / count as f32));
            } else {
                let step = 2f32.powf((max / min).log2() / count as f32);
                let mut freq = min;
                freqs.push(freq);
                for _ in 0..count {
                    freq *= step;
                    freqs.push(freq);
                }
            }
        }
        _ => {
            return Err(ParseError::InvalidBands(format!("unknown type '{kind}'")));
        }
    }
    Ok(())
}

/// Band resampler handler.
#[derive(Debug, Default)]
pub struct BandResampler {
    params: BandResamplerParams,
    sample_rate: u32,
    fft_size: usize,
    start: usize,
    end: usize,
    // bands × used cascades
    band_weights: Buffer2D<f32>,
    multipliers: Vec<f32>,
}

impl Default for BandResamplerParams {
    fn default() -> Self {
        Self {
            freqs: Vec::new(),
            min_cascade: 0,
            max_cascade: 0,
            include_dc: true,
            proportional_values: false,
            cubic_interpolation: true,
        }
    }
}

impl BandResampler {
    /// Unconfigured resampler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `source`, `bands`, `minCascade`, `maxCascade`,
    /// `cubicInterpolation` and the legacy `includeDC` / `proportionalValues`.
    pub fn parse_params(
        options: &OptionMap,
        version: ParamsVersion,
    ) -> Result<ParseResult, ParseError> {
        let sources = required_sources(options)?;
        let description = options
            .get("bands")
            .ok_or(ParseError::MissingOption("bands"))?;
        let freqs = parse_bands(description)?;

        let min_cascade = options.int("minCascade", 0)?.max(0) as usize;
        let max_cascade = options.int("maxCascade", 0)?.max(0) as usize;
        if min_cascade > max_cascade {
            return Err(ParseError::Invalid(format!(
                "max cascade must be >= min cascade but max={max_cascade} < min={min_cascade}"
            )));
        }

        let (include_dc, proportional_values) = if version.is_legacy() {
            (
                options.boolean("includeDC", true)?,
                options.boolean("proportionalValues", true)?,
            )
        } else {
            (true, false)
        };

        let params = BandResamplerParams {
            freqs,
            min_cascade,
            max_cascade,
            include_dc,
            proportional_values,
            cubic_interpolation: options.boolean("cubicInterpolation", !version.is_legacy())?,
        };
        ParseResult::new(Params::BandResampler(params), sources)
    }

    /// Number of bands.
    pub fn band_count(&self) -> usize {
        self.params.freqs.len().saturating_sub(1)
    }

    /// Band boundaries, `band_count() + 1` values.
    pub fn bands(&self) -> &[f32] {
        &self.params.freqs
    }

    /// Index of the first source cascade in use.
    pub fn starting_layer(&self) -> usize {
        self.start
    }

    /// Number of cascades in use.
    pub fn cascades_count(&self) -> usize {
        self.end - self.start
    }

    /// Weight of each used cascade for `band`.
    pub fn band_weights(&self, band: usize) -> &[f32] {
        self.band_weights.row(band).unwrap_or(&[])
    }

    fn bin_width(&self, cascade: usize) -> f64 {
        f64::from(self.sample_rate) / (self.fft_size as f64 * f64::from(1u32 << cascade))
    }

    fn compute_weights(&mut self) {
        let bins = self.fft_size / 2;
        let bands = self.band_count();
        let cascades = self.cascades_count();
        self.band_weights.reshape(bands, cascades, 0.0);

        for local in 0..cascades {
            let bin_width = self.bin_width(self.start + local);
            let fft_min = if self.params.include_dc {
                -bin_width * 0.5
            } else {
                bin_width * 0.5
            } as f32;
            let fft_max = ((bins as f64 - 0.5) * bin_width) as f32;

            for band in 0..bands {
                let band_max = self.params.freqs[band + 1].min(fft_max);
                let band_min = self.params.freqs[band].max(fft_min);
                let weight = if band_max < fft_min || band_min > fft_max {
                    0.0
                } else {
                    (f64::from(band_max - band_min) / bin_width) as f32
                };
                if let Some(row) = self.band_weights.row_mut(band) {
                    row[local] = weight;
                }
            }
        }
    }

    fn generate_multipliers(&mut self) {
        let freqs = &self.params.freqs;
        self.multipliers = freqs
            .windows(2)
            .map(|w| (w[1] - w[0] + 1.0).ln())
            .collect();
        let count = self.multipliers.len().max(1) as f64;
        let average = self.multipliers.iter().map(|&m| f64::from(m)).sum::<f64>() / count;
        if average > 0.0 {
            for m in &mut self.multipliers {
                *m = (f64::from(*m) / average) as f32;
            }
        }
    }

    fn sample_cascade(&self, source: &[f32], dest: &mut [f32], bin_width: f64) {
        let bins = source.len();
        if bins == 0 {
            return;
        }
        let lower_bin_bound = LinearInterpolator::new(
            -bin_width * 0.5,
            (bins as f64 - 0.5) * bin_width,
            0.0,
            (bins - 1) as f64,
        );

        for (band, out) in dest.iter_mut().enumerate().take(self.band_count()) {
            let low = f64::from(self.params.freqs[band]);
            let high = f64::from(self.params.freqs[band + 1]);

            if self.params.cubic_interpolation && high - low < bin_width {
                let x = lower_bin_bound.to_value((low + high) * 0.5);
                *out = cubic_at(source, x).max(0.0) as f32;
                continue;
            }

            let min_bin = lower_bin_bound.to_value(low).floor().max(0.0) as usize;
            if min_bin >= bins {
                break;
            }
            let max_bin = (lower_bin_bound.to_value(high).floor().max(0.0) as usize)
                .min(bins - 1)
                .max(min_bin);
            let sum: f32 = source[min_bin..=max_bin].iter().sum();
            *out = sum / (max_bin - min_bin + 1) as f32;
        }
    }
}

impl Handler for BandResampler {
    fn configure(
        &mut self,
        params: &Params,
        ctx: &ConfigureContext<'_>,
    ) -> Result<DataSize, ConfigureError> {
        let Params::BandResampler(params) = params else {
            return Err(ConfigureError::Invalid("expected BandResampler params".into()));
        };
        let source = ctx.require_source()?;
        if source.kind() != HandlerKind::Fft {
            return Err(ConfigureError::IncompatibleSource {
                name: source.name().to_owned(),
                expected: HandlerKind::Fft.name(),
            });
        }

        let source_size = source.data_size();
        let cascades = source_size.layers_count;
        if params.min_cascade > cascades {
            return Err(ConfigureError::Invalid(
                "minCascade is more than number of cascades".into(),
            ));
        }

        let mut start = 1;
        let mut end = cascades + 1;
        if params.min_cascade > 0 {
            start = params.min_cascade;
            if params.max_cascade >= params.min_cascade && cascades >= params.max_cascade {
                end = params.max_cascade + 1;
            }
        }
        self.start = start - 1;
        self.end = end - 1;

        self.params = params.clone();
        self.sample_rate = ctx.sample_rate;
        self.fft_size = source_size.values_count * 2;
        self.compute_weights();
        self.multipliers.clear();
        if self.params.proportional_values {
            self.generate_multipliers();
        }

        let sizes = source_size.equivalent_wave_sizes[self.start..self.end].to_vec();
        Ok(DataSize::new(self.band_count(), sizes))
    }

    fn process(&mut self, ctx: &ProcessContext<'_>, out: &mut LayerBuffer) {
        let Some(source) = ctx.source else {
            return;
        };

        for local in 0..self.cascades_count() {
            let cascade = self.start + local;
            let bin_width = self.bin_width(cascade);

            for chunk in source.chunks(cascade) {
                if ctx.deadline_passed() {
                    out.push_copy(local, chunk.equivalent_wave_size);
                    continue;
                }

                let dest = out.push_layer(local, chunk.equivalent_wave_size);
                self.sample_cascade(chunk.data, dest, bin_width);
                for (value, m) in dest.iter_mut().zip(&self.multipliers) {
                    *value *= m;
                }
            }
        }
    }

    fn reset(&mut self) {}

    fn band_resampler(&self) -> Option<&BandResampler> {
        Some(self)
    }

    fn update_info(&self, info: &mut HandlerInfo) {
        match info {
            HandlerInfo::Bands { freqs } => freqs.clone_from(&self.params.freqs),
            _ => {
                *info = HandlerInfo::Bands {
                    freqs: self.params.freqs.clone(),
                }
            }
        }
    }
}
