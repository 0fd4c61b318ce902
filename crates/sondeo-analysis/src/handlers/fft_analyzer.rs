//! Multi-resolution FFT analyzer.
//!
//! Cascade 0 sees the wave; cascade `k + 1` sees pairwise averages of what
//! cascade `k` saw, so each cascade halves the sample rate and doubles the
//! frequency resolution of the previous one. Every cascade keeps a rolling
//! buffer of `fft_size` samples and transforms it every `stride` of its own
//! samples, emitting one chunk of `fft_size / 2` magnitudes.

use std::mem;

use sondeo_core::{Fft, Window, round_to_even};

use crate::error::{ConfigureError, ParseError};
use crate::handler::info::CascadeInfo;
use crate::handler::{
    ConfigureContext, DataSize, Handler, HandlerInfo, LayerBuffer, Params, ParseResult,
    ProcessContext,
};
use crate::options::OptionMap;
use crate::version::ParamsVersion;

/// How the transform size is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FftSize {
    /// Size from the sample rate: `round_to_even(sample_rate / width)`, at least 16.
    BinWidth(f64),
    /// Explicit even size.
    Size(usize),
}

/// FFT analyzer parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FftParams {
    /// Transform size selection.
    pub size: FftSize,
    /// Fraction of the buffer shared by two consecutive transforms.
    pub overlap: f64,
    /// Number of cascades.
    pub cascades: usize,
    /// Window applied before the transform.
    pub window: Window,
    /// Report the DC magnitude as value 0.
    pub correct_zero: bool,
}

impl Default for FftParams {
    fn default() -> Self {
        Self {
            size: FftSize::BinWidth(100.0),
            overlap: 0.5,
            cascades: 5,
            window: Window::Hann,
            correct_zero: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Cascade {
    ring: Vec<f32>,
    position: usize,
    counter: usize,
    half: Option<f32>,
    dc: f32,
}

impl Cascade {
    fn reset(&mut self) {
        self.ring.fill(0.0);
        self.position = 0;
        self.counter = 0;
        self.half = None;
        self.dc = 0.0;
    }
}

/// FFT analyzer handler.
#[derive(Debug, Default)]
pub struct FftAnalyzer {
    params: FftParams,
    fft: Fft,
    fft_size: usize,
    stride: usize,
    sample_rate: u32,
    cascades: Vec<Cascade>,
    linear: Vec<f32>,
    current: Vec<f32>,
    next: Vec<f32>,
}

impl FftAnalyzer {
    /// Unconfigured analyzer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `binWidth`/`size`, `overlap`, `cascadesCount`, `window` and `correctZero`.
    pub fn parse_params(
        options: &OptionMap,
        _version: ParamsVersion,
    ) -> Result<ParseResult, ParseError> {
        let size = if let Some(text) = options.get("size") {
            let size = options.int("size", 0)?;
            if size < 16 || size % 2 != 0 {
                return Err(ParseError::invalid_value(
                    "size",
                    text,
                    "an even integer of at least 16",
                ));
            }
            FftSize::Size(size as usize)
        } else {
            let width = options.float("binWidth", 100.0)?;
            if width <= 0.0 {
                return Err(ParseError::invalid_value(
                    "binWidth",
                    options.string("binWidth", ""),
                    "a positive number",
                ));
            }
            FftSize::BinWidth(width)
        };

        let window = match options.get("window") {
            None => Window::Hann,
            Some(text) => text.parse().map_err(|_| {
                ParseError::invalid_value(
                    "window",
                    text,
                    "none, hann, hamming, blackman or blackmanHarris",
                )
            })?,
        };

        let params = FftParams {
            size,
            overlap: options.float("overlap", 0.5)?.clamp(0.0, 0.99),
            cascades: options.int("cascadesCount", 5)?.clamp(1, 20) as usize,
            window,
            correct_zero: options.boolean("correctZero", true)?,
        };
        ParseResult::new(Params::Fft(params), Vec::new())
    }

    /// Transform size in effect.
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Samples between two transforms of cascade 0.
    pub fn stride(&self) -> usize {
        self.stride
    }
}

impl Handler for FftAnalyzer {
    fn configure(
        &mut self,
        params: &Params,
        ctx: &ConfigureContext<'_>,
    ) -> Result<DataSize, ConfigureError> {
        let Params::Fft(params) = params else {
            return Err(ConfigureError::Invalid("expected FFT params".into()));
        };
        if ctx.sample_rate == 0 {
            return Err(ConfigureError::Invalid("sample rate is zero".into()));
        }

        self.fft_size = match params.size {
            FftSize::Size(size) => size,
            FftSize::BinWidth(width) => {
                round_to_even(f64::from(ctx.sample_rate) / width).max(16)
            }
        };
        let stride = (self.fft_size as f64 * (1.0 - params.overlap)).round() as usize;
        self.stride = stride.clamp(1, self.fft_size);
        self.sample_rate = ctx.sample_rate;
        self.params = params.clone();

        self.fft
            .set_params(self.fft_size, true, params.window);
        self.cascades = vec![
            Cascade {
                ring: vec![0.0; self.fft_size],
                ..Cascade::default()
            };
            params.cascades
        ];
        self.linear = vec![0.0; self.fft_size];

        let sizes = (0..params.cascades).map(|k| self.stride << k).collect();
        Ok(DataSize::new(self.fft_size / 2, sizes))
    }

    fn process(&mut self, ctx: &ProcessContext<'_>, out: &mut LayerBuffer) {
        let size = self.fft_size;
        self.current.clear();
        self.current.extend_from_slice(ctx.wave);

        for (k, cascade) in self.cascades.iter_mut().enumerate() {
            self.next.clear();
            let equivalent_wave_size = self.stride << k;

            for &x in &self.current {
                cascade.ring[cascade.position] = x;
                cascade.position = (cascade.position + 1) % size;
                match cascade.half.take() {
                    None => cascade.half = Some(x),
                    Some(h) => self.next.push((h + x) * 0.5),
                }

                cascade.counter += 1;
                if cascade.counter < self.stride {
                    continue;
                }
                cascade.counter = 0;

                if ctx.deadline_passed() {
                    out.push_copy(k, equivalent_wave_size);
                    continue;
                }

                let (newest, oldest) = cascade.ring.split_at(cascade.position);
                self.linear[..oldest.len()].copy_from_slice(oldest);
                self.linear[oldest.len()..].copy_from_slice(newest);
                self.fft.process(&self.linear);

                cascade.dc = self.fft.dc();
                let dest = out.push_layer(k, equivalent_wave_size);
                if let Some((zero, rest)) = dest.split_first_mut() {
                    *zero = if self.params.correct_zero {
                        cascade.dc
                    } else {
                        self.fft.bin_magnitude(0)
                    };
                    for (i, value) in rest.iter_mut().enumerate() {
                        *value = self.fft.bin_magnitude(i + 1);
                    }
                }
            }

            mem::swap(&mut self.current, &mut self.next);
        }
    }

    fn reset(&mut self) {
        for cascade in &mut self.cascades {
            cascade.reset();
        }
    }

    fn update_info(&self, info: &mut HandlerInfo) {
        let rate = f64::from(self.sample_rate);
        *info = HandlerInfo::Fft {
            size: self.fft_size,
            overlap: self.params.overlap,
            cascades: self
                .cascades
                .iter()
                .enumerate()
                .map(|(k, c)| {
                    let scale = f64::from(1u32 << k);
                    CascadeInfo {
                        bin_width: rate / self.fft_size as f64 / scale,
                        nyquist: rate * 0.5 / scale,
                        dc: c.dc,
                    }
                })
                .collect(),
        };
    }
}
