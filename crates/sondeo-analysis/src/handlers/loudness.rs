//! Gated loudness over a sliding window.
//!
//! The wave is K-weighted, squared and summed into micro-blocks of
//! `sample_rate / updatesPerSecond` samples. Each new micro-block produces a
//! value: the mean energy of the last `timeWindow` worth of micro-blocks,
//! ignoring blocks quieter than `gatingDb` relative to the previous value.

use std::collections::VecDeque;
use std::f64::consts::FRAC_1_SQRT_2;

use sondeo_core::{
    Biquad, TransformDescription, ValueTransformer, db_to_amplitude, high_pass, high_shelf,
};

use crate::error::{ConfigureError, ParseError};
use crate::handler::{
    ConfigureContext, DataSize, Handler, HandlerInfo, LayerBuffer, Params, ParseResult,
    ProcessContext,
};
use crate::options::OptionMap;
use crate::version::ParamsVersion;

/// Loudness parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LoudnessParams {
    /// Fraction of the window that may be gated away.
    pub gating_limit: f64,
    /// Output values per second.
    pub updates_per_second: f64,
    /// Window length in milliseconds.
    pub time_window_ms: f64,
    /// Gate threshold relative to the previous value.
    pub gating_db: f64,
    /// Silent micro-blocks are never gated.
    pub ignore_gating_for_silence: bool,
    /// Transform applied to each value.
    pub transform: TransformDescription,
}

impl Default for LoudnessParams {
    fn default() -> Self {
        Self {
            gating_limit: 0.5,
            updates_per_second: 20.0,
            time_window_ms: 1000.0,
            gating_db: -20.0,
            ignore_gating_for_silence: true,
            transform: TransformDescription::default(),
        }
    }
}

/// Loudness handler.
#[derive(Debug, Default)]
pub struct Loudness {
    params: LoudnessParams,
    shelf: Biquad,
    high_pass: Biquad,
    filtered: Vec<f32>,
    block_size: usize,
    blocks_count: usize,
    min_blocks_count: usize,
    gating_coefficient: f64,
    blocks: VecDeque<f64>,
    counter: usize,
    intermediate: f64,
    previous: f64,
    transformer: ValueTransformer,
}

impl Loudness {
    /// Unconfigured meter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the gating options and `transform` (default: none, linear energy).
    pub fn parse_params(
        options: &OptionMap,
        _version: ParamsVersion,
    ) -> Result<ParseResult, ParseError> {
        let params = LoudnessParams {
            gating_limit: options.float("gatingLimit", 0.5)?.clamp(0.0, 1.0),
            updates_per_second: options.float("updatesPerSecond", 20.0)?.clamp(0.01, 60.0),
            time_window_ms: options.float("timeWindow", 1000.0)?.clamp(0.01, 10000.0),
            gating_db: options.float("gatingDb", -20.0)?.clamp(-70.0, 0.0),
            ignore_gating_for_silence: options.boolean("ignoreGatingForSilence", true)?,
            transform: options.string("transform", "").parse()?,
        };
        ParseResult::new(Params::Loudness(params), Vec::new())
    }

    /// Samples per micro-block.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn push_micro_block(&mut self, energy: f64, out: &mut LayerBuffer) {
        self.blocks.pop_front();
        self.blocks.push_back(energy);

        let gating_value = self.previous * self.gating_coefficient;
        let mut sum = 0.0;
        let mut count = 0;
        for &block in &self.blocks {
            let silent = self.params.ignore_gating_for_silence && block == 0.0;
            if !silent && block < gating_value {
                continue;
            }
            sum += block;
            count += 1;
        }

        let mut value = 0.0;
        if count != 0 {
            let count = count.max(self.min_blocks_count);
            value = sum / count as f64 / self.block_size as f64;
        }
        self.previous = value;

        let transformed = self.transformer.apply(value) as f32;
        out.push_from(0, self.block_size, &[transformed]);
    }
}

impl Handler for Loudness {
    fn configure(
        &mut self,
        params: &Params,
        ctx: &ConfigureContext<'_>,
    ) -> Result<DataSize, ConfigureError> {
        let Params::Loudness(params) = params else {
            return Err(ConfigureError::Invalid("expected Loudness params".into()));
        };
        if ctx.sample_rate == 0 {
            return Err(ConfigureError::Invalid("sample rate is zero".into()));
        }
        let sample_rate = f64::from(ctx.sample_rate);

        self.params = params.clone();
        self.shelf = Biquad::with_coefficients(high_shelf(4.0, FRAC_1_SQRT_2, 1500.0, sample_rate));
        self.high_pass = Biquad::with_coefficients(high_pass(0.5, 38.0, sample_rate));

        self.blocks_count =
            ((params.time_window_ms / 1000.0 * params.updates_per_second) as usize).max(1);
        self.block_size = ((sample_rate / params.updates_per_second) as usize).max(1);
        self.gating_coefficient = db_to_amplitude(params.gating_db) * self.block_size as f64;
        self.min_blocks_count = (self.blocks_count as f64 * (1.0 - params.gating_limit)) as usize;

        self.transformer = ValueTransformer::new(params.transform.clone());
        self.transformer.set_params(ctx.sample_rate, self.block_size);
        self.reset();

        Ok(DataSize::new(1, vec![self.block_size]))
    }

    fn process(&mut self, ctx: &ProcessContext<'_>, out: &mut LayerBuffer) {
        self.filtered.clear();
        self.filtered.extend_from_slice(ctx.wave);
        self.shelf.process_in_place(&mut self.filtered);
        self.high_pass.process_in_place(&mut self.filtered);

        for i in 0..self.filtered.len() {
            let x = f64::from(self.filtered[i]);
            self.intermediate += x * x;
            self.counter += 1;
            if self.counter == self.block_size {
                let energy = self.intermediate;
                self.counter = 0;
                self.intermediate = 0.0;
                self.push_micro_block(energy, out);
            }
        }
    }

    fn reset(&mut self) {
        self.shelf.clear();
        self.high_pass.clear();
        self.blocks.clear();
        self.blocks.resize(self.blocks_count, 0.0);
        self.counter = 0;
        self.intermediate = 0.0;
        self.previous = 0.0;
        self.transformer.reset();
    }

    fn update_info(&self, info: &mut HandlerInfo) {
        *info = HandlerInfo::Loudness {
            block_size: self.block_size,
            blocks_count: self.blocks_count,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{configure_ctx, far_future, process_ctx};
    use std::f32::consts::PI;

    fn meter(options: &OptionMap) -> (Loudness, LayerBuffer) {
        let parsed = Loudness::parse_params(options, ParamsVersion::CURRENT).unwrap();
        let mut loudness = Loudness::new();
        let size = loudness.configure(&parsed.params, &configure_ctx(48000)).unwrap();
        (loudness, LayerBuffer::new(&size))
    }

    #[test]
    fn test_geometry() {
        let (loudness, _) = meter(&OptionMap::new());
        assert_eq!(loudness.block_size(), 2400);
        let mut info = HandlerInfo::None;
        loudness.update_info(&mut info);
        assert_eq!(
            info,
            HandlerInfo::Loudness {
                block_size: 2400,
                blocks_count: 20,
            }
        );
    }

    #[test]
    fn test_one_value_per_micro_block() {
        let (mut loudness, mut out) = meter(&OptionMap::new());
        loudness.process(&process_ctx(&[0.0; 2400 * 3 + 100], far_future()), &mut out);
        assert_eq!(out.chunk_count(0), 3);
    }

    fn levels(options: &OptionMap) -> (f32, f32) {
        let sine = |amp: f32| -> Vec<f32> {
            (0..48000)
                .map(|i| amp * (2.0 * PI * 1000.0 * i as f32 / 48000.0).sin())
                .collect()
        };

        let (mut quiet, mut out_quiet) = meter(options);
        quiet.process(&process_ctx(&sine(0.1), far_future()), &mut out_quiet);
        let (mut loud, mut out_loud) = meter(options);
        loud.process(&process_ctx(&sine(0.5), far_future()), &mut out_loud);
        (out_quiet.last_data(0)[0], out_loud.last_data(0)[0])
    }

    #[test]
    fn test_default_reads_linear_energy() {
        // 5x the amplitude is 25x the energy
        let (q, l) = levels(&OptionMap::new());
        assert!(q > 0.0);
        assert!((l / q - 25.0).abs() < 0.5, "{l} / {q}");
    }

    #[test]
    fn test_db_transform() {
        let (q, l) = levels(&OptionMap::new().with("transform", "db"));
        let expected = 10.0 * 25f32.log10();
        assert!((l - q - expected).abs() < 0.1, "{l} - {q}");
    }

    #[test]
    fn test_silence() {
        let (mut loudness, mut out) = meter(&OptionMap::new());
        loudness.process(&process_ctx(&[0.0; 4800], far_future()), &mut out);
        assert_eq!(out.last_data(0), &[0.0]);

        let (mut loudness, mut out) = meter(&OptionMap::new().with("transform", "db"));
        loudness.process(&process_ctx(&[0.0; 4800], far_future()), &mut out);
        let floor = 10.0 * f64::from(f32::EPSILON).log10();
        assert!((f64::from(out.last_data(0)[0]) - floor).abs() < 1e-3);
    }
}
