//! Block RMS and block peak levels.
//!
//! The wave is cut into blocks of `sample_rate · updateInterval` samples.
//! Every completed block emits one single-value chunk.

use sondeo_core::{TransformDescription, ValueTransformer, attack_decay_constant};

use crate::error::{ConfigureError, ParseError};
use crate::handler::{
    ConfigureContext, DataSize, Handler, HandlerInfo, LayerBuffer, Params, ParseResult,
    ProcessContext,
};
use crate::options::OptionMap;
use crate::version::ParamsVersion;

/// Block handler parameters.
///
/// Equality ignores the legacy smoothing times: they are retuned in place
/// without resetting the block state.
#[derive(Debug, Clone)]
pub struct BlockParams {
    /// Block length in milliseconds.
    pub update_interval_ms: f64,
    /// Legacy attack time in milliseconds; smoothing is off when `None`.
    pub legacy_attack_ms: Option<f64>,
    /// Legacy decay time in milliseconds.
    pub legacy_decay_ms: f64,
    /// Transform applied to each block value.
    pub transform: TransformDescription,
}

impl Default for BlockParams {
    fn default() -> Self {
        Self {
            update_interval_ms: 10.0,
            legacy_attack_ms: None,
            legacy_decay_ms: 0.0,
            transform: TransformDescription::default(),
        }
    }
}

impl PartialEq for BlockParams {
    fn eq(&self, other: &Self) -> bool {
        self.update_interval_ms == other.update_interval_ms && self.transform == other.transform
    }
}

/// Block RMS or peak handler.
#[derive(Debug)]
pub struct BlockHandler {
    peak: bool,
    params: BlockParams,
    sample_rate: u32,
    block_size: usize,
    counter: usize,
    intermediate: f64,
    result: f64,
    // [attack, decay]
    constants: [f64; 2],
    transformer: ValueTransformer,
}

impl BlockHandler {
    /// Unconfigured RMS handler.
    pub fn rms() -> Self {
        Self::with_mode(false)
    }

    /// Unconfigured peak handler.
    pub fn peak() -> Self {
        Self::with_mode(true)
    }

    fn with_mode(peak: bool) -> Self {
        Self {
            peak,
            params: BlockParams::default(),
            sample_rate: 0,
            block_size: 1,
            counter: 0,
            intermediate: 0.0,
            result: 0.0,
            constants: [0.0; 2],
            transformer: ValueTransformer::default(),
        }
    }

    /// Parses `updateInterval`, `transform` and the legacy `attack` / `decay`.
    pub fn parse_params(
        options: &OptionMap,
        version: ParamsVersion,
        peak: bool,
    ) -> Result<ParseResult, ParseError> {
        let mut update_interval_ms = options.float("updateInterval", 10.0)?;
        if update_interval_ms <= 0.0 {
            tracing::warn!(
                update_interval = update_interval_ms,
                "updateInterval must be > 0, assume 10"
            );
            update_interval_ms = 10.0;
        }

        let (legacy_attack_ms, legacy_decay_ms) = if version.is_legacy() {
            let attack = options.float("attack", 100.0)?.max(0.0);
            let decay = options.float("decay", attack)?.max(0.0);
            (Some(attack), decay)
        } else {
            (None, 0.0)
        };

        let params = BlockParams {
            update_interval_ms,
            legacy_attack_ms,
            legacy_decay_ms,
            transform: options.string("transform", "").parse()?,
        };
        let params = if peak {
            Params::BlockPeak(params)
        } else {
            Params::BlockRms(params)
        };
        ParseResult::new(params, Vec::new())
    }

    /// Samples per block.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn update_constants(&mut self) {
        let attack = self.params.legacy_attack_ms.unwrap_or(0.0) * 0.001;
        let decay = self.params.legacy_decay_ms * 0.001;
        self.constants = [
            attack_decay_constant(attack, self.sample_rate, self.block_size),
            attack_decay_constant(decay, self.sample_rate, self.block_size),
        ];
    }

    fn finish_block(&mut self, out: &mut LayerBuffer) {
        let value = if self.peak {
            self.intermediate
        } else {
            (self.intermediate / self.block_size as f64).sqrt()
        };
        let value = if self.params.legacy_attack_ms.is_some() {
            let k = self.constants[usize::from(value < self.result)];
            self.result = value + k * (self.result - value);
            self.result
        } else {
            value
        };

        let transformed = self.transformer.apply(value) as f32;
        out.push_from(0, self.block_size, &[transformed]);
        self.counter = 0;
        self.intermediate = 0.0;
    }
}

impl Handler for BlockHandler {
    fn configure(
        &mut self,
        params: &Params,
        ctx: &ConfigureContext<'_>,
    ) -> Result<DataSize, ConfigureError> {
        let params = match (params, self.peak) {
            (Params::BlockRms(p), false) | (Params::BlockPeak(p), true) => p,
            _ => return Err(ConfigureError::Invalid("expected block params".into())),
        };

        self.params = params.clone();
        self.sample_rate = ctx.sample_rate;
        let block = f64::from(ctx.sample_rate) * params.update_interval_ms * 0.001;
        self.block_size = (block as usize).max(1);
        self.update_constants();
        self.transformer = ValueTransformer::new(params.transform.clone());
        self.transformer.set_params(ctx.sample_rate, self.block_size);
        self.reset();

        Ok(DataSize::new(1, vec![self.block_size]))
    }

    fn process(&mut self, ctx: &ProcessContext<'_>, out: &mut LayerBuffer) {
        for &x in ctx.wave {
            let x = f64::from(x);
            if self.peak {
                self.intermediate = self.intermediate.max(x.abs());
            } else {
                self.intermediate += x * x;
            }
            self.counter += 1;
            if self.counter >= self.block_size {
                self.finish_block(out);
            }
        }
    }

    fn retune(&mut self, params: &Params) {
        let (Params::BlockRms(params) | Params::BlockPeak(params)) = params else {
            return;
        };
        self.params.legacy_attack_ms = params.legacy_attack_ms;
        self.params.legacy_decay_ms = params.legacy_decay_ms;
        self.update_constants();
    }

    fn reset(&mut self) {
        self.counter = 0;
        self.intermediate = 0.0;
        self.result = 0.0;
        self.transformer.reset();
    }

    fn update_info(&self, info: &mut HandlerInfo) {
        *info = HandlerInfo::Block {
            block_size: self.block_size,
            attack: self.params.legacy_attack_ms.unwrap_or(0.0),
            decay: self.params.legacy_decay_ms,
        };
    }
}
