//! Applies a value transformer to every value of the source.

use sondeo_core::{TransformDescription, ValueTransformer};

use crate::error::{ConfigureError, ParseError};
use crate::handler::{
    ConfigureContext, DataSize, Handler, LayerBuffer, Params, ParseResult, ProcessContext,
    required_sources,
};
use crate::options::OptionMap;
use crate::version::ParamsVersion;

/// Single value transformer parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SingleValueParams {
    /// Transform chain.
    pub transform: TransformDescription,
}

/// Single value transformer handler.
#[derive(Debug, Default)]
pub struct SingleValueTransformer {
    transformers: Vec<ValueTransformer>,
}

impl SingleValueTransformer {
    /// Unconfigured transformer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `source` and `transform`.
    pub fn parse_params(
        options: &OptionMap,
        _version: ParamsVersion,
    ) -> Result<ParseResult, ParseError> {
        let sources = required_sources(options)?;
        let transform = options.string("transform", "").parse()?;
        ParseResult::new(Params::SingleValue(SingleValueParams { transform }), sources)
    }
}

impl Handler for SingleValueTransformer {
    fn configure(
        &mut self,
        params: &Params,
        ctx: &ConfigureContext<'_>,
    ) -> Result<DataSize, ConfigureError> {
        let Params::SingleValue(params) = params else {
            return Err(ConfigureError::Invalid("expected SingleValueTransformer params".into()));
        };
        let size = ctx.require_source()?.data_size().clone();

        self.transformers = size
            .equivalent_wave_sizes
            .iter()
            .map(|&block| {
                let mut t = ValueTransformer::new(params.transform.clone());
                t.set_params(ctx.sample_rate, block);
                t
            })
            .collect();
        Ok(size)
    }

    fn process(&mut self, ctx: &ProcessContext<'_>, out: &mut LayerBuffer) {
        let Some(source) = ctx.source else {
            return;
        };

        for (layer, transformer) in self.transformers.iter_mut().enumerate() {
            for chunk in source.chunks(layer) {
                let dest = out.push_layer(layer, chunk.equivalent_wave_size);
                for (out, &value) in dest.iter_mut().zip(chunk.data) {
                    *out = transformer.apply(f64::from(value)) as f32;
                }
            }
        }
    }

    fn reset(&mut self) {
        for t in &mut self.transformers {
            t.reset();
        }
    }

    fn forwards_resampler(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerKind;
    use crate::handlers::testing::{chain, far_future, run_chain};

    #[test]
    fn test_invalid_transform_is_parse_error() {
        let options = OptionMap::new()
            .with("source", "x")
            .with("transform", "db, squash");
        assert!(matches!(
            SingleValueTransformer::parse_params(&options, ParamsVersion::CURRENT),
            Err(ParseError::Transform(_))
        ));
    }

    #[test]
    fn test_transforms_every_value() {
        let mut nodes = chain(&[
            ("rms", HandlerKind::BlockRms, OptionMap::new().with("updateInterval", "1")),
            (
                "clamped",
                HandlerKind::SingleValueTransformer,
                OptionMap::new()
                    .with("source", "rms")
                    .with("transform", "map 0 0.5 0 1, clamp"),
            ),
        ]);
        // 48 samples per block at 48 kHz
        let wave = vec![0.25f32; 96];
        run_chain(&mut nodes, &wave, far_future());

        let out: Vec<f32> = nodes[1].output().chunks(0).map(|c| c.data[0]).collect();
        assert_eq!(out.len(), 2);
        for v in out {
            assert!((v - 0.5).abs() < 1e-5);
        }
    }
}
