//! Gaussian blur across the values of each chunk.
//!
//! Coarser cascades cover a smaller frequency range with the same number of
//! bands, so the radius grows by `radiusAdaptation` per layer.

use sondeo_core::GaussianKernelCache;

use crate::error::{ConfigureError, ParseError};
use crate::handler::{
    ConfigureContext, DataSize, Handler, LayerBuffer, Params, ParseResult, ProcessContext,
    required_sources,
};
use crate::options::OptionMap;
use crate::version::ParamsVersion;

/// Uniform blur parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBlurParams {
    /// Radius of layer 0, in values.
    pub radius: f64,
    /// Radius multiplier per layer.
    pub radius_adaptation: f64,
}

impl Default for UniformBlurParams {
    fn default() -> Self {
        Self {
            radius: 0.25,
            radius_adaptation: 2.0,
        }
    }
}

/// Uniform blur handler.
#[derive(Debug, Default)]
pub struct UniformBlur {
    params: UniformBlurParams,
    starting_radius: f64,
    kernels: GaussianKernelCache,
}

impl UniformBlur {
    /// Unconfigured blur.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `source`, `radius` and `radiusAdaptation`.
    pub fn parse_params(
        options: &OptionMap,
        _version: ParamsVersion,
    ) -> Result<ParseResult, ParseError> {
        let sources = required_sources(options)?;
        let params = UniformBlurParams {
            radius: (options.float("radius", 1.0)? * 0.25).max(0.0),
            radius_adaptation: options.float("radiusAdaptation", 2.0)?.max(0.0),
        };
        ParseResult::new(Params::UniformBlur(params), sources)
    }

    /// Radius applied to layer 0.
    pub fn starting_radius(&self) -> f64 {
        self.starting_radius
    }
}

impl Handler for UniformBlur {
    fn configure(
        &mut self,
        params: &Params,
        ctx: &ConfigureContext<'_>,
    ) -> Result<DataSize, ConfigureError> {
        let Params::UniformBlur(params) = params else {
            return Err(ConfigureError::Invalid("expected UniformBlur params".into()));
        };
        let source = ctx.require_source()?;

        let starting_layer = ctx.resampler.map_or(0, |r| r.starting_layer());
        self.params = params.clone();
        self.starting_radius = params.radius * params.radius_adaptation.powi(starting_layer as i32);
        Ok(source.data_size().clone())
    }

    fn process(&mut self, ctx: &ProcessContext<'_>, out: &mut LayerBuffer) {
        let Some(source) = ctx.source else {
            return;
        };

        let mut radius = self.starting_radius;
        for layer in 0..source.data_size().layers_count {
            let rounded = radius.round();
            for chunk in source.chunks(layer) {
                let dest = out.push_layer(layer, chunk.equivalent_wave_size);
                if rounded < 1.0 || ctx.deadline_passed() {
                    let n = dest.len().min(chunk.data.len());
                    dest[..n].copy_from_slice(&chunk.data[..n]);
                } else {
                    self.kernels.blur(rounded as usize, chunk.data, dest);
                }
            }
            radius *= self.params.radius_adaptation;
        }
    }

    fn reset(&mut self) {}

    fn forwards_resampler(&self) -> bool {
        true
    }
}
