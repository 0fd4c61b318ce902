//! Blends the cascades of a band resampler into one layer.
//!
//! Chunks of different cascades are aligned by running offsets measured in
//! input samples: every output chunk advances each cascade's offset by the
//! finest cascade's chunk size, and a cascade takes its next chunk once its
//! offset goes negative.

use sondeo_core::Buffer2D;

use crate::error::{ConfigureError, ParseError};
use crate::handler::{
    ConfigureContext, DataSize, Handler, LayerBuffer, Params, ParseResult, ProcessContext,
    required_sources,
};
use crate::options::OptionMap;
use crate::version::ParamsVersion;

use super::BandResampler;

/// How contributing cascades are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MixFunction {
    /// Geometric mean.
    #[default]
    Product,
    /// Arithmetic mean.
    Average,
}

/// Band cascade transformer parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BandCascadeParams {
    /// Cascades with a smaller weight are skipped.
    pub min_weight: f64,
    /// Accumulation stops once this weight is reached.
    pub target_weight: f64,
    /// Cascades whose peak is at or below this are treated as not warmed up.
    pub zero_level_hard: f64,
    /// Combination of contributing cascades.
    pub mix_function: MixFunction,
}

impl Default for BandCascadeParams {
    fn default() -> Self {
        Self {
            min_weight: 0.1,
            target_weight: 2.5,
            zero_level_hard: f64::from(f32::EPSILON),
            mix_function: MixFunction::Product,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct CascadeMeta {
    data: Vec<f32>,
    next_chunk: usize,
    offset: isize,
    max_value: f32,
}

/// Band cascade transformer handler.
#[derive(Debug, Default)]
pub struct BandCascadeTransformer {
    params: BandCascadeParams,
    cascades: Vec<CascadeMeta>,
    weights: Buffer2D<f32>,
}

impl BandCascadeTransformer {
    /// Unconfigured transformer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `source`, `minWeight`, `targetWeight`, `zeroLevelMultiplier`,
    /// `mixFunction` and the legacy `zeroLevelHardMultiplier`.
    pub fn parse_params(
        options: &OptionMap,
        version: ParamsVersion,
    ) -> Result<ParseResult, ParseError> {
        let sources = required_sources(options)?;
        let epsilon = f64::from(f32::EPSILON);

        let min_weight = options.float("minWeight", 0.1)?.max(epsilon);
        let target_weight = options.float("targetWeight", 2.5)?.max(min_weight);

        let zero_level_hard = if version.is_legacy() {
            let zero_level = options.float("zeroLevelMultiplier", 1.0)?.max(0.0) * 0.66 * epsilon;
            options
                .float("zeroLevelHardMultiplier", 0.01)?
                .clamp(0.0, 1.0)
                * zero_level
        } else {
            options.float("zeroLevelMultiplier", 1.0)?.max(0.0) * epsilon
        };

        let mix_function = options.string("mixFunction", "product").to_ascii_lowercase();
        let mix_function = match mix_function.as_str() {
            "product" => MixFunction::Product,
            "average" => MixFunction::Average,
            other => {
                tracing::warn!(
                    mix_function = other,
                    "mixFunction is not recognized, assume 'product'"
                );
                MixFunction::Product
            }
        };

        let params = BandCascadeParams {
            min_weight,
            target_weight,
            zero_level_hard,
            mix_function,
        };
        ParseResult::new(Params::BandCascade(params), sources)
    }

    fn compute_for_band(&self, band: usize) -> f32 {
        let zero_level = self.params.zero_level_hard as f32;
        let weights = self.weights.row(band).unwrap_or(&[]);
        let value = |cascade: usize| -> f32 {
            self.cascades[cascade].data.get(band).copied().unwrap_or(0.0)
        };

        let mut weight = 0.0f32;
        let mut summed = 0.0f32;
        let mut product = 1.0f32;
        let mut sum = 0.0f32;

        for (cascade, meta) in self.cascades.iter().enumerate() {
            let band_weight = weights.get(cascade).copied().unwrap_or(0.0);

            if meta.max_value <= zero_level {
                // cascade has not produced anything yet, usually right after silence
                if summed == 0.0 {
                    return if cascade == 0 { 0.0 } else { value(cascade - 1) };
                }
                break;
            }

            if f64::from(band_weight) < self.params.min_weight {
                continue;
            }

            let magnitude = value(cascade);
            summed += 1.0;
            product *= magnitude;
            sum += magnitude;
            weight += band_weight;

            if f64::from(weight) >= self.params.target_weight {
                break;
            }
        }

        if summed == 0.0 {
            // no cascade reached min weight: take the last one that has anything
            return (0..weights.len().min(self.cascades.len()))
                .rev()
                .find(|&c| weights[c] > 0.0 && value(c) > zero_level)
                .map_or(0.0, value);
        }

        match self.params.mix_function {
            MixFunction::Product => product.powf(1.0 / summed),
            MixFunction::Average => sum / summed,
        }
    }

    fn load_weights(&mut self, resampler: &BandResampler) {
        let bands = resampler.band_count();
        let cascades = resampler.cascades_count();
        self.weights.reshape(bands, cascades, 0.0);
        for band in 0..bands {
            if let Some(row) = self.weights.row_mut(band) {
                let source = resampler.band_weights(band);
                let n = row.len().min(source.len());
                row[..n].copy_from_slice(&source[..n]);
            }
        }
    }
}

impl Handler for BandCascadeTransformer {
    fn configure(
        &mut self,
        params: &Params,
        ctx: &ConfigureContext<'_>,
    ) -> Result<DataSize, ConfigureError> {
        let Params::BandCascade(params) = params else {
            return Err(ConfigureError::Invalid("expected BandCascadeTransformer params".into()));
        };
        let source = ctx.require_source()?;
        let resampler = ctx.require_resampler()?;

        self.params = params.clone();
        self.load_weights(resampler);

        let size = source.data_size();
        self.cascades = vec![CascadeMeta::default(); size.layers_count];
        Ok(DataSize::new(
            size.values_count,
            vec![size.equivalent_wave_sizes[0]],
        ))
    }

    fn process(&mut self, ctx: &ProcessContext<'_>, out: &mut LayerBuffer) {
        let Some(source) = ctx.source else {
            return;
        };
        let sizes = &source.data_size().equivalent_wave_sizes;

        for (i, meta) in self.cascades.iter_mut().enumerate() {
            meta.next_chunk = 0;
            meta.data.clear();
            meta.data.extend_from_slice(source.saved_data(i));
        }

        for chunk in source.chunks(0) {
            if ctx.deadline_passed() {
                out.push_copy(0, chunk.equivalent_wave_size);
                continue;
            }

            for (i, meta) in self.cascades.iter_mut().enumerate() {
                meta.offset -= sizes[0] as isize;
                if meta.offset >= 0 {
                    continue;
                }
                let Some(next) = source.chunks(i).nth(meta.next_chunk) else {
                    continue;
                };
                meta.data.clear();
                meta.data.extend_from_slice(next.data);
                meta.next_chunk += 1;
                meta.offset += sizes[i] as isize;
                meta.max_value = next.data.iter().copied().fold(f32::MIN, f32::max);
            }

            let dest = out.push_layer(0, chunk.equivalent_wave_size);
            for (band, value) in dest.iter_mut().enumerate() {
                *value = self.compute_for_band(band);
            }
        }
    }

    fn reset(&mut self) {
        for meta in &mut self.cascades {
            *meta = CascadeMeta::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transformer(
        params: BandCascadeParams,
        cascades: &[&[f32]],
        weights: &[&[f32]],
    ) -> BandCascadeTransformer {
        let mut t = BandCascadeTransformer {
            params,
            ..BandCascadeTransformer::default()
        };
        t.cascades = cascades
            .iter()
            .map(|data| CascadeMeta {
                data: data.to_vec(),
                max_value: data.iter().copied().fold(f32::MIN, f32::max),
                ..CascadeMeta::default()
            })
            .collect();
        t.weights.reshape(weights.len(), cascades.len(), 0.0);
        for (band, w) in weights.iter().enumerate() {
            t.weights.row_mut(band).unwrap().copy_from_slice(w);
        }
        t
    }

    #[test]
    fn test_parse_options() {
        let options = OptionMap::new()
            .with("source", "bands")
            .with("minWeight", "0")
            .with("targetWeight", "-1")
            .with("mixFunction", "median");
        let parsed =
            BandCascadeTransformer::parse_params(&options, ParamsVersion::CURRENT).unwrap();
        let Params::BandCascade(p) = parsed.params else {
            panic!("wrong params");
        };
        assert_eq!(p.min_weight, f64::from(f32::EPSILON));
        assert_eq!(p.target_weight, p.min_weight);
        assert_eq!(p.mix_function, MixFunction::Product);

        let legacy = BandCascadeTransformer::parse_params(&options, ParamsVersion::LEGACY).unwrap();
        let Params::BandCascade(p) = legacy.params else {
            panic!("wrong params");
        };
        let expected = 0.66 * f64::from(f32::EPSILON) * 0.01;
        assert!((p.zero_level_hard - expected).abs() < 1e-20);
    }

    #[test]
    fn test_product_stops_at_target_weight() {
        let params = BandCascadeParams {
            target_weight: 2.0,
            ..BandCascadeParams::default()
        };
        let t = transformer(params, &[&[4.0], &[1.0], &[100.0]], &[&[1.0, 1.0, 1.0]]);
        assert!((t.compute_for_band(0) - 2.0).abs() < 1e-5);

        let params = BandCascadeParams {
            target_weight: 2.0,
            mix_function: MixFunction::Average,
            ..BandCascadeParams::default()
        };
        let t = transformer(params, &[&[4.0], &[1.0], &[100.0]], &[&[1.0, 1.0, 1.0]]);
        assert!((t.compute_for_band(0) - 2.5).abs() < 1e-5);
    }

    #[test]
    fn test_light_cascades_are_skipped() {
        let t = transformer(
            BandCascadeParams::default(),
            &[&[8.0], &[3.0]],
            &[&[0.05, 3.0]],
        );
        assert!((t.compute_for_band(0) - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_silent_cascade_uses_previous() {
        // cascade 1 never produced anything: the first reading wins
        let params = BandCascadeParams::default();
        let t = transformer(params.clone(), &[&[0.5], &[0.0]], &[&[0.01, 1.0]]);
        assert_eq!(t.compute_for_band(0), 0.5);

        let t = transformer(params, &[&[0.0], &[0.7]], &[&[1.0, 1.0]]);
        assert_eq!(t.compute_for_band(0), 0.0);
    }

    #[test]
    fn test_fallback_takes_last_nonzero_cascade() {
        let t = transformer(
            BandCascadeParams::default(),
            &[&[0.2], &[0.3], &[0.4]],
            &[&[0.05, 0.05, 0.0]],
        );
        assert_eq!(t.compute_for_band(0), 0.3);
    }
}
