//! Scrolling spectrogram image.
//!
//! Each block of `resolution` ms takes the newest values of layer 0 of the
//! source and paints them as one line, one pixel per value.

use sondeo_core::Buffer2D;

use crate::error::{ConfigureError, ParseError};
use crate::handler::{
    ConfigureContext, DataSize, Handler, HandlerInfo, LayerBuffer, Params, ParseResult,
    ProcessContext, required_sources,
};
use crate::image::{Color, LinedImage};
use crate::options::OptionMap;
use crate::version::ParamsVersion;

use super::waveform::{parse_color, push_line};

/// Spectrogram parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrogramParams {
    /// Number of lines kept.
    pub length: usize,
    /// Line duration in milliseconds.
    pub resolution_ms: f64,
    /// Colour stops as `(level, colour)`, ascending by level.
    pub colors: Vec<(f32, Color)>,
}

impl Default for SpectrogramParams {
    fn default() -> Self {
        Self {
            length: 100,
            resolution_ms: 50.0,
            colors: vec![(0.0, Color::BLACK), (1.0, Color::WHITE)],
        }
    }
}

impl SpectrogramParams {
    /// Colour of `value`, clamped to the outer stops.
    pub fn color_at(&self, value: f32) -> Color {
        let Some(&(first_level, first)) = self.colors.first() else {
            return Color::BLACK;
        };
        if value <= first_level {
            return first;
        }
        for pair in self.colors.windows(2) {
            let (low, low_color) = pair[0];
            let (high, high_color) = pair[1];
            if value <= high {
                let width = high - low;
                let t = if width > 0.0 { (value - low) / width } else { 1.0 };
                return low_color.lerp(high_color, t);
            }
        }
        self.colors.last().map_or(first, |&(_, c)| c)
    }
}

/// Parses `level: r,g,b[,a]; ...` into ascending colour stops.
fn parse_color_stops(raw: &str) -> Result<Vec<(f32, Color)>, ParseError> {
    let invalid = || ParseError::invalid_value("colors", raw, "level: r,g,b[,a]; ...");
    let mut stops = Vec::new();
    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (level, color) = entry.split_once(':').ok_or_else(invalid)?;
        let level: f32 = level.trim().parse().map_err(|_| invalid())?;
        let color: Color = color.trim().parse().map_err(|_| invalid())?;
        stops.push((level, color));
    }
    if stops.len() < 2 {
        return Err(ParseError::Invalid("colors needs at least two stops".into()));
    }
    if stops.windows(2).any(|w| w[1].0 <= w[0].0) {
        return Err(ParseError::Invalid("colors levels must be increasing".into()));
    }
    Ok(stops)
}

/// Spectrogram handler.
#[derive(Debug)]
pub struct Spectrogram {
    params: SpectrogramParams,
    block_size: usize,
    counter: usize,
    values_count: usize,
    line: Vec<Color>,
    image: LinedImage,
    published: Buffer2D<Color>,
    changed: bool,
}

impl Default for Spectrogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Spectrogram {
    /// Unconfigured spectrogram.
    pub fn new() -> Self {
        Self {
            params: SpectrogramParams::default(),
            block_size: 1,
            counter: 0,
            values_count: 0,
            line: Vec::new(),
            image: LinedImage::new(0, 0, Color::BLACK),
            published: Buffer2D::default(),
            changed: false,
        }
    }

    /// Parses `source`, `length`, `resolution` and the colour map.
    ///
    /// `colors` takes precedence over `baseColor` / `maxColor`, which are
    /// spread over `colorMinValue..colorMaxValue`.
    pub fn parse_params(
        options: &OptionMap,
        _version: ParamsVersion,
    ) -> Result<ParseResult, ParseError> {
        let sources = required_sources(options)?;

        let length = options.int("length", 100)?;
        if length < 2 {
            return Err(ParseError::invalid_value(
                "length",
                options.string("length", ""),
                "at least 2",
            ));
        }

        let mut resolution_ms = options.float("resolution", 50.0)?;
        if resolution_ms <= 0.0 {
            tracing::warn!(resolution = resolution_ms, "resolution must be > 0, assume 50");
            resolution_ms = 50.0;
        }

        let colors = match options.get("colors") {
            Some(raw) => parse_color_stops(raw)?,
            None => {
                let base = parse_color(options, "baseColor", Color::BLACK)?;
                let max = parse_color(options, "maxColor", Color::WHITE)?;
                let min_value = options.float("colorMinValue", 0.0)? as f32;
                let mut max_value = options.float("colorMaxValue", 1.0)? as f32;
                if max_value <= min_value {
                    tracing::warn!(
                        min = min_value,
                        max = max_value,
                        "colorMaxValue must be above colorMinValue"
                    );
                    max_value = min_value + 1.0;
                }
                vec![(min_value, base), (max_value, max)]
            }
        };

        let params = SpectrogramParams {
            length: length as usize,
            resolution_ms,
            colors,
        };
        ParseResult::new(Params::Spectrogram(params), sources)
    }

    /// Samples per line.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn fill_line(&mut self, data: &[f32]) {
        let background = self.params.color_at(f32::MIN);
        self.line.clear();
        self.line.resize(self.values_count, background);
        // lowest band at the bottom
        for (pixel, &value) in self.line.iter_mut().rev().zip(data) {
            *pixel = self.params.color_at(value);
        }
        push_line(&mut self.image, &self.line);
        self.changed = true;
    }
}

impl Handler for Spectrogram {
    fn configure(
        &mut self,
        params: &Params,
        ctx: &ConfigureContext<'_>,
    ) -> Result<DataSize, ConfigureError> {
        let Params::Spectrogram(params) = params else {
            return Err(ConfigureError::Invalid("expected Spectrogram params".into()));
        };
        let source = ctx.require_source()?;

        self.params = params.clone();
        self.values_count = source.data_size().values_count;
        let block = f64::from(ctx.sample_rate) * params.resolution_ms * 0.001;
        self.block_size = (block as usize).max(1);

        let background = params.color_at(f32::MIN);
        self.image = LinedImage::new(self.values_count, params.length, background);
        self.published = Buffer2D::default();
        self.reset();

        Ok(DataSize::default())
    }

    fn process(&mut self, ctx: &ProcessContext<'_>, _out: &mut LayerBuffer) {
        let Some(source) = ctx.source else {
            return;
        };

        for chunk in source.chunks(0) {
            self.counter += chunk.equivalent_wave_size;
            if self.counter < self.block_size {
                continue;
            }
            let lines = (self.counter / self.block_size).min(self.params.length);
            self.counter %= self.block_size;
            for _ in 0..lines {
                self.fill_line(chunk.data);
            }
        }
    }

    fn finish(&mut self) {
        if self.changed {
            self.image.copy_ordered(&mut self.published);
            self.changed = false;
        }
    }

    fn reset(&mut self) {
        self.counter = 0;
        self.changed = false;
    }

    fn update_info(&self, info: &mut HandlerInfo) {
        *info = HandlerInfo::Image {
            block_size: self.block_size,
            image: self.published.clone(),
            empty: self.image.is_empty(),
            width: self.params.length,
            height: self.values_count,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerKind;
    use crate::handlers::testing::{chain, far_future, run_chain};

    fn image_of(node: &crate::handler::HandlerNode) -> (Buffer2D<Color>, bool) {
        let mut info = HandlerInfo::None;
        node.update_info(&mut info);
        let HandlerInfo::Image { image, empty, .. } = info else {
            panic!("spectrogram reports an image");
        };
        (image, empty)
    }

    #[test]
    fn test_color_stops() {
        let stops = parse_color_stops("0: 0,0,0; 0.5: 1,0,0; 1: 1,1,1").unwrap();
        let params = SpectrogramParams {
            colors: stops,
            ..SpectrogramParams::default()
        };
        assert_eq!(params.color_at(-3.0), Color::BLACK);
        assert_eq!(params.color_at(0.5), Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(params.color_at(0.75), Color::rgb(1.0, 0.5, 0.5));
        assert_eq!(params.color_at(7.0), Color::WHITE);

        assert!(parse_color_stops("0: 0,0,0").is_err());
        assert!(parse_color_stops("1: 0,0,0; 0: 1,1,1").is_err());
        assert!(parse_color_stops("0 0,0,0; 1: 1,1,1").is_err());
    }

    #[test]
    fn test_requires_source() {
        assert!(matches!(
            Spectrogram::parse_params(&OptionMap::new(), ParamsVersion::CURRENT),
            Err(ParseError::MissingSource)
        ));
    }

    #[test]
    fn test_lines_follow_source_blocks() {
        let mut nodes = chain(&[
            ("rms", HandlerKind::BlockRms, OptionMap::new().with("updateInterval", "10")),
            (
                "spectrogram",
                HandlerKind::Spectrogram,
                OptionMap::new()
                    .with("source", "rms")
                    .with("length", "4")
                    .with("resolution", "20"),
            ),
        ]);
        assert!(nodes[1].data_size().is_empty());

        // 480 samples per rms block, 960 per line
        let wave = vec![0.5f32; 480 * 3];
        run_chain(&mut nodes, &wave, far_future());
        nodes[1].finish(1);

        let (image, empty) = image_of(&nodes[1]);
        assert!(!empty);
        assert_eq!(image.rows(), 4);
        assert_eq!(image.columns(), 1);
        let expected = Color::BLACK.lerp(Color::WHITE, 0.5);
        assert_eq!(image.row(3).unwrap()[0], expected);
        assert_eq!(image.row(2).unwrap()[0], Color::BLACK);
    }

    #[test]
    fn test_silence_fills_to_empty() {
        let mut nodes = chain(&[
            ("rms", HandlerKind::BlockRms, OptionMap::new().with("updateInterval", "10")),
            (
                "spectrogram",
                HandlerKind::Spectrogram,
                OptionMap::new()
                    .with("source", "rms")
                    .with("length", "3")
                    .with("resolution", "10"),
            ),
        ]);
        run_chain(&mut nodes, &[0.5f32; 480], far_future());
        assert!(!image_of(&nodes[1]).1);

        run_chain(&mut nodes, &[0.0f32; 480 * 3], far_future());
        assert!(image_of(&nodes[1]).1);
    }
}
