//! Scrolling waveform image.
//!
//! Every block of `resolution` ms becomes one vertical line: pixels between
//! the block minimum and maximum take the wave colour, the rest is
//! background, and the zero line is drawn per [`LineDrawingPolicy`].

use std::str::FromStr;

use sondeo_core::{Buffer2D, DiscreteInterpolator};

use crate::error::{ConfigureError, ParseError};
use crate::handler::{
    ConfigureContext, DataSize, Handler, HandlerInfo, LayerBuffer, Params, ParseResult,
    ProcessContext,
};
use crate::image::{Color, LinedImage};
use crate::options::OptionMap;
use crate::version::ParamsVersion;

/// When the zero line is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineDrawingPolicy {
    /// Never.
    #[default]
    Never,
    /// Only where the wave does not cover it.
    BelowWave,
    /// On top of the wave.
    Always,
}

impl FromStr for LineDrawingPolicy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "never" => Ok(Self::Never),
            "belowwave" => Ok(Self::BelowWave),
            "always" => Ok(Self::Always),
            _ => Err(ParseError::invalid_value(
                "lineDrawingPolicy",
                s,
                "never, belowWave or always",
            )),
        }
    }
}

/// Waveform parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveFormParams {
    /// Number of lines (image width).
    pub width: usize,
    /// Pixels per line (image height).
    pub height: usize,
    /// Line duration in milliseconds.
    pub resolution_ms: f64,
    /// Background colour.
    pub background: Color,
    /// Wave colour.
    pub wave_color: Color,
    /// Zero line colour.
    pub line_color: Color,
    /// Zero line policy.
    pub line_policy: LineDrawingPolicy,
    /// Linear gain applied before drawing.
    pub gain: f64,
}

impl Default for WaveFormParams {
    fn default() -> Self {
        Self {
            width: 100,
            height: 100,
            resolution_ms: 50.0,
            background: Color::BLACK,
            wave_color: Color::WHITE,
            line_color: Color::WHITE,
            line_policy: LineDrawingPolicy::Never,
            gain: 1.0,
        }
    }
}

/// Parses a colour option, `default` when absent.
pub(crate) fn parse_color(
    options: &OptionMap,
    key: &str,
    default: Color,
) -> Result<Color, ParseError> {
    match options.get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| ParseError::invalid_value(key, raw, "r,g,b[,a]")),
    }
}

/// Writes `line` to `image`, collapsing single-colour lines.
pub(crate) fn push_line(image: &mut LinedImage, line: &[Color]) {
    match line.first() {
        Some(&first) if line.iter().all(|&c| c == first) => image.fill_next_line_flat(first),
        _ => {
            let dest = image.next_line();
            let n = dest.len().min(line.len());
            dest[..n].copy_from_slice(&line[..n]);
        }
    }
}

/// Waveform handler.
#[derive(Debug)]
pub struct WaveForm {
    params: WaveFormParams,
    block_size: usize,
    counter: usize,
    min: f32,
    max: f32,
    interpolator: DiscreteInterpolator,
    line: Vec<Color>,
    image: LinedImage,
    published: Buffer2D<Color>,
    changed: bool,
}

impl Default for WaveForm {
    fn default() -> Self {
        Self::new()
    }
}

impl WaveForm {
    /// Unconfigured waveform.
    pub fn new() -> Self {
        Self {
            params: WaveFormParams::default(),
            block_size: 1,
            counter: 0,
            min: 0.0,
            max: 0.0,
            interpolator: DiscreteInterpolator::new(-1.0, 1.0, 0, 0),
            line: Vec::new(),
            image: LinedImage::new(0, 0, Color::BLACK),
            published: Buffer2D::default(),
            changed: false,
        }
    }

    /// Parses the image geometry, colours, `lineDrawingPolicy` and `gain`.
    pub fn parse_params(
        options: &OptionMap,
        _version: ParamsVersion,
    ) -> Result<ParseResult, ParseError> {
        let width = options.int("width", 100)?;
        let height = options.int("height", 100)?;
        if width < 2 || height < 2 {
            return Err(ParseError::Invalid(format!(
                "image size {width}x{height} is too small, need at least 2x2"
            )));
        }

        let mut resolution_ms = options.float("resolution", 50.0)?;
        if resolution_ms <= 0.0 {
            tracing::warn!(resolution = resolution_ms, "resolution must be > 0, assume 50");
            resolution_ms = 50.0;
        }

        let params = WaveFormParams {
            width: width as usize,
            height: height as usize,
            resolution_ms,
            background: parse_color(options, "backgroundColor", Color::BLACK)?,
            wave_color: parse_color(options, "waveColor", Color::WHITE)?,
            line_color: parse_color(options, "lineColor", Color::WHITE)?,
            line_policy: options.string("lineDrawingPolicy", "never").parse()?,
            gain: options.float("gain", 1.0)?.max(0.0),
        };
        ParseResult::new(Params::WaveForm(params), Vec::new())
    }

    /// Samples per line.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn fill_line(&mut self) {
        let height = self.params.height;
        let gain = self.params.gain;
        let lo = self.interpolator.to_value(f64::from(self.min) * gain);
        let hi = self.interpolator.to_value(f64::from(self.max) * gain);
        let zero = self.interpolator.to_value(0.0);

        self.line.clear();
        self.line.resize(height, self.params.background);
        for (pixel, color) in self.line.iter_mut().enumerate() {
            // pixel 0 is the top of the image
            let level = (height - 1 - pixel) as i64;
            let on_wave = level >= lo && level <= hi;
            let on_line = level == zero;
            *color = match self.params.line_policy {
                LineDrawingPolicy::Always if on_line => self.params.line_color,
                _ if on_wave => self.params.wave_color,
                LineDrawingPolicy::BelowWave if on_line => self.params.line_color,
                _ => self.params.background,
            };
        }
        push_line(&mut self.image, &self.line);
        self.changed = true;
    }
}

impl Handler for WaveForm {
    fn configure(
        &mut self,
        params: &Params,
        ctx: &ConfigureContext<'_>,
    ) -> Result<DataSize, ConfigureError> {
        let Params::WaveForm(params) = params else {
            return Err(ConfigureError::Invalid("expected WaveForm params".into()));
        };

        self.params = params.clone();
        let block = f64::from(ctx.sample_rate) * params.resolution_ms * 0.001;
        self.block_size = (block as usize).max(1);
        self.interpolator =
            DiscreteInterpolator::new(-1.0, 1.0, 0, params.height.saturating_sub(1) as i64);
        self.image = LinedImage::new(params.height, params.width, params.background);
        self.published = Buffer2D::default();
        self.reset();

        Ok(DataSize::new(2, vec![self.block_size]))
    }

    fn process(&mut self, ctx: &ProcessContext<'_>, out: &mut LayerBuffer) {
        for &x in ctx.wave {
            self.min = self.min.min(x);
            self.max = self.max.max(x);
            self.counter += 1;
            if self.counter >= self.block_size {
                self.fill_line();
                out.push_from(0, self.block_size, &[self.min, self.max]);
                self.counter = 0;
                self.min = f32::MAX;
                self.max = f32::MIN;
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
        self.min = f32::MAX;
        self.max = f32::MIN;
        self.changed = false;
    }

    fn update_info(&self, info: &mut HandlerInfo) {
        *info = HandlerInfo::Image {
            block_size: self.block_size,
            image: self.published.clone(),
            empty: self.image.is_empty(),
            width: self.params.width,
            height: self.params.height,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{configure_ctx, far_future, process_ctx};

    fn waveform(options: &OptionMap) -> (WaveForm, LayerBuffer) {
        let parsed = WaveForm::parse_params(options, ParamsVersion::CURRENT).unwrap();
        let mut handler = WaveForm::new();
        let size = handler.configure(&parsed.params, &configure_ctx(1000)).unwrap();
        (handler, LayerBuffer::new(&size))
    }

    fn published(handler: &WaveForm) -> Buffer2D<Color> {
        let mut info = HandlerInfo::None;
        handler.update_info(&mut info);
        let HandlerInfo::Image { image, .. } = info else {
            panic!("waveform reports an image");
        };
        image
    }

    #[test]
    fn test_parse_params() {
        let options = OptionMap::new()
            .with("lineDrawingPolicy", "BelowWave")
            .with("waveColor", "255,0,0");
        let parsed = WaveForm::parse_params(&options, ParamsVersion::CURRENT).unwrap();
        let Params::WaveForm(p) = parsed.params else {
            panic!("wrong params");
        };
        assert_eq!(p.line_policy, LineDrawingPolicy::BelowWave);
        assert_eq!(p.wave_color, Color::rgb(1.0, 0.0, 0.0));

        let bad = OptionMap::new().with("lineDrawingPolicy", "sometimes");
        assert!(WaveForm::parse_params(&bad, ParamsVersion::CURRENT).is_err());
        let bad = OptionMap::new().with("width", "1");
        assert!(WaveForm::parse_params(&bad, ParamsVersion::CURRENT).is_err());
    }

    #[test]
    fn test_one_line_per_block() {
        // 50 ms at 1 kHz
        let (mut wf, mut out) = waveform(&OptionMap::new());
        assert_eq!(wf.block_size(), 50);
        wf.process(&process_ctx(&[0.5; 120], far_future()), &mut out);
        assert_eq!(out.chunk_count(0), 2);
        assert_eq!(out.last_data(0), &[0.5, 0.5]);
    }

    #[test]
    fn test_wave_pixels_span_min_to_max() {
        let options = OptionMap::new()
            .with("width", "4")
            .with("height", "5")
            .with("resolution", "4");
        let (mut wf, mut out) = waveform(&options);
        assert_eq!(wf.block_size(), 4);

        wf.process(&process_ctx(&[0.0, 1.0, 0.5, 0.2], far_future()), &mut out);
        wf.finish();
        let image = published(&wf);
        assert_eq!(image.rows(), 4);
        assert_eq!(image.columns(), 5);

        // levels 0..=4 map -1..=1, wave covers 0..=1, pixel 0 is the top
        let line = image.row(3).unwrap();
        assert_eq!(line[0], Color::WHITE);
        assert_eq!(line[2], Color::WHITE);
        assert_eq!(line[3], Color::BLACK);
        assert_eq!(line[4], Color::BLACK);
    }

    #[test]
    fn test_line_policies() {
        let red = "1,0,0";
        let base = OptionMap::new()
            .with("width", "2")
            .with("height", "5")
            .with("resolution", "2")
            .with("lineColor", red);

        let (mut wf, mut out) = waveform(&base.clone().with("lineDrawingPolicy", "always"));
        wf.process(&process_ctx(&[-1.0, 1.0], far_future()), &mut out);
        wf.finish();
        assert_eq!(published(&wf).row(1).unwrap()[2], Color::rgb(1.0, 0.0, 0.0));

        let (mut wf, mut out) = waveform(&base.clone().with("lineDrawingPolicy", "belowWave"));
        wf.process(&process_ctx(&[-1.0, 1.0], far_future()), &mut out);
        wf.finish();
        assert_eq!(published(&wf).row(1).unwrap()[2], Color::WHITE);

        let (mut wf, mut out) = waveform(&base.with("lineDrawingPolicy", "belowWave"));
        wf.process(&process_ctx(&[0.9, 1.0], far_future()), &mut out);
        wf.finish();
        assert_eq!(published(&wf).row(1).unwrap()[2], Color::rgb(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_finish_publishes_only_changes() {
        let options = OptionMap::new().with("resolution", "10");
        let (mut wf, mut out) = waveform(&options);
        wf.finish();
        assert!(published(&wf).is_empty());

        wf.process(&process_ctx(&[0.1; 10], far_future()), &mut out);
        wf.finish();
        wf.finish();
        let image = published(&wf);
        assert_eq!(image.rows(), 100);

        let mut info = HandlerInfo::None;
        wf.update_info(&mut info);
        let mut s = String::new();
        assert!(info.prop("image empty", &mut s));
        assert_eq!(s, "0");
    }
}
