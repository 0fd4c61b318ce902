//! The handler contract.
//!
//! A handler is one node of a channel's analysis graph. It is built from a
//! [`HandlerKind`], parses raw options into typed [`Params`] once, is
//! configured against its (optional) source each time parameters or the
//! stream format change, and then appends chunks to its [`LayerBuffer`]
//! every cycle.
//!
//! # Lifecycle
//!
//! ```text
//! parse_params ─► Params ─► HandlerNode::patch ─► Handler::configure
//!                                                   │
//!                          every cycle: purge ─► process ─► finish
//! ```
//!
//! Handlers never see other nodes directly. The source is exposed through a
//! read-only [`SourceView`] and the nearest band resampler up the chain, if
//! any, through [`ConfigureContext::resampler`].

pub mod buffer;
pub mod info;
pub mod node;

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

pub use buffer::{DataChunk, LayerBuffer};
pub use info::HandlerInfo;
pub use node::{Configuration, HandlerFinder, HandlerNode, HandlerState};

use crate::channel::Channel;
use crate::error::{ConfigureError, ParseError};
use crate::handlers::{
    BandCascadeParams, BandCascadeTransformer, BandResampler, BandResamplerParams, BlockHandler,
    BlockParams, FftAnalyzer, FftParams, Loudness, LoudnessParams, SingleValueParams,
    SingleValueTransformer, Spectrogram, SpectrogramParams, UniformBlur, UniformBlurParams,
    WaveForm, WaveFormParams,
};
use crate::options::OptionMap;
use crate::version::ParamsVersion;

/// Output shape of a handler.
///
/// Fixed between two successful configurations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataSize {
    /// Number of parallel layers.
    pub layers_count: usize,
    /// Values per chunk.
    pub values_count: usize,
    /// Input samples represented by one chunk, per layer.
    pub equivalent_wave_sizes: Vec<usize>,
}

impl DataSize {
    /// One layer per entry of `equivalent_wave_sizes`.
    pub fn new(values_count: usize, equivalent_wave_sizes: Vec<usize>) -> Self {
        Self {
            layers_count: equivalent_wave_sizes.len(),
            values_count,
            equivalent_wave_sizes,
        }
    }

    /// True when the handler produces nothing a sink could read.
    pub fn is_empty(&self) -> bool {
        self.layers_count == 0 || self.values_count == 0
    }
}

/// Typed parameters of every handler kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    /// [`FftAnalyzer`] parameters.
    Fft(FftParams),
    /// [`BandResampler`] parameters.
    BandResampler(BandResamplerParams),
    /// [`BandCascadeTransformer`] parameters.
    BandCascade(BandCascadeParams),
    /// [`UniformBlur`] parameters.
    UniformBlur(UniformBlurParams),
    /// [`SingleValueTransformer`] parameters.
    SingleValue(SingleValueParams),
    /// Block RMS parameters.
    BlockRms(BlockParams),
    /// Block peak parameters.
    BlockPeak(BlockParams),
    /// [`Loudness`] parameters.
    Loudness(LoudnessParams),
    /// [`WaveForm`] parameters.
    WaveForm(WaveFormParams),
    /// [`Spectrogram`] parameters.
    Spectrogram(SpectrogramParams),
}

/// Typed params plus the names of requested sources.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    /// Parsed parameters.
    pub params: Params,
    sources: Vec<String>,
}

impl ParseResult {
    /// Fails when more than one source is requested.
    pub fn new(params: Params, sources: Vec<String>) -> Result<Self, ParseError> {
        if sources.len() > 1 {
            return Err(ParseError::MultipleSources(sources.len()));
        }
        Ok(Self { params, sources })
    }

    /// The single requested source, if any.
    pub fn source(&self) -> Option<&str> {
        self.sources.first().map(String::as_str)
    }
}

/// Source names listed in the `source` option (comma separated).
pub(crate) fn parse_sources(options: &OptionMap) -> Result<Vec<String>, ParseError> {
    let sources: Vec<String> = options
        .get("source")
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();
    if sources.len() > 1 {
        return Err(ParseError::MultipleSources(sources.len()));
    }
    Ok(sources)
}

/// Like [`parse_sources`], but exactly one source is required.
pub(crate) fn required_sources(options: &OptionMap) -> Result<Vec<String>, ParseError> {
    let sources = parse_sources(options)?;
    if sources.is_empty() {
        return Err(ParseError::MissingSource);
    }
    Ok(sources)
}

/// Every concrete handler type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    /// Multi-cascade FFT.
    Fft,
    /// FFT bins to bands.
    BandResampler,
    /// Cascade blending per band.
    BandCascadeTransformer,
    /// Gaussian blur across bands.
    UniformBlur,
    /// Per-value transform.
    SingleValueTransformer,
    /// Block RMS level.
    BlockRms,
    /// Block peak level.
    BlockPeak,
    /// Gated loudness.
    Loudness,
    /// Waveform image.
    WaveForm,
    /// Spectrogram image.
    Spectrogram,
}

impl HandlerKind {
    /// Every kind.
    pub const ALL: [HandlerKind; 10] = [
        Self::Fft,
        Self::BandResampler,
        Self::BandCascadeTransformer,
        Self::UniformBlur,
        Self::SingleValueTransformer,
        Self::BlockRms,
        Self::BlockPeak,
        Self::Loudness,
        Self::WaveForm,
        Self::Spectrogram,
    ];

    /// Canonical type name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Fft => "FftAnalyzer",
            Self::BandResampler => "BandResampler",
            Self::BandCascadeTransformer => "BandCascadeTransformer",
            Self::UniformBlur => "UniformBlur",
            Self::SingleValueTransformer => "SingleValueTransformer",
            Self::BlockRms => "BlockRms",
            Self::BlockPeak => "BlockPeak",
            Self::Loudness => "Loudness",
            Self::WaveForm => "WaveForm",
            Self::Spectrogram => "Spectrogram",
        }
    }

    /// Parses raw options for this kind.
    pub fn parse_params(
        self,
        options: &OptionMap,
        version: ParamsVersion,
    ) -> Result<ParseResult, ParseError> {
        match self {
            Self::Fft => FftAnalyzer::parse_params(options, version),
            Self::BandResampler => BandResampler::parse_params(options, version),
            Self::BandCascadeTransformer => BandCascadeTransformer::parse_params(options, version),
            Self::UniformBlur => UniformBlur::parse_params(options, version),
            Self::SingleValueTransformer => SingleValueTransformer::parse_params(options, version),
            Self::BlockRms => BlockHandler::parse_params(options, version, false),
            Self::BlockPeak => BlockHandler::parse_params(options, version, true),
            Self::Loudness => Loudness::parse_params(options, version),
            Self::WaveForm => WaveForm::parse_params(options, version),
            Self::Spectrogram => Spectrogram::parse_params(options, version),
        }
    }

    /// Fresh, unconfigured handler of this kind.
    pub fn create(self) -> Box<dyn Handler> {
        match self {
            Self::Fft => Box::new(FftAnalyzer::new()),
            Self::BandResampler => Box::new(BandResampler::new()),
            Self::BandCascadeTransformer => Box::new(BandCascadeTransformer::new()),
            Self::UniformBlur => Box::new(UniformBlur::new()),
            Self::SingleValueTransformer => Box::new(SingleValueTransformer::new()),
            Self::BlockRms => Box::new(BlockHandler::rms()),
            Self::BlockPeak => Box::new(BlockHandler::peak()),
            Self::Loudness => Box::new(Loudness::new()),
            Self::WaveForm => Box::new(WaveForm::new()),
            Self::Spectrogram => Box::new(Spectrogram::new()),
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HandlerKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "fft" | "fftanalyzer" => Ok(Self::Fft),
            "bandresampler" => Ok(Self::BandResampler),
            "bandcascadetransformer" | "bandcascade" => Ok(Self::BandCascadeTransformer),
            "uniformblur" | "blur" => Ok(Self::UniformBlur),
            "singlevaluetransformer" | "transformer" => Ok(Self::SingleValueTransformer),
            "blockrms" | "rms" => Ok(Self::BlockRms),
            "blockpeak" | "peak" => Ok(Self::BlockPeak),
            "loudness" => Ok(Self::Loudness),
            "waveform" => Ok(Self::WaveForm),
            "spectrogram" => Ok(Self::Spectrogram),
            _ => Err(ParseError::UnknownHandlerKind(s.to_owned())),
        }
    }
}

/// Read-only view of an upstream node.
#[derive(Clone, Copy)]
pub struct SourceView<'a> {
    node: &'a HandlerNode,
}

impl<'a> SourceView<'a> {
    pub(crate) fn new(node: &'a HandlerNode) -> Self {
        Self { node }
    }

    /// Source name.
    pub fn name(&self) -> &'a str {
        self.node.name()
    }

    /// Source kind.
    pub fn kind(&self) -> HandlerKind {
        self.node.kind()
    }

    /// Source output shape.
    pub fn data_size(&self) -> &'a DataSize {
        self.node.data_size()
    }

    /// Chunks the source produced this cycle.
    pub fn chunks(&self, layer: usize) -> impl Iterator<Item = DataChunk<'a>> + 'a {
        self.node.output().chunks(layer)
    }

    /// Values the source committed last cycle.
    pub fn saved_data(&self, layer: usize) -> &'a [f32] {
        self.node.output().saved_data(layer)
    }

    /// Newest values of the source.
    pub fn last_data(&self, layer: usize) -> &'a [f32] {
        self.node.output().last_data(layer)
    }

    /// The source's handler.
    pub fn handler(&self) -> &'a dyn Handler {
        self.node.handler()
    }
}

impl fmt::Debug for SourceView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceView")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .finish()
    }
}

/// Everything a handler may look at while configuring.
#[derive(Debug, Clone, Copy)]
pub struct ConfigureContext<'a> {
    /// Resolved source, if the handler declared one.
    pub source: Option<SourceView<'a>>,
    /// Nearest band resampler up the source chain.
    pub resampler: Option<&'a BandResampler>,
    /// Effective sample rate after downsampling.
    pub sample_rate: u32,
    /// Channel this graph runs on.
    pub channel: Channel,
    /// Parameter protocol version.
    pub version: ParamsVersion,
    /// Name of the handler being configured.
    pub name: &'a str,
}

impl<'a> ConfigureContext<'a> {
    /// The source, or an error naming the missing dependency.
    pub fn require_source(&self) -> Result<SourceView<'a>, ConfigureError> {
        self.source
            .ok_or_else(|| ConfigureError::Invalid(format!("'{}' needs a source", self.name)))
    }

    /// The resampler, or [`ConfigureError::NoResampler`].
    pub fn require_resampler(&self) -> Result<&'a BandResampler, ConfigureError> {
        self.resampler
            .ok_or_else(|| ConfigureError::NoResampler(self.name.to_owned()))
    }
}

/// Per-call processing input.
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext<'a> {
    /// Filtered, downsampled mono wave for this cycle.
    pub wave: &'a [f32],
    /// Source view, already processed this cycle.
    pub source: Option<SourceView<'a>>,
    /// Nearest band resampler up the chain.
    pub resampler: Option<&'a BandResampler>,
    /// Compute deadline.
    pub kill_time: Instant,
}

impl ProcessContext<'_> {
    /// True once the compute deadline has passed.
    #[inline]
    pub fn deadline_passed(&self) -> bool {
        Instant::now() >= self.kill_time
    }
}

/// A node implementation.
///
/// `configure` must fully (re)initialise internal state for the given
/// params; the node only calls it when something relevant changed.
pub trait Handler: Send + fmt::Debug {
    /// Applies params and returns the output shape.
    fn configure(
        &mut self,
        params: &Params,
        ctx: &ConfigureContext<'_>,
    ) -> Result<DataSize, ConfigureError>;

    /// Takes params equal to the configured ones that may still differ in
    /// fields excluded from their equality. Must not reset signal state.
    fn retune(&mut self, _params: &Params) {}

    /// Appends this cycle's chunks to `out`.
    fn process(&mut self, ctx: &ProcessContext<'_>, out: &mut LayerBuffer);

    /// Completes pending work before the snapshot is taken.
    fn finish(&mut self) {}

    /// Drops accumulated signal state, keeping the configuration.
    fn reset(&mut self);

    /// The band resampler this handler is, if it is one.
    fn band_resampler(&self) -> Option<&BandResampler> {
        None
    }

    /// True if sinks may see through this handler to its resampler.
    fn forwards_resampler(&self) -> bool {
        false
    }

    /// Writes introspection data for the snapshot.
    fn update_info(&self, info: &mut HandlerInfo) {
        *info = HandlerInfo::None;
    }
}
