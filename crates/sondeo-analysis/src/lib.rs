//! Sondeo Analysis - deadline-aware handler graphs over streaming audio
//!
//! A capture stream is split into per-channel waves by the [`ChannelMixer`].
//! Each configured processing owns one handler graph per channel, runs the
//! wave through a pre-filter and a downsampler, and then through its
//! handlers in source-before-sink order. Results are published as a
//! [`Snapshot`] once per cycle.
//!
//! # Handlers
//!
//! - [`FftAnalyzer`] - Windowed multi-cascade FFT
//! - [`BandResampler`] - FFT bins to perceptual bands, with per-cascade weights
//! - [`BandCascadeTransformer`] - Blends the cascades of a band resampler
//! - [`UniformBlur`] - Gaussian blur across bands
//! - [`SingleValueTransformer`] - `db`, `map`, `clamp` and `filter` on every value
//! - [`BlockHandler`] - Block RMS and block peak
//! - [`Loudness`] - K-weighted gated loudness
//! - [`WaveForm`] / [`Spectrogram`] - Pixel-line renderers
//!
//! # Pipeline
//!
//! - [`ProcessingDefinition`] - Channels, filter, target rate and sorted handlers
//! - [`ProcessingManager`] - Per-channel graphs with generation-based reconfiguration
//! - [`Orchestrator`] - Compute and finish deadlines, snapshot publishing
//! - [`SharedSnapshot`] - Lock-guarded view for reader threads
//!
//! # Example
//!
//! ```rust
//! use sondeo_analysis::{
//!     Channel, ChannelLayout, HandlerDefinition, HandlerKind, OptionMap, Orchestrator,
//!     OrchestratorParams, ParamsVersion, ProcessingDefinition, SampleData, SampleFormat,
//!     WaveFormat,
//! };
//! use sondeo_core::FilterDescription;
//! use std::time::Duration;
//!
//! let rms = HandlerDefinition::parse(
//!     "rms",
//!     HandlerKind::BlockRms,
//!     &OptionMap::new().with("updateInterval", "10"),
//!     ParamsVersion::CURRENT,
//! )
//! .unwrap();
//! let main = ProcessingDefinition::new(
//!     vec![Channel::Auto],
//!     0,
//!     &FilterDescription::default(),
//!     ParamsVersion::CURRENT,
//!     vec![rms],
//! )
//! .unwrap();
//!
//! let mut params = OrchestratorParams {
//!     compute_timeout: Duration::from_secs(1),
//!     ..OrchestratorParams::default()
//! };
//! params.processings.insert("main".into(), main);
//!
//! let mut orchestrator = Orchestrator::new(params);
//! let snapshot = orchestrator.snapshot();
//! orchestrator.set_format(WaveFormat {
//!     sample_rate: 48000,
//!     format: SampleFormat::F32,
//!     layout: ChannelLayout::mono(),
//! });
//! orchestrator.process_buffer(SampleData::F32(&[0.5; 480]));
//!
//! assert_eq!(snapshot.value("main", Channel::Auto, "rms", 0), 0.5);
//! ```

pub mod channel;
pub mod definition;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod image;
pub mod manager;
pub mod mixer;
pub mod options;
pub mod orchestrator;
pub mod snapshot;
pub mod version;

pub use channel::{Channel, ChannelLayout};
pub use definition::{HandlerDefinition, ProcessingDefinition};
pub use error::{ConfigureError, ParseError, PipelineError};
pub use handler::{
    DataChunk, DataSize, Handler, HandlerInfo, HandlerKind, HandlerNode, HandlerState,
    LayerBuffer, Params, ParseResult,
};
pub use handlers::{
    BandCascadeTransformer, BandResampler, BlockHandler, FftAnalyzer, Loudness,
    SingleValueTransformer, Spectrogram, UniformBlur, WaveForm, make_bands_from_freqs,
    parse_bands,
};
pub use image::{Color, LinedImage};
pub use manager::ProcessingManager;
pub use mixer::{ChannelMixer, SampleData, SampleFormat, WaveFormat};
pub use options::OptionMap;
pub use orchestrator::{Orchestrator, OrchestratorParams};
pub use snapshot::{HandlerSnapshot, SharedSnapshot, Snapshot};
pub use version::ParamsVersion;
