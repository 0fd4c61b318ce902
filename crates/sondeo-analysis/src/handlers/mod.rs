//! Concrete handlers.
//!
//! | kind | source | output |
//! |------|--------|--------|
//! | [`FftAnalyzer`] | none | one layer per cascade, `size / 2` magnitudes |
//! | [`BandResampler`] | FFT | one layer per used cascade, one value per band |
//! | [`BandCascadeTransformer`] | band resampler | one layer of bands |
//! | [`UniformBlur`] | any, resampler chain | same shape as source |
//! | [`SingleValueTransformer`] | any | same shape as source |
//! | [`BlockHandler`] | none | one value per block |
//! | [`Loudness`] | none | one value per micro-block |
//! | [`WaveForm`] | none | `[min, max]` per line plus an image |
//! | [`Spectrogram`] | any | image only |

mod band_cascade;
mod band_resampler;
mod block;
mod fft_analyzer;
mod loudness;
mod single_value;
mod spectrogram;
mod uniform_blur;
mod waveform;

pub use band_cascade::{BandCascadeParams, BandCascadeTransformer, MixFunction};
pub use band_resampler::{
    BandResampler, BandResamplerParams, MIN_BAND_SEPARATION, make_bands_from_freqs, parse_bands,
};
pub use block::{BlockHandler, BlockParams};
pub use fft_analyzer::{FftAnalyzer, FftParams, FftSize};
pub use loudness::{Loudness, LoudnessParams};
pub use single_value::{SingleValueParams, SingleValueTransformer};
pub use spectrogram::{Spectrogram, SpectrogramParams};
pub use uniform_blur::{UniformBlur, UniformBlurParams};
pub use waveform::{LineDrawingPolicy, WaveForm, WaveFormParams};
