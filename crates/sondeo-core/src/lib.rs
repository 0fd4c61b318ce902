//! Sondeo Core - DSP primitives for streaming audio analysis
//!
//! This crate provides the math the analysis graph in `sondeo-analysis` is
//! built from. Everything here is synchronous arithmetic over `f32`/`f64`
//! buffers: no threads, no I/O, and no allocation after a primitive has been
//! sized for its first input.
//!
//! # Filters
//!
//! - [`Biquad`] - Second-order IIR section with RBJ cookbook builders
//!   ([`high_shelf`], [`low_shelf`], [`high_pass`], [`low_pass`], [`peak`])
//! - [`butterworth`] - Butterworth coefficient generator (low/high/band-pass, band-stop)
//! - [`IirFilter`] - Arbitrary-order IIR driven by generated coefficients
//! - [`FilterCascade`] - Ordered chain of the above, described by [`FilterStage`]s
//!
//! # Spectral
//!
//! - [`Fft`] - Windowed real-input FFT exposing per-bin magnitudes and DC
//! - [`Window`] - Window functions
//!
//! # Interpolation and Smoothing
//!
//! - [`LinearInterpolator`] / [`DiscreteInterpolator`] - Range mappings
//! - [`cubic_at`] - Catmull-Rom interpolation over a sampled spectrum
//! - [`GaussianKernelCache`] - Normalised Gaussian blur kernels per radius
//! - [`ValueTransformer`] - `db`, `map`, `clamp` and attack/decay `filter` stages
//!
//! # Buffers and Resampling
//!
//! - [`Buffer2D`] - Fixed-shape row-major 2-D buffer
//! - [`DownsampleHelper`] - Integer-ratio box decimator
//!
//! # Features
//!
//! - `serde` - derive `Serialize`/`Deserialize` for [`FilterStage`] and [`FilterDescription`]
//! - `tracing` - debug logging when filter cascades are rebuilt
//!
//! # Example
//!
//! ```rust
//! use sondeo_core::{Biquad, high_pass};
//!
//! let mut filter = Biquad::new();
//! filter.set_coefficients(high_pass(0.5, 40.0, 48000.0));
//!
//! let mut wave = vec![1.0f32; 4096];
//! filter.process_in_place(&mut wave);
//! assert!(wave[4095].abs() < 0.01);
//! ```

pub mod biquad;
pub mod buffer2d;
pub mod butterworth;
pub mod downsample;
pub mod fft;
pub mod filter;
pub mod gaussian;
pub mod iir;
pub mod interpolation;
pub mod math;
pub mod transform;

pub use biquad::{
    Biquad, BiquadCoefficients, high_pass, high_shelf, low_pass, low_shelf, peak,
};
pub use buffer2d::Buffer2D;
pub use butterworth::ButterworthCoefficients;
pub use downsample::{DownsampleHelper, compute_divider};
pub use fft::{Fft, Window};
pub use filter::{FilterCascade, FilterDescription, FilterError, FilterStage};
pub use gaussian::GaussianKernelCache;
pub use iir::IirFilter;
pub use interpolation::{DiscreteInterpolator, LinearInterpolator, cubic_at};
pub use math::{
    amplitude_to_db, attack_decay_constant, db_to_amplitude, power_to_db, round_to_even,
};
pub use transform::{TransformDescription, TransformError, TransformStage, ValueTransformer};
