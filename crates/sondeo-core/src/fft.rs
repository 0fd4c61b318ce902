//! Windowed real-input FFT with magnitude readout.

use rustfft::{FftPlanner, num_complex::Complex};
use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Window function types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Window {
    /// Rectangular (no windowing)
    Rectangular,
    /// Hann window (raised cosine)
    #[default]
    Hann,
    /// Hamming window
    Hamming,
    /// Blackman window
    Blackman,
    /// Blackman-Harris window (better sidelobe suppression)
    BlackmanHarris,
}

impl Window {
    /// Apply window to a buffer
    pub fn apply(&self, buffer: &mut [f32]) {
        let n = buffer.len() as f32;
        let weight = |i: usize| {
            let x = 2.0 * PI * i as f32 / n;
            match self {
                Window::Rectangular => 1.0,
                Window::Hann => 0.5 * (1.0 - x.cos()),
                Window::Hamming => 0.54 - 0.46 * x.cos(),
                Window::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                Window::BlackmanHarris => {
                    0.35875 - 0.48829 * x.cos() + 0.14128 * (2.0 * x).cos()
                        - 0.01168 * (3.0 * x).cos()
                }
            }
        };
        for (i, sample) in buffer.iter_mut().enumerate() {
            *sample *= weight(i);
        }
    }

    /// Get window coefficients
    pub fn coefficients(&self, size: usize) -> Vec<f32> {
        let mut coeffs = vec![1.0; size];
        self.apply(&mut coeffs);
        coeffs
    }
}

impl FromStr for Window {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "rectangular" => Ok(Self::Rectangular),
            "hann" => Ok(Self::Hann),
            "hamming" => Ok(Self::Hamming),
            "blackman" => Ok(Self::Blackman),
            "blackmanharris" | "blackman-harris" => Ok(Self::BlackmanHarris),
            _ => Err(format!("unknown window: {s}")),
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rectangular => "none",
            Self::Hann => "hann",
            Self::Hamming => "hamming",
            Self::Blackman => "blackman",
            Self::BlackmanHarris => "blackmanHarris",
        })
    }
}

/// FFT processor with a cached plan, window and working buffers.
///
/// After [`process`](Self::process), [`bin_magnitude`](Self::bin_magnitude)
/// reads the scaled magnitude of bins `0..size/2`.
pub struct Fft {
    planner: FftPlanner<f32>,
    fft: Option<Arc<dyn rustfft::Fft<f32>>>,
    size: usize,
    window: Vec<f32>,
    scalar: f32,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl fmt::Debug for Fft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fft")
            .field("size", &self.size)
            .field("scalar", &self.scalar)
            .finish_non_exhaustive()
    }
}

impl Default for Fft {
    fn default() -> Self {
        Self::new()
    }
}

impl Fft {
    /// Create an unsized processor; call [`set_params`](Self::set_params) before use.
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            fft: None,
            size: 0,
            window: Vec::new(),
            scalar: 0.0,
            buffer: Vec::new(),
            scratch: Vec::new(),
        }
    }

    /// Sizes the transform.
    ///
    /// With `correct_scalar` magnitudes are scaled by `2 / Σwindow`, so a
    /// bin-centred sine of amplitude A reads ≈ A under any window. Otherwise
    /// the scale is `2 / size`.
    pub fn set_params(&mut self, size: usize, correct_scalar: bool, window: Window) {
        if size != self.size || self.fft.is_none() {
            let plan = self.planner.plan_fft_forward(size);
            self.scratch = vec![Complex::default(); plan.get_inplace_scratch_len()];
            self.fft = Some(plan);
            self.size = size;
        }
        self.window = window.coefficients(size);
        self.buffer = vec![Complex::default(); size];

        let sum: f32 = self.window.iter().sum();
        self.scalar = if correct_scalar && sum > 0.0 {
            2.0 / sum
        } else if size > 0 {
            2.0 / size as f32
        } else {
            0.0
        };
    }

    /// Transform size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Windows and transforms `wave`; shorter input is zero-padded.
    pub fn process(&mut self, wave: &[f32]) {
        let Some(fft) = &self.fft else {
            return;
        };
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let x = wave.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(x * self.window[i], 0.0);
        }
        fft.process_with_scratch(&mut self.buffer, &mut self.scratch);
    }

    /// DC magnitude: `|X0| · scalar / 2`.
    pub fn dc(&self) -> f32 {
        self.buffer.first().map_or(0.0, |c| c.norm() * self.scalar * 0.5)
    }

    /// Scaled magnitude of bin `index`; zero out of range.
    pub fn bin_magnitude(&self, index: usize) -> f32 {
        if index >= self.size / 2 {
            return 0.0;
        }
        self.buffer[index].norm() * self.scalar
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_at_bin(bin: usize, size: usize, amplitude: f32) -> Vec<f32> {
        (0..size)
            .map(|i| amplitude * (2.0 * PI * bin as f32 * i as f32 / size as f32).sin())
            .collect()
    }

    #[test]
    fn test_window_parse() {
        assert_eq!("Hann".parse::<Window>(), Ok(Window::Hann));
        assert_eq!("blackmanHarris".parse::<Window>(), Ok(Window::BlackmanHarris));
        assert_eq!("none".parse::<Window>(), Ok(Window::Rectangular));
        assert!("kaiser".parse::<Window>().is_err());
        assert_eq!(
            Window::BlackmanHarris.to_string().parse::<Window>(),
            Ok(Window::BlackmanHarris)
        );
    }

    #[test]
    fn test_window_endpoints() {
        let hann = Window::Hann.coefficients(64);
        assert!(hann[0].abs() < 1e-6);
        assert!((hann[32] - 1.0).abs() < 1e-6);
        assert!(Window::Rectangular.coefficients(8).iter().all(|&w| w == 1.0));
    }

    #[test]
    fn test_bin_aligned_sine_peaks_at_bin() {
        let mut fft = Fft::new();
        fft.set_params(1024, true, Window::Hann);
        fft.process(&sine_at_bin(64, 1024, 0.5));

        let peak = (0..512)
            .max_by(|&a, &b| fft.bin_magnitude(a).total_cmp(&fft.bin_magnitude(b)))
            .unwrap();
        assert_eq!(peak, 64);
        assert!((fft.bin_magnitude(64) - 0.5).abs() < 1e-3);
        assert!(fft.dc() < 1e-4);
    }

    #[test]
    fn test_dc_reads_offset() {
        let mut fft = Fft::new();
        fft.set_params(256, true, Window::Hamming);
        fft.process(&vec![0.25; 256]);
        assert!((fft.dc() - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_uncorrected_scalar() {
        let mut fft = Fft::new();
        fft.set_params(128, false, Window::Rectangular);
        fft.process(&sine_at_bin(8, 128, 1.0));
        assert!((fft.bin_magnitude(8) - 1.0).abs() < 1e-3);
        assert_eq!(fft.bin_magnitude(64), 0.0);
    }

    #[test]
    fn test_unsized_is_silent() {
        let mut fft = Fft::new();
        fft.process(&[1.0, 2.0]);
        assert_eq!(fft.dc(), 0.0);
        assert_eq!(fft.bin_magnitude(0), 0.0);
    }
}
