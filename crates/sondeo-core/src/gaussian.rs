//! Gaussian blur kernels, cached per integer radius.

use std::collections::HashMap;

/// Lazily built, normalised Gaussian kernels.
///
/// A kernel for radius `r` has `2r + 1` taps, `sigma = r / 3`, and sums to 1.
#[derive(Debug, Clone, Default)]
pub struct GaussianKernelCache {
    kernels: HashMap<usize, Vec<f32>>,
}

impl GaussianKernelCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Kernel for `radius`, built on first request.
    pub fn kernel(&mut self, radius: usize) -> &[f32] {
        self.kernels
            .entry(radius)
            .or_insert_with(|| build_kernel(radius))
    }

    /// Number of cached kernels.
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    /// True if no kernel was requested yet.
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    /// Blurs `input` into `output` with the kernel for `radius`.
    ///
    /// Taps that fall outside the input contribute nothing.
    pub fn blur(&mut self, radius: usize, input: &[f32], output: &mut [f32]) {
        let kernel = self.kernel(radius);
        let len = input.len().min(output.len());
        for (i, out) in output.iter_mut().enumerate().take(len) {
            let mut sum = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let Some(idx) = (i + k).checked_sub(radius) else {
                    continue;
                };
                if idx >= len {
                    break;
                }
                sum += input[idx] * w;
            }
            *out = sum;
        }
    }
}

fn build_kernel(radius: usize) -> Vec<f32> {
    if radius == 0 {
        return vec![1.0];
    }
    let sigma = radius as f64 / 3.0;
    let denom = 2.0 * sigma * sigma;
    let r = radius as f64;
    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - r;
            (-(x * x) / denom).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel.into_iter().map(|w| w as f32).collect()
}
