//! Arbitrary-order IIR filter in direct form II transposed.

use crate::butterworth::ButterworthCoefficients;

/// IIR filter with `f64` state, driven by [`ButterworthCoefficients`].
#[derive(Debug, Clone)]
pub struct IirFilter {
    b: Vec<f64>,
    a: Vec<f64>,
    state: Vec<f64>,
}

impl IirFilter {
    /// Builds a filter, folding the gain into the feedforward taps.
    pub fn new(coefficients: &ButterworthCoefficients) -> Self {
        let order = coefficients.a.len().max(coefficients.b.len());
        let a0 = coefficients.a.first().copied().unwrap_or(1.0);
        let a0 = if a0 == 0.0 { 1.0 } else { a0 };

        let mut b = vec![0.0; order];
        for (dst, src) in b.iter_mut().zip(&coefficients.b) {
            *dst = src * coefficients.gain / a0;
        }
        let mut a = vec![0.0; order];
        for (dst, src) in a.iter_mut().zip(&coefficients.a) {
            *dst = src / a0;
        }

        Self {
            b,
            a,
            state: vec![0.0; order.saturating_sub(1)],
        }
    }

    /// Processes one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let x = f64::from(input);
        let Some(&b0) = self.b.first() else {
            return input;
        };
        let y = b0 * x + self.state.first().copied().unwrap_or(0.0);

        let n = self.state.len();
        for i in 0..n {
            let next = if i + 1 < n { self.state[i + 1] } else { 0.0 };
            self.state[i] = next + self.b[i + 1] * x - self.a[i + 1] * y;
        }
        y as f32
    }

    /// Filters a block in place.
    pub fn process_in_place(&mut self, samples: &mut [f32]) {
        for s in samples {
            *s = self.process(*s);
        }
    }

    /// Clears the delay line.
    pub fn clear(&mut self) {
        self.state.fill(0.0);
    }

    /// Magnitude response at `freq` Hz.
    pub fn magnitude_at(&self, freq: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * std::f64::consts::PI * freq / sample_rate;
        let eval = |coefs: &[f64]| {
            let (mut re, mut im) = (0.0, 0.0);
            for (k, c) in coefs.iter().enumerate() {
                let phase = w * k as f64;
                re += c * phase.cos();
                im -= c * phase.sin();
            }
            (re * re + im * im).sqrt()
        };
        let den = eval(&self.a);
        if den == 0.0 { 0.0 } else { eval(&self.b) / den }
    }
}
