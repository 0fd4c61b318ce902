//! Biquad (bi-quadratic) filter structure.
//!
//! A second-order IIR section plus builders for the filter shapes the
//! analyzer needs for pre-filtering and K-weighting: high shelf, low shelf,
//! high-pass, low-pass and peaking EQ.
//!
//! Coefficient calculation uses the RBJ Audio EQ Cookbook formulas. Every
//! builder returns passthrough coefficients when the sample rate or `q` is
//! zero, so a half-configured cascade never produces NaN.

use std::f64::consts::PI;

/// Normalised biquad coefficients (`a0 == 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    /// Feedforward coefficients
    pub b0: f64,
    /// Feedforward coefficient for x[n-1]
    pub b1: f64,
    /// Feedforward coefficient for x[n-2]
    pub b2: f64,
    /// Feedback coefficient for y[n-1]
    pub a1: f64,
    /// Feedback coefficient for y[n-2]
    pub a2: f64,
}

impl BiquadCoefficients {
    /// Builds normalised coefficients from raw cookbook values.
    ///
    /// Note: this function divides every coefficient by `a0`.
    pub fn new(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        let a0_inv = 1.0 / a0;
        Self {
            b0: b0 * a0_inv,
            b1: b1 * a0_inv,
            b2: b2 * a0_inv,
            a1: a1 * a0_inv,
            a2: a2 * a0_inv,
        }
    }

    /// Coefficients that pass the input through unchanged.
    pub const fn passthrough() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Returns these coefficients with the feedforward path scaled by `gain`.
    pub fn scaled(self, gain: f64) -> Self {
        Self {
            b0: self.b0 * gain,
            b1: self.b1 * gain,
            b2: self.b2 * gain,
            ..self
        }
    }

    /// Magnitude response at `frequency` Hz.
    pub fn magnitude_at(&self, frequency: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * frequency / sample_rate;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());

        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);

        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt()
    }
}

impl Default for BiquadCoefficients {
    fn default() -> Self {
        Self::passthrough()
    }
}

/// Generic biquad filter coefficients and state.
///
/// Implements the Direct Form I biquad structure:
/// ```text
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
///                - a1*y[n-1] - a2*y[n-2]
/// ```
///
/// Coefficients and delay lines are `f64`; samples cross the API as `f32`.
#[derive(Debug, Clone, Default)]
pub struct Biquad {
    coefficients: BiquadCoefficients,

    /// Input delay line: x[n-1], x[n-2]
    x1: f64,
    x2: f64,

    /// Output delay line: y[n-1], y[n-2]
    y1: f64,
    y2: f64,
}

impl Biquad {
    /// Creates a new biquad with passthrough coefficients.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a biquad with the given coefficients.
    pub fn with_coefficients(coefficients: BiquadCoefficients) -> Self {
        Self {
            coefficients,
            ..Self::default()
        }
    }

    /// Replaces the coefficients, keeping the delay lines.
    pub fn set_coefficients(&mut self, coefficients: BiquadCoefficients) {
        self.coefficients = coefficients;
    }

    /// Current coefficients.
    pub fn coefficients(&self) -> &BiquadCoefficients {
        &self.coefficients
    }

    /// Processes a single sample through the biquad filter.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let c = &self.coefficients;
        let x = f64::from(input);
        let output = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = output;

        output as f32
    }

    /// Filters a buffer in place.
    pub fn process_in_place(&mut self, wave: &mut [f32]) {
        for sample in wave.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    /// Clears the filter state (delay lines).
    pub fn clear(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

fn is_degenerate(q: f64, sample_rate: f64) -> bool {
    sample_rate == 0.0 || q == 0.0
}

/// High shelf with `db_gain` above `frequency`.
///
/// # Arguments
///
/// * `db_gain` - Shelf gain in dB
/// * `q` - Shelf slope Q
/// * `frequency` - Shelf midpoint in Hz
/// * `sample_rate` - Sample rate in Hz
pub fn high_shelf(db_gain: f64, q: f64, frequency: f64, sample_rate: f64) -> BiquadCoefficients {
    if is_degenerate(q, sample_rate) {
        return BiquadCoefficients::passthrough();
    }
    let a = 10f64.powf(db_gain / 40.0);
    let w0 = 2.0 * PI * frequency / sample_rate;
    let cos_w0 = w0.cos();
    let alpha = w0.sin() / (2.0 * q);
    let sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

    BiquadCoefficients::new(
        a * ((a + 1.0) + (a - 1.0) * cos_w0 + sqrt_a_alpha),
        -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
        a * ((a + 1.0) + (a - 1.0) * cos_w0 - sqrt_a_alpha),
        (a + 1.0) - (a - 1.0) * cos_w0 + sqrt_a_alpha,
        2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
        (a + 1.0) - (a - 1.0) * cos_w0 - sqrt_a_alpha,
    )
}

/// Low shelf with `db_gain` below `frequency`.
pub fn low_shelf(db_gain: f64, q: f64, frequency: f64, sample_rate: f64) -> BiquadCoefficients {
    if is_degenerate(q, sample_rate) {
        return BiquadCoefficients::passthrough();
    }
    let a = 10f64.powf(db_gain / 40.0);
    let w0 = 2.0 * PI * frequency / sample_rate;
    let cos_w0 = w0.cos();
    let alpha = w0.sin() / (2.0 * q);
    let sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

    BiquadCoefficients::new(
        a * ((a + 1.0) - (a - 1.0) * cos_w0 + sqrt_a_alpha),
        2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
        a * ((a + 1.0) - (a - 1.0) * cos_w0 - sqrt_a_alpha),
        (a + 1.0) + (a - 1.0) * cos_w0 + sqrt_a_alpha,
        -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
        (a + 1.0) + (a - 1.0) * cos_w0 - sqrt_a_alpha,
    )
}

/// Second-order high-pass.
pub fn high_pass(q: f64, frequency: f64, sample_rate: f64) -> BiquadCoefficients {
    if is_degenerate(q, sample_rate) {
        return BiquadCoefficients::passthrough();
    }
    let w0 = 2.0 * PI * frequency / sample_rate;
    let cos_w0 = w0.cos();
    let alpha = w0.sin() / (2.0 * q);

    BiquadCoefficients::new(
        (1.0 + cos_w0) / 2.0,
        -(1.0 + cos_w0),
        (1.0 + cos_w0) / 2.0,
        1.0 + alpha,
        -2.0 * cos_w0,
        1.0 - alpha,
    )
}

/// Second-order low-pass.
pub fn low_pass(q: f64, frequency: f64, sample_rate: f64) -> BiquadCoefficients {
    if is_degenerate(q, sample_rate) {
        return BiquadCoefficients::passthrough();
    }
    let w0 = 2.0 * PI * frequency / sample_rate;
    let cos_w0 = w0.cos();
    let alpha = w0.sin() / (2.0 * q);

    BiquadCoefficients::new(
        (1.0 - cos_w0) / 2.0,
        1.0 - cos_w0,
        (1.0 - cos_w0) / 2.0,
        1.0 + alpha,
        -2.0 * cos_w0,
        1.0 - alpha,
    )
}

/// Peaking EQ with `db_gain` at `frequency`.
pub fn peak(db_gain: f64, q: f64, frequency: f64, sample_rate: f64) -> BiquadCoefficients {
    if is_degenerate(q, sample_rate) {
        return BiquadCoefficients::passthrough();
    }
    let a = 10f64.powf(db_gain / 40.0);
    let w0 = 2.0 * PI * frequency / sample_rate;
    let cos_w0 = w0.cos();
    let alpha = w0.sin() / (2.0 * q);

    BiquadCoefficients::new(
        1.0 + alpha * a,
        -2.0 * cos_w0,
        1.0 - alpha * a,
        1.0 + alpha / a,
        -2.0 * cos_w0,
        1.0 - alpha / a,
    )
}
