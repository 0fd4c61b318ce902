//! Butterworth IIR coefficient generator.
//!
//! Designs digital Butterworth filters through the bilinear transform and
//! returns direct-form coefficient vectors for [`IirFilter`](crate::IirFilter).
//! An order-`n` low/high-pass has `n + 1` coefficients per side; band-pass
//! and band-stop designs of order `n` produce a filter of order `2n`.
//!
//! Cutoffs are clamped to Nyquist. Internally frequencies are expressed as a
//! fraction of Nyquist (`2 * f / sample_rate`).

use std::f64::consts::PI;

use crate::filter::FilterError;

/// Direct-form IIR coefficients with a separate feedforward gain.
///
/// The filter realised by these coefficients is
/// ```text
/// a[0]*y[n] = gain * Σ b[k]*x[n-k] - Σ(k≥1) a[k]*y[n-k]
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ButterworthCoefficients {
    /// Feedback coefficients, `a[0] == 1`.
    pub a: Vec<f64>,
    /// Feedforward coefficients before scaling.
    pub b: Vec<f64>,
    /// Scaling factor that normalises the passband to unity gain.
    pub gain: f64,
}

impl ButterworthCoefficients {
    /// Low-pass of the given order.
    pub fn low_pass(order: usize, sample_rate: f64, cutoff: f64) -> Result<Self, FilterError> {
        let fcf = digital_frequency(order, sample_rate, cutoff)?;
        Ok(Self {
            a: denominator_single(order, fcf),
            b: binomial_row(order),
            gain: scale_low_pass(order, fcf),
        })
    }

    /// High-pass of the given order.
    pub fn high_pass(order: usize, sample_rate: f64, cutoff: f64) -> Result<Self, FilterError> {
        let fcf = digital_frequency(order, sample_rate, cutoff)?;
        let b = binomial_row(order)
            .into_iter()
            .enumerate()
            .map(|(i, c)| if i % 2 == 1 { -c } else { c })
            .collect();
        Ok(Self {
            a: denominator_single(order, fcf),
            b,
            gain: scale_high_pass(order, fcf),
        })
    }

    /// Band-pass between `lower` and `upper` Hz.
    pub fn band_pass(
        order: usize,
        sample_rate: f64,
        lower: f64,
        upper: f64,
    ) -> Result<Self, FilterError> {
        let (f1, f2) = band_edges(order, sample_rate, lower, upper)?;

        let high_pass_row: Vec<f64> = binomial_row(order)
            .into_iter()
            .enumerate()
            .map(|(i, c)| if i % 2 == 1 { -c } else { c })
            .collect();
        let mut b = vec![0.0; 2 * order + 1];
        for (i, c) in high_pass_row.iter().enumerate() {
            b[2 * i] = *c;
        }

        Ok(Self {
            a: denominator_band(order, f1, f2, false),
            b,
            gain: scale_band(order, 1.0 / (PI * (f2 - f1) / 2.0).tan()),
        })
    }

    /// Band-stop between `lower` and `upper` Hz.
    pub fn band_stop(
        order: usize,
        sample_rate: f64,
        lower: f64,
        upper: f64,
    ) -> Result<Self, FilterError> {
        let (f1, f2) = band_edges(order, sample_rate, lower, upper)?;

        let alpha = -2.0 * (PI * (f2 + f1) / 2.0).cos() / (PI * (f2 - f1) / 2.0).cos();
        let mut b = vec![0.0; 2 * order + 1];
        b[0] = 1.0;
        b[1] = alpha;
        b[2] = 1.0;
        for i in 1..order {
            b[2 * i + 2] += b[2 * i];
            for j in (2..=2 * i).rev() {
                b[j + 1] += alpha * b[j] + b[j - 1];
            }
            b[2] += alpha * b[1] + 1.0;
            b[1] += alpha;
        }

        Ok(Self {
            a: denominator_band(order, f1, f2, true),
            b,
            gain: scale_band(order, (PI * (f2 - f1) / 2.0).tan()),
        })
    }

    /// Filter order (number of feedback taps).
    pub fn order(&self) -> usize {
        self.a.len().saturating_sub(1)
    }
}

fn digital_frequency(order: usize, sample_rate: f64, cutoff: f64) -> Result<f64, FilterError> {
    if order == 0 {
        return Err(FilterError::InvalidOrder(order));
    }
    if sample_rate <= 0.0 || cutoff <= 0.0 {
        return Err(FilterError::InvalidFrequency(cutoff));
    }
    let cutoff = cutoff.min(sample_rate * 0.5);
    Ok(2.0 * cutoff / sample_rate)
}

fn band_edges(
    order: usize,
    sample_rate: f64,
    lower: f64,
    upper: f64,
) -> Result<(f64, f64), FilterError> {
    let f1 = digital_frequency(order, sample_rate, lower)?;
    let f2 = digital_frequency(order, sample_rate, upper)?;
    if f1 >= f2 {
        return Err(FilterError::InvalidBand { lower, upper });
    }
    Ok((f1, f2))
}

/// Row `n` of Pascal's triangle.
fn binomial_row(n: usize) -> Vec<f64> {
    let mut row = vec![1.0; n + 1];
    for i in 1..n {
        row[i] = row[i - 1] * (n - i + 1) as f64 / i as f64;
    }
    row
}

/// Multiplies `n` complex binomials `(z + p[k])` and returns interleaved
/// (re, im) coefficients of the product, highest power omitted.
fn binomial_mult(p: &[f64]) -> Vec<f64> {
    let n = p.len() / 2;
    let mut a = vec![0.0; 2 * n];
    for i in 0..n {
        for j in (1..=i).rev() {
            a[2 * j] += p[2 * i] * a[2 * (j - 1)] - p[2 * i + 1] * a[2 * (j - 1) + 1];
            a[2 * j + 1] += p[2 * i] * a[2 * (j - 1) + 1] + p[2 * i + 1] * a[2 * (j - 1)];
        }
        a[0] += p[2 * i];
        a[1] += p[2 * i + 1];
    }
    a
}

/// Multiplies `n` complex trinomials `(z² + b[k]z + c[k])`, same layout as
/// [`binomial_mult`].
fn trinomial_mult(b: &[f64], c: &[f64]) -> Vec<f64> {
    let n = b.len() / 2;
    let mut a = vec![0.0; 4 * n];
    a[2] = c[0];
    a[3] = c[1];
    a[0] = b[0];
    a[1] = b[1];

    for i in 1..n {
        a[2 * (2 * i + 1)] += c[2 * i] * a[2 * (2 * i - 1)] - c[2 * i + 1] * a[2 * (2 * i - 1) + 1];
        a[2 * (2 * i + 1) + 1] +=
            c[2 * i] * a[2 * (2 * i - 1) + 1] + c[2 * i + 1] * a[2 * (2 * i - 1)];

        for j in (2..=2 * i).rev() {
            a[2 * j] += b[2 * i] * a[2 * (j - 1)] - b[2 * i + 1] * a[2 * (j - 1) + 1]
                + c[2 * i] * a[2 * (j - 2)]
                - c[2 * i + 1] * a[2 * (j - 2) + 1];
            a[2 * j + 1] += b[2 * i] * a[2 * (j - 1) + 1]
                + b[2 * i + 1] * a[2 * (j - 1)]
                + c[2 * i] * a[2 * (j - 2) + 1]
                + c[2 * i + 1] * a[2 * (j - 2)];
        }

        a[2] += b[2 * i] * a[0] - b[2 * i + 1] * a[1] + c[2 * i];
        a[3] += b[2 * i] * a[1] + b[2 * i + 1] * a[0] + c[2 * i + 1];
        a[0] += b[2 * i];
        a[1] += b[2 * i + 1];
    }
    a
}

/// Keeps the real parts of a product polynomial and prepends `a[0] = 1`.
fn real_denominator(product: &[f64], order: usize) -> Vec<f64> {
    let mut a = Vec::with_capacity(order + 1);
    a.push(1.0);
    for k in 1..=order {
        a.push(product[2 * (k - 1)]);
    }
    a
}

fn denominator_single(order: usize, fcf: f64) -> Vec<f64> {
    let theta = PI * fcf;
    let (st, ct) = (theta.sin(), theta.cos());

    let mut poles = vec![0.0; 2 * order];
    for k in 0..order {
        let parg = PI * (2 * k + 1) as f64 / (2 * order) as f64;
        let a = 1.0 + st * parg.sin();
        poles[2 * k] = -ct / a;
        poles[2 * k + 1] = -st * parg.cos() / a;
    }

    real_denominator(&binomial_mult(&poles), order)
}

fn denominator_band(order: usize, f1: f64, f2: f64, stop: bool) -> Vec<f64> {
    let cp = (PI * (f2 + f1) / 2.0).cos();
    let theta = PI * (f2 - f1) / 2.0;
    let (st, ct) = (theta.sin(), theta.cos());
    let s2t = 2.0 * st * ct;
    let c2t = 2.0 * ct * ct - 1.0;
    let sign = if stop { -1.0 } else { 1.0 };

    let mut rcof = vec![0.0; 2 * order];
    let mut tcof = vec![0.0; 2 * order];
    for k in 0..order {
        let parg = PI * (2 * k + 1) as f64 / (2 * order) as f64;
        let (sparg, cparg) = (parg.sin(), parg.cos());
        let a = 1.0 + s2t * sparg;
        rcof[2 * k] = c2t / a;
        rcof[2 * k + 1] = sign * s2t * cparg / a;
        tcof[2 * k] = -2.0 * cp * (ct + st * sparg) / a;
        tcof[2 * k + 1] = -sign * 2.0 * cp * st * cparg / a;
    }

    real_denominator(&trinomial_mult(&tcof, &rcof), 2 * order)
}

fn scale_low_pass(order: usize, fcf: f64) -> f64 {
    let omega = PI * fcf;
    let fomega = omega.sin();
    let parg0 = PI / (2 * order) as f64;

    let mut sf = 1.0;
    for k in 0..order / 2 {
        sf *= 1.0 + fomega * ((2 * k + 1) as f64 * parg0).sin();
    }

    let half = (omega / 2.0).sin();
    if order % 2 == 1 {
        sf *= half + (omega / 2.0).cos();
    }
    half.powi(order as i32) / sf
}

fn scale_high_pass(order: usize, fcf: f64) -> f64 {
    let omega = PI * fcf;
    let fomega = omega.sin();
    let parg0 = PI / (2 * order) as f64;

    let mut sf = 1.0;
    for k in 0..order / 2 {
        sf *= 1.0 + fomega * ((2 * k + 1) as f64 * parg0).sin();
    }

    let half = (omega / 2.0).cos();
    if order % 2 == 1 {
        sf *= half + (omega / 2.0).sin();
    }
    half.powi(order as i32) / sf
}

/// Shared band-pass/band-stop scaling: `tt` is `cot(Δθ)` for band-pass and
/// `tan(Δθ)` for band-stop.
fn scale_band(order: usize, tt: f64) -> f64 {
    let mut sfr = 1.0;
    let mut sfi = 0.0;
    for k in 0..order {
        let parg = PI * (2 * k + 1) as f64 / (2 * order) as f64;
        let sparg = tt + parg.sin();
        let cparg = parg.cos();
        let a = (sfr + sfi) * (sparg - cparg);
        let b = sfr * sparg;
        let c = -sfi * cparg;
        sfr = b - c;
        sfi = a - b - c;
    }
    1.0 / sfr
}
