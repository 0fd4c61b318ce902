//! Range mappings and spectrum interpolation.

/// Affine map from `[min, max]` onto `[value_min, value_max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearInterpolator {
    min: f64,
    value_min: f64,
    alpha: f64,
    reverse_alpha: f64,
}

impl Default for LinearInterpolator {
    fn default() -> Self {
        Self::new(0.0, 1.0, 0.0, 1.0)
    }
}

impl LinearInterpolator {
    /// Maps `min..max` to `value_min..value_max`. A zero-width source range
    /// maps everything to `value_min`.
    pub fn new(min: f64, max: f64, value_min: f64, value_max: f64) -> Self {
        let span = max - min;
        let value_span = value_max - value_min;
        let alpha = if span == 0.0 { 0.0 } else { value_span / span };
        let reverse_alpha = if value_span == 0.0 { 0.0 } else { span / value_span };
        Self {
            min,
            value_min,
            alpha,
            reverse_alpha,
        }
    }

    /// Forward mapping.
    #[inline]
    pub fn to_value(&self, linear: f64) -> f64 {
        self.value_min + (linear - self.min) * self.alpha
    }

    /// Inverse mapping.
    #[inline]
    pub fn to_linear(&self, value: f64) -> f64 {
        self.min + (value - self.value_min) * self.reverse_alpha
    }
}

/// Maps a continuous range onto integer cells `[value_min, value_max]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DiscreteInterpolator {
    linear: LinearInterpolator,
    value_min: i64,
    value_max: i64,
}

impl DiscreteInterpolator {
    /// Maps `min..max` onto cells `value_min..=value_max`.
    pub fn new(min: f64, max: f64, value_min: i64, value_max: i64) -> Self {
        Self {
            linear: LinearInterpolator::new(min, max, value_min as f64, value_max as f64),
            value_min,
            value_max,
        }
    }

    /// Nearest cell, clamped into range.
    pub fn to_value(&self, linear: f64) -> i64 {
        let v = self.linear.to_value(linear).round() as i64;
        v.clamp(self.value_min.min(self.value_max), self.value_max.max(self.value_min))
    }

    /// Nearest cell without clamping.
    pub fn to_value_unclamped(&self, linear: f64) -> i64 {
        self.linear.to_value(linear).round() as i64
    }
}

/// Catmull-Rom interpolation of `values` at fractional index `x`.
///
/// Neighbours beyond the ends repeat the edge sample; `x` is clamped into
/// `0..=len-1`.
pub fn cubic_at(values: &[f32], x: f64) -> f64 {
    let len = values.len();
    if len == 0 {
        return 0.0;
    }
    let last = (len - 1) as f64;
    let x = x.clamp(0.0, last);
    let i = x.floor() as usize;
    let t = x - i as f64;

    let at = |offset: isize| -> f64 {
        let idx = (i as isize + offset).clamp(0, len as isize - 1) as usize;
        f64::from(values[idx])
    };
    let (p0, p1, p2, p3) = (at(-1), at(0), at(1), at(2));

    let a = -0.5 * p0 + 1.5 * p1 - 1.5 * p2 + 0.5 * p3;
    let b = p0 - 2.5 * p1 + 2.0 * p2 - 0.5 * p3;
    let c = -0.5 * p0 + 0.5 * p2;
    ((a * t + b) * t + c) * t + p1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_roundtrip() {
        let li = LinearInterpolator::new(-50.0, 1950.0, 0.0, 19.0);
        assert!((li.to_value(-50.0)).abs() < 1e-12);
        assert!((li.to_value(1950.0) - 19.0).abs() < 1e-12);
        assert!((li.to_linear(li.to_value(700.0)) - 700.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_degenerate() {
        let li = LinearInterpolator::new(1.0, 1.0, 3.0, 7.0);
        assert_eq!(li.to_value(100.0), 3.0);
    }

    #[test]
    fn test_discrete_clamps() {
        let di = DiscreteInterpolator::new(-1.0, 1.0, 0, 99);
        assert_eq!(di.to_value(-1.0), 0);
        assert_eq!(di.to_value(1.0), 99);
        assert_eq!(di.to_value(5.0), 99);
        assert_eq!(di.to_value(0.0), 50);
        assert!(di.to_value_unclamped(5.0) > 99);
    }

    #[test]
    fn test_cubic_hits_samples() {
        let values = [0.0, 1.0, 4.0, 9.0, 16.0];
        for (i, v) in values.iter().enumerate() {
            assert!((cubic_at(&values, i as f64) - f64::from(*v)).abs() < 1e-9);
        }
        let mid = cubic_at(&values, 2.5);
        assert!(mid > 4.0 && mid < 9.0);
    }

    #[test]
    fn test_cubic_edges() {
        assert_eq!(cubic_at(&[], 1.0), 0.0);
        assert_eq!(cubic_at(&[2.0], 0.7), 2.0);
        assert_eq!(cubic_at(&[1.0, 3.0], -4.0), 1.0);
    }
}
