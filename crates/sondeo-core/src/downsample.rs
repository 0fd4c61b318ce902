//! Integer-ratio box decimation.

/// Divider for reaching `target_rate` from `source_rate`.
///
/// `max(1, floor(source / target))`; a zero target disables downsampling.
pub fn compute_divider(source_rate: u32, target_rate: u32) -> usize {
    if target_rate == 0 || source_rate <= target_rate {
        return 1;
    }
    (source_rate / target_rate).max(1) as usize
}

/// Averages every `divider` input samples into one output sample.
///
/// Partial groups are carried over to the next call, so block boundaries do
/// not affect the output.
#[derive(Debug, Clone)]
pub struct DownsampleHelper {
    divider: usize,
    accumulator: f32,
    counter: usize,
    output: Vec<f32>,
}

impl Default for DownsampleHelper {
    fn default() -> Self {
        Self::new(1)
    }
}

impl DownsampleHelper {
    /// Creates a decimator; a divider of 0 is treated as 1.
    pub fn new(divider: usize) -> Self {
        Self {
            divider: divider.max(1),
            accumulator: 0.0,
            counter: 0,
            output: Vec::new(),
        }
    }

    /// Current divider.
    pub fn divider(&self) -> usize {
        self.divider
    }

    /// Changes the divider and drops any carried remainder.
    pub fn set_divider(&mut self, divider: usize) {
        self.divider = divider.max(1);
        self.reset();
    }

    /// Drops the carried partial group.
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
        self.counter = 0;
    }

    /// Decimates `wave`. With a divider of 1 the input is returned as is.
    pub fn process<'a>(&'a mut self, wave: &'a [f32]) -> &'a [f32] {
        if self.divider == 1 {
            return wave;
        }

        self.output.clear();
        for &sample in wave {
            self.accumulator += sample;
            self.counter += 1;
            if self.counter == self.divider {
                self.output.push(self.accumulator / self.divider as f32);
                self.accumulator = 0.0;
                self.counter = 0;
            }
        }
        &self.output
    }
}
