//! Synthetic capture for tests and demos.

use std::collections::VecDeque;
use std::f32::consts::PI;

use sondeo_analysis::{SampleFormat, WaveFormat};

use crate::Result;
use crate::capture::{CaptureEvent, CaptureSource, SampleBuffer};

/// Part of a synthetic stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Switch to a new format.
    Format(WaveFormat),
    /// The same sine on every channel.
    Sine {
        /// Frequency in Hz.
        freq_hz: f32,
        /// Peak amplitude.
        amplitude: f32,
        /// Length in frames.
        frames: usize,
    },
    /// A constant value on every channel.
    Constant {
        /// Sample value.
        value: f32,
        /// Length in frames.
        frames: usize,
    },
    /// Capture reports silence.
    Silence {
        /// Length in frames.
        frames: usize,
    },
}

/// Plays a list of [`Segment`]s in buffers of a fixed frame count.
///
/// ```rust
/// use sondeo_analysis::{ChannelLayout, SampleFormat, WaveFormat};
/// use sondeo_io::{CaptureEvent, CaptureSource, SignalCapture};
///
/// let format = WaveFormat {
///     sample_rate: 48000,
///     format: SampleFormat::F32,
///     layout: ChannelLayout::stereo(),
/// };
/// let mut source = SignalCapture::new(format, 480).sine(1000.0, 0.5, 960);
///
/// assert!(matches!(source.next_event().unwrap(), Some(CaptureEvent::Format(_))));
/// let Some(CaptureEvent::Buffer(buffer)) = source.next_event().unwrap() else {
///     panic!("expected a buffer");
/// };
/// assert_eq!(buffer.len(), 960);
/// ```
#[derive(Debug, Clone)]
pub struct SignalCapture {
    format: WaveFormat,
    buffer_frames: usize,
    segments: VecDeque<Segment>,
    phase: f32,
}

impl SignalCapture {
    /// Source that starts by announcing `format`.
    pub fn new(format: WaveFormat, buffer_frames: usize) -> Self {
        let mut segments = VecDeque::new();
        segments.push_back(Segment::Format(format.clone()));
        Self {
            format,
            buffer_frames: buffer_frames.max(1),
            segments,
            phase: 0.0,
        }
    }

    /// Append a segment.
    pub fn then(mut self, segment: Segment) -> Self {
        self.segments.push_back(segment);
        self
    }

    /// Append a sine.
    pub fn sine(self, freq_hz: f32, amplitude: f32, frames: usize) -> Self {
        self.then(Segment::Sine {
            freq_hz,
            amplitude,
            frames,
        })
    }

    /// Append a constant value.
    pub fn constant(self, value: f32, frames: usize) -> Self {
        self.then(Segment::Constant { value, frames })
    }

    /// Append reported silence.
    pub fn silence(self, frames: usize) -> Self {
        self.then(Segment::Silence { frames })
    }

    /// Append a format change.
    pub fn format_change(self, format: WaveFormat) -> Self {
        self.then(Segment::Format(format))
    }

    fn render(&mut self, frames: usize, mut sample: impl FnMut(&mut f32) -> f32) -> SampleBuffer {
        let channels = self.format.channels_count().max(1);
        let mut values = Vec::with_capacity(frames * channels);
        for _ in 0..frames {
            let v = sample(&mut self.phase);
            values.extend(std::iter::repeat_n(v, channels));
        }
        match self.format.format {
            SampleFormat::F32 => SampleBuffer::F32(values),
            SampleFormat::I16 => SampleBuffer::I16(
                values
                    .iter()
                    .map(|&v| (v * 32768.0).clamp(-32768.0, 32767.0) as i16)
                    .collect(),
            ),
        }
    }
}

impl CaptureSource for SignalCapture {
    fn next_event(&mut self) -> Result<Option<CaptureEvent>> {
        loop {
            let Some(segment) = self.segments.pop_front() else {
                return Ok(None);
            };

            let total = match &segment {
                Segment::Format(format) => {
                    self.format = format.clone();
                    return Ok(Some(CaptureEvent::Format(format.clone())));
                }
                Segment::Sine { frames, .. }
                | Segment::Constant { frames, .. }
                | Segment::Silence { frames } => *frames,
            };
            if total == 0 {
                continue;
            }

            let frames = self.buffer_frames.min(total);
            let rate = self.format.sample_rate.max(1) as f32;
            let (event, rest) = match segment {
                Segment::Sine {
                    freq_hz,
                    amplitude,
                    ..
                } => {
                    let step = 2.0 * PI * freq_hz / rate;
                    let buffer = self.render(frames, |phase| {
                        let v = amplitude * phase.sin();
                        *phase = (*phase + step) % (2.0 * PI);
                        v
                    });
                    let rest = Segment::Sine {
                        freq_hz,
                        amplitude,
                        frames: total - frames,
                    };
                    (CaptureEvent::Buffer(buffer), rest)
                }
                Segment::Constant { value, .. } => {
                    let buffer = self.render(frames, |_| value);
                    let rest = Segment::Constant {
                        value,
                        frames: total - frames,
                    };
                    (CaptureEvent::Buffer(buffer), rest)
                }
                Segment::Silence { .. } | Segment::Format(_) => (
                    CaptureEvent::Silence { frames },
                    Segment::Silence {
                        frames: total - frames,
                    },
                ),
            };
            if total > frames {
                self.segments.push_front(rest);
            }
            return Ok(Some(event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sondeo_analysis::ChannelLayout;

    fn format(format: SampleFormat) -> WaveFormat {
        WaveFormat {
            sample_rate: 48000,
            format,
            layout: ChannelLayout::stereo(),
        }
    }

    fn drain(mut source: SignalCapture) -> Vec<CaptureEvent> {
        let mut events = Vec::new();
        while let Some(event) = source.next_event().unwrap() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_segments_split_into_buffers() {
        let events = drain(
            SignalCapture::new(format(SampleFormat::F32), 400)
                .constant(0.25, 1000)
                .silence(500),
        );
        assert_eq!(events.len(), 6);
        assert!(matches!(events[0], CaptureEvent::Format(_)));
        let lens: Vec<usize> = events[1..4]
            .iter()
            .map(|e| match e {
                CaptureEvent::Buffer(b) => b.len(),
                _ => 0,
            })
            .collect();
        assert_eq!(lens, [800, 800, 400]);
        assert_eq!(events[4], CaptureEvent::Silence { frames: 400 });
        assert_eq!(events[5], CaptureEvent::Silence { frames: 100 });
    }

    #[test]
    fn test_i16_scaling() {
        let events = drain(SignalCapture::new(format(SampleFormat::I16), 4).constant(0.5, 2));
        assert_eq!(events[1], CaptureEvent::Buffer(SampleBuffer::I16(vec![16384; 4])));
    }

    #[test]
    fn test_sine_is_continuous_across_buffers() {
        let events = drain(SignalCapture::new(format(SampleFormat::F32), 7).sine(1000.0, 1.0, 48));
        let left: Vec<f32> = events
            .iter()
            .filter_map(|e| match e {
                CaptureEvent::Buffer(SampleBuffer::F32(s)) => Some(s.iter().step_by(2).copied()),
                _ => None,
            })
            .flatten()
            .collect();
        assert_eq!(left.len(), 48);
        for (i, &v) in left.iter().enumerate() {
            let expected = (2.0 * PI * 1000.0 * i as f32 / 48000.0).sin();
            assert!((v - expected).abs() < 1e-3, "sample {i}: {v} vs {expected}");
        }
    }

    #[test]
    fn test_format_change_switches_encoding() {
        let events = drain(
            SignalCapture::new(format(SampleFormat::F32), 10)
                .constant(0.0, 10)
                .format_change(format(SampleFormat::I16))
                .constant(0.0, 10),
        );
        assert!(matches!(events[1], CaptureEvent::Buffer(SampleBuffer::F32(_))));
        assert!(matches!(events[2], CaptureEvent::Format(_)));
        assert!(matches!(events[3], CaptureEvent::Buffer(SampleBuffer::I16(_))));
    }
}
