//! Capture source boundary.

use sondeo_analysis::{SampleData, WaveFormat};

use crate::Result;

/// Owned interleaved samples.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBuffer {
    /// Float samples.
    F32(Vec<f32>),
    /// 16-bit samples.
    I16(Vec<i16>),
}

impl SampleBuffer {
    /// Borrowed view for the orchestrator.
    pub fn as_data(&self) -> SampleData<'_> {
        match self {
            Self::F32(s) => SampleData::F32(s),
            Self::I16(s) => SampleData::I16(s),
        }
    }

    /// Number of samples, all channels counted.
    pub fn len(&self) -> usize {
        match self {
            Self::F32(s) => s.len(),
            Self::I16(s) => s.len(),
        }
    }

    /// True when there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One unit of capture output.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// The stream format changed; every processing is reconfigured.
    Format(WaveFormat),
    /// Interleaved samples in the current format.
    Buffer(SampleBuffer),
    /// No data was available for `frames` frames.
    Silence {
        /// Frames of silence.
        frames: usize,
    },
}

/// A stream of capture events.
///
/// The first event of a stream is expected to be a [`CaptureEvent::Format`];
/// buffers before any format are dropped by the orchestrator.
pub trait CaptureSource: Send {
    /// Next event, or `None` when the stream ended.
    fn next_event(&mut self) -> Result<Option<CaptureEvent>>;
}

impl<S: CaptureSource + ?Sized> CaptureSource for Box<S> {
    fn next_event(&mut self) -> Result<Option<CaptureEvent>> {
        (**self).next_event()
    }
}
