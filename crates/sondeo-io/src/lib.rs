//! Capture layer of the sondeo analyzer.
//!
//! This crate provides:
//!
//! - **Capture sources**: the [`CaptureSource`] trait delivering format
//!   changes, interleaved buffers and silence
//! - **WAV capture**: [`WavCapture`] streams a file in fixed-size buffers,
//!   optionally paced to real time
//! - **Synthetic capture**: [`SignalCapture`] for tests and demos
//! - **Runner**: [`CaptureLoop`] feeds an orchestrator from a source, and
//!   [`AnalyzerThread`] runs that loop on its own thread
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sondeo_io::{AnalyzerThread, WavCapture};
//!
//! let source = WavCapture::open("input.wav", 480)?.realtime(true);
//! let analyzer = AnalyzerThread::spawn(source, orchestrator)?;
//! let snapshot = analyzer.snapshot();
//! // ... read snapshot.value(...) from any thread ...
//! let stats = analyzer.stop()?;
//! ```

mod capture;
mod runner;
mod signal;
mod wav;

pub use capture::{CaptureEvent, CaptureSource, SampleBuffer};
pub use runner::{AnalyzerThread, CaptureLoop, RunStats};
pub use signal::{Segment, SignalCapture};
pub use wav::{WavCapture, WavInfo, read_wav_info};

/// Error types for capture operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// The stream format cannot be analysed.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The analyzer thread is gone.
    #[error("Analyzer thread disconnected")]
    Disconnected,

    /// The analyzer thread panicked.
    #[error("Analyzer thread panicked")]
    ThreadPanicked,

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for capture operations.
pub type Result<T> = std::result::Result<T, Error>;
