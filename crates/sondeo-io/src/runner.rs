//! Capture loop and its dedicated analyzer thread.
//!
//! [`CaptureLoop`] pulls events from a [`CaptureSource`] and feeds the
//! [`Orchestrator`] one cycle per event. [`AnalyzerThread`] runs the same
//! loop on its own thread; parameter updates cross over a bounded channel
//! and consumers read results through the [`SharedSnapshot`] handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use sondeo_analysis::{Orchestrator, OrchestratorParams, SharedSnapshot};

use crate::capture::{CaptureEvent, CaptureSource};
use crate::{Error, Result};

/// Counters of a capture loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Format events seen.
    pub formats: u64,
    /// Buffers processed.
    pub buffers: u64,
    /// Silence events processed.
    pub silences: u64,
    /// Frames processed, silence included.
    pub frames: u64,
    /// Cycles that hit a deadline.
    pub overruns: u64,
}

/// Drives an orchestrator from a capture source on the caller's thread.
pub struct CaptureLoop<S> {
    source: S,
    orchestrator: Orchestrator,
    params_rx: Option<Receiver<OrchestratorParams>>,
    stats: RunStats,
}

impl<S: CaptureSource> CaptureLoop<S> {
    /// Loop over `source` feeding `orchestrator`.
    pub fn new(source: S, orchestrator: Orchestrator) -> Self {
        Self {
            source,
            orchestrator,
            params_rx: None,
            stats: RunStats::default(),
        }
    }

    /// Applies params arriving on `rx` before each event.
    pub fn with_params_channel(mut self, rx: Receiver<OrchestratorParams>) -> Self {
        self.params_rx = Some(rx);
        self
    }

    /// The orchestrator being fed.
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Counters so far.
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Handles one event. Returns false once the source is exhausted.
    pub fn step(&mut self) -> Result<bool> {
        if let Some(rx) = &self.params_rx {
            // only the newest update matters
            if let Some(params) = rx.try_iter().last() {
                tracing::info!(processings = params.processings.len(), "params updated");
                self.orchestrator.set_params(params);
            }
        }

        let Some(event) = self.source.next_event()? else {
            return Ok(false);
        };
        let completed = match event {
            CaptureEvent::Format(format) => {
                self.stats.formats += 1;
                self.orchestrator.set_format(format);
                true
            }
            CaptureEvent::Buffer(buffer) => {
                self.stats.buffers += 1;
                let channels = self
                    .orchestrator
                    .format()
                    .map_or(1, |f| f.channels_count().max(1));
                self.stats.frames += (buffer.len() / channels) as u64;
                self.orchestrator.process_buffer(buffer.as_data())
            }
            CaptureEvent::Silence { frames } => {
                self.stats.silences += 1;
                self.stats.frames += frames as u64;
                self.orchestrator.process_silence(frames)
            }
        };
        if !completed {
            self.stats.overruns += 1;
        }
        Ok(true)
    }

    /// Runs until the source is exhausted or `running` is cleared.
    pub fn run(&mut self, running: &AtomicBool) -> Result<RunStats> {
        while running.load(Ordering::Acquire) && self.step()? {}
        Ok(self.stats)
    }

    /// Gives the source and orchestrator back.
    pub fn into_parts(self) -> (S, Orchestrator) {
        (self.source, self.orchestrator)
    }
}

/// A capture loop on a dedicated thread.
///
/// Dropping the handle stops and joins the thread.
pub struct AnalyzerThread {
    snapshot: SharedSnapshot,
    params_tx: Sender<OrchestratorParams>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<RunStats>>>,
}

impl AnalyzerThread {
    /// Spawns the loop feeding `orchestrator` from `source`.
    pub fn spawn<S>(source: S, orchestrator: Orchestrator) -> Result<Self>
    where
        S: CaptureSource + 'static,
    {
        let snapshot = orchestrator.snapshot();
        let (params_tx, params_rx) = bounded(4);
        let running = Arc::new(AtomicBool::new(true));

        let running_loop = Arc::clone(&running);
        let handle = std::thread::Builder::new()
            .name("sondeo-analyzer".into())
            .spawn(move || {
                let mut capture =
                    CaptureLoop::new(source, orchestrator).with_params_channel(params_rx);
                let result = capture.run(&running_loop);
                running_loop.store(false, Ordering::Release);
                match &result {
                    Ok(stats) => tracing::debug!(?stats, "analyzer thread finished"),
                    Err(error) => tracing::error!(%error, "analyzer thread failed"),
                }
                result
            })?;

        Ok(Self {
            snapshot,
            params_tx,
            running,
            handle: Some(handle),
        })
    }

    /// Handle for reading published results.
    pub fn snapshot(&self) -> SharedSnapshot {
        self.snapshot.clone()
    }

    /// True until the loop ends or is stopped.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Queues new params for the loop.
    pub fn set_params(&self, params: OrchestratorParams) -> Result<()> {
        match self.params_tx.try_send(params) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(params)) => {
                self.params_tx.send(params).map_err(|_| Error::Disconnected)
            }
            Err(TrySendError::Disconnected(_)) => Err(Error::Disconnected),
        }
    }

    /// Waits for the source to run out.
    pub fn join(mut self) -> Result<RunStats> {
        self.wait()
    }

    /// Stops the loop and waits for it.
    pub fn stop(mut self) -> Result<RunStats> {
        self.running.store(false, Ordering::Release);
        self.wait()
    }

    fn wait(&mut self) -> Result<RunStats> {
        let Some(handle) = self.handle.take() else {
            return Err(Error::Disconnected);
        };
        handle.join().map_err(|_| Error::ThreadPanicked)?
    }
}

impl Drop for AnalyzerThread {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.running.store(false, Ordering::Release);
            let _ = self.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalCapture;
    use sondeo_analysis::{
        Channel, ChannelLayout, HandlerDefinition, HandlerKind, OptionMap, ParamsVersion,
        ProcessingDefinition, SampleFormat, WaveFormat,
    };
    use sondeo_core::FilterDescription;
    use std::time::Duration;

    fn params(update_interval_ms: &str) -> OrchestratorParams {
        let rms = HandlerDefinition::parse(
            "rms",
            HandlerKind::BlockRms,
            &OptionMap::new().with("updateInterval", update_interval_ms),
            ParamsVersion::CURRENT,
        )
        .unwrap();
        let main = ProcessingDefinition::new(
            vec![Channel::Auto],
            0,
            &FilterDescription::default(),
            ParamsVersion::CURRENT,
            vec![rms],
        )
        .unwrap();
        let mut params = OrchestratorParams {
            compute_timeout: Duration::from_secs(60),
            finish_timeout: Duration::from_secs(60),
            ..OrchestratorParams::default()
        };
        params.processings.insert("main".into(), main);
        params
    }

    fn format() -> WaveFormat {
        WaveFormat {
            sample_rate: 48000,
            format: SampleFormat::F32,
            layout: ChannelLayout::stereo(),
        }
    }

    #[test]
    fn test_loop_counts_events() {
        let source = SignalCapture::new(format(), 480)
            .constant(0.5, 960)
            .silence(480);
        let mut capture = CaptureLoop::new(source, Orchestrator::new(params("10")));
        let snapshot = capture.orchestrator().snapshot();

        assert!(capture.step().unwrap());
        assert!(capture.step().unwrap());
        assert_eq!(snapshot.value("main", Channel::Auto, "rms", 0), 0.5);

        let stats = capture.run(&AtomicBool::new(true)).unwrap();
        assert_eq!(
            stats,
            RunStats {
                formats: 1,
                buffers: 2,
                silences: 1,
                frames: 1440,
                overruns: 0,
            }
        );
        assert_eq!(snapshot.value("main", Channel::Auto, "rms", 0), 0.0);
        assert!(!capture.step().unwrap());
    }

    #[test]
    fn test_params_channel_applies_newest() {
        let (tx, rx) = bounded(4);
        let source = SignalCapture::new(format(), 480).constant(0.5, 480);
        let mut capture =
            CaptureLoop::new(source, Orchestrator::new(params("10"))).with_params_channel(rx);
        tx.send(params("5")).unwrap();
        tx.send(params("20")).unwrap();
        capture.step().unwrap();

        let mut s = String::new();
        let snapshot = capture.orchestrator().snapshot();
        assert!(snapshot.prop("main", Channel::Auto, "rms", "block size", &mut s));
        assert_eq!(s, "960");
    }

    #[test]
    fn test_thread_runs_to_end() {
        let source = SignalCapture::new(format(), 480).constant(0.5, 4800);
        let analyzer = AnalyzerThread::spawn(source, Orchestrator::new(params("10"))).unwrap();
        let snapshot = analyzer.snapshot();
        let stats = analyzer.join().unwrap();
        assert_eq!(stats.buffers, 10);
        assert_eq!(snapshot.value("main", Channel::Auto, "rms", 0), 0.5);
    }

    #[test]
    fn test_stop_ends_endless_source() {
        struct Endless;
        impl CaptureSource for Endless {
            fn next_event(&mut self) -> Result<Option<CaptureEvent>> {
                std::thread::sleep(Duration::from_millis(1));
                Ok(Some(CaptureEvent::Silence { frames: 480 }))
            }
        }

        let analyzer = AnalyzerThread::spawn(Endless, Orchestrator::new(params("10"))).unwrap();
        assert!(analyzer.is_running());
        std::thread::sleep(Duration::from_millis(20));
        let stats = analyzer.stop().unwrap();
        assert!(stats.silences > 0);
    }
}
