//! Drives every processing through deadline-bounded compute cycles.
//!
//! One cycle per capture buffer:
//!
//! 1. the [`ChannelMixer`] splits the buffer (or zero-fills for silence),
//! 2. every [`ProcessingManager`] runs until the compute deadline,
//! 3. every node finishes until the finish deadline,
//! 4. the staged [`Snapshot`] is updated and published in one lock.
//!
//! Overruns are not errors: untouched nodes keep their previous values.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::definition::ProcessingDefinition;
use crate::manager::ProcessingManager;
use crate::mixer::{ChannelMixer, SampleData, WaveFormat};
use crate::snapshot::{SharedSnapshot, Snapshot};

/// Processings plus cycle deadlines.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorParams {
    /// Processings by name.
    pub processings: BTreeMap<String, ProcessingDefinition>,
    /// Budget for the compute phase of a cycle.
    pub compute_timeout: Duration,
    /// Budget for the finish phase of a cycle.
    pub finish_timeout: Duration,
}

impl Default for OrchestratorParams {
    fn default() -> Self {
        Self {
            processings: BTreeMap::new(),
            compute_timeout: Duration::from_millis(8),
            finish_timeout: Duration::from_millis(2),
        }
    }
}

/// Owner of all processings of one capture stream.
#[derive(Debug)]
pub struct Orchestrator {
    params: OrchestratorParams,
    format: Option<WaveFormat>,
    mixer: ChannelMixer,
    managers: BTreeMap<String, ProcessingManager>,
    staging: Snapshot,
    shared: SharedSnapshot,
    cycles: u64,
    overruns: u64,
}

impl Orchestrator {
    /// Orchestrator waiting for a format.
    pub fn new(params: OrchestratorParams) -> Self {
        Self {
            params,
            format: None,
            mixer: ChannelMixer::new(),
            managers: BTreeMap::new(),
            staging: Snapshot::new(),
            shared: SharedSnapshot::new(),
            cycles: 0,
            overruns: 0,
        }
    }

    /// Current params.
    pub fn params(&self) -> &OrchestratorParams {
        &self.params
    }

    /// Current stream format.
    pub fn format(&self) -> Option<&WaveFormat> {
        self.format.as_ref()
    }

    /// Handle readers use to see published cycles.
    pub fn snapshot(&self) -> SharedSnapshot {
        self.shared.clone()
    }

    /// Manager of a processing.
    pub fn manager(&self, name: &str) -> Option<&ProcessingManager> {
        self.managers.get(name)
    }

    /// Completed cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Cycles that hit a deadline.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Replaces the processings. Unchanged handlers keep their state.
    pub fn set_params(&mut self, params: OrchestratorParams) {
        self.params = params;
        self.apply();
    }

    /// Adopts a new stream format and reconfigures every processing.
    pub fn set_format(&mut self, format: WaveFormat) {
        tracing::info!(
            sample_rate = format.sample_rate,
            layout = format.layout.name(),
            format = ?format.format,
            "capture format"
        );
        self.mixer.set_format(&format);
        self.format = Some(format);
        self.apply();
    }

    /// Runs one cycle over an interleaved buffer.
    ///
    /// Returns false if a deadline cut the cycle short. Buffers arriving
    /// before any format are dropped.
    pub fn process_buffer(&mut self, data: SampleData<'_>) -> bool {
        if self.format.is_none() {
            tracing::debug!(samples = data.len(), "no capture format yet, buffer dropped");
            return true;
        }
        self.mixer.decompose(data);
        self.run_cycle()
    }

    /// Runs one cycle over `frames` frames of silence.
    pub fn process_silence(&mut self, frames: usize) -> bool {
        if self.format.is_none() {
            return true;
        }
        self.mixer.fill_silence(frames);
        self.run_cycle()
    }

    /// Drops signal state of every processing.
    pub fn reset(&mut self) {
        for manager in self.managers.values_mut() {
            manager.reset();
        }
    }

    fn apply(&mut self) {
        let Some(format) = &self.format else {
            return;
        };

        self.managers
            .retain(|name, _| self.params.processings.contains_key(name));
        for (name, definition) in &self.params.processings {
            let manager = self
                .managers
                .entry(name.clone())
                .or_insert_with(|| ProcessingManager::new(name.clone()));
            let invalid =
                manager.set_params(definition.clone(), &format.layout, format.sample_rate);
            if invalid > 0 {
                tracing::warn!(processing = %name, invalid, "some handlers are invalid");
            }
        }

        self.staging
            .retain_processings(|name| self.managers.contains_key(name));
        self.publish();
    }

    fn run_cycle(&mut self) -> bool {
        let start = Instant::now();
        let kill_time = start + self.params.compute_timeout;
        let mut completed = true;
        for manager in self.managers.values_mut() {
            completed &= manager.process(&self.mixer, kill_time);
        }

        let finish_time = Instant::now() + self.params.finish_timeout;
        for manager in self.managers.values_mut() {
            completed &= manager.finish(finish_time);
        }

        self.publish();
        self.cycles += 1;
        if !completed {
            self.overruns += 1;
            tracing::debug!(
                cycle = self.cycles,
                elapsed_us = start.elapsed().as_micros() as u64,
                "cycle overran its deadline"
            );
        }
        completed
    }

    fn publish(&mut self) {
        for (name, manager) in &self.managers {
            manager.update_snapshot(self.staging.processing_mut(name));
        }
        self.shared.publish(&self.staging);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Channel, ChannelLayout};
    use crate::definition::HandlerDefinition;
    use crate::handler::HandlerKind;
    use crate::mixer::SampleFormat;
    use crate::options::OptionMap;
    use crate::version::ParamsVersion;
    use sondeo_core::FilterDescription;

    fn params(names: &[&str]) -> OrchestratorParams {
        let mut params = OrchestratorParams {
            compute_timeout: Duration::from_secs(60),
            finish_timeout: Duration::from_secs(60),
            ..OrchestratorParams::default()
        };
        for name in names {
            let rms = HandlerDefinition::parse(
                "rms",
                HandlerKind::BlockRms,
                &OptionMap::new().with("updateInterval", "10"),
                ParamsVersion::CURRENT,
            )
            .unwrap();
            let definition = ProcessingDefinition::new(
                vec![Channel::Auto, Channel::FrontLeft],
                0,
                &FilterDescription::default(),
                ParamsVersion::CURRENT,
                vec![rms],
            )
            .unwrap();
            params.processings.insert((*name).to_owned(), definition);
        }
        params
    }

    fn format(sample_rate: u32) -> WaveFormat {
        WaveFormat {
            sample_rate,
            format: SampleFormat::F32,
            layout: ChannelLayout::stereo(),
        }
    }

    #[test]
    fn test_buffers_before_format_are_dropped() {
        let mut orchestrator = Orchestrator::new(params(&["main"]));
        assert!(orchestrator.process_buffer(SampleData::F32(&[0.5; 960])));
        assert_eq!(orchestrator.cycles(), 0);
        assert!(orchestrator.snapshot().lock().processings().is_empty());
    }

    #[test]
    fn test_cycle_publishes_values() {
        let mut orchestrator = Orchestrator::new(params(&["main"]));
        let snapshot = orchestrator.snapshot();
        orchestrator.set_format(format(48000));

        let mut interleaved = vec![0.0f32; 960];
        for frame in interleaved.chunks_mut(2) {
            frame[0] = 0.5;
        }
        assert!(orchestrator.process_buffer(SampleData::F32(&interleaved)));
        assert_eq!(snapshot.value("main", Channel::FrontLeft, "rms", 0), 0.5);
        assert_eq!(snapshot.value("main", Channel::Auto, "rms", 0), 0.25);

        let mut s = String::new();
        assert!(snapshot.prop("main", Channel::Auto, "rms", "block size", &mut s));
        assert_eq!(s, "480");

        assert!(orchestrator.process_silence(480));
        assert_eq!(snapshot.value("main", Channel::FrontLeft, "rms", 0), 0.0);
    }

    #[test]
    fn test_removed_processing_leaves_snapshot() {
        let mut orchestrator = Orchestrator::new(params(&["a", "b"]));
        orchestrator.set_format(format(48000));
        orchestrator.process_silence(480);
        assert_eq!(orchestrator.snapshot().lock().processings().len(), 2);

        orchestrator.set_params(params(&["b"]));
        let snapshot = orchestrator.snapshot();
        let names: Vec<String> = snapshot.lock().processings().keys().cloned().collect();
        assert_eq!(names, ["b"]);
        assert!(orchestrator.manager("a").is_none());
    }

    #[test]
    fn test_format_change_reconfigures() {
        let mut orchestrator = Orchestrator::new(params(&["main"]));
        orchestrator.set_format(format(48000));
        orchestrator.set_format(format(48000));
        let rms = &orchestrator.manager("main").unwrap().nodes(Channel::Auto)[0];
        assert_eq!(rms.configure_count(), 1);

        orchestrator.set_format(format(44100));
        let rms = &orchestrator.manager("main").unwrap().nodes(Channel::Auto)[0];
        assert_eq!(rms.configure_count(), 2);
        let mut s = String::new();
        assert!(orchestrator.snapshot().prop("main", Channel::Auto, "rms", "block size", &mut s));
        assert_eq!(s, "441");
    }

    #[test]
    fn test_zero_budget_counts_overrun() {
        let mut p = params(&["main"]);
        p.compute_timeout = Duration::ZERO;
        let mut orchestrator = Orchestrator::new(p);
        orchestrator.set_format(format(48000));
        assert!(!orchestrator.process_silence(480));
        assert_eq!(orchestrator.overruns(), 1);
        assert_eq!(orchestrator.snapshot().value("main", Channel::Auto, "rms", 0), 0.0);
    }
}
