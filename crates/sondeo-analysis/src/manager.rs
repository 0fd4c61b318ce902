//! One processing: a handler graph per channel, fed through a downsampler
//! and a pre-filter running at the downsampled rate.
//!
//! [`ProcessingManager::set_params`] bumps a generation counter and patches
//! every node against it. Nodes that keep their name and kind are reused, so
//! a handler is only reconfigured when its own params, its configuration or
//! its source changed in this generation.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use sondeo_core::{DownsampleHelper, FilterCascade, compute_divider};

use crate::channel::{Channel, ChannelLayout};
use crate::definition::ProcessingDefinition;
use crate::handler::HandlerNode;
use crate::mixer::ChannelMixer;
use crate::snapshot::{HandlerSnapshot, ProcessingSnapshot};

/// Graph and signal path of one channel.
#[derive(Debug)]
struct ChannelGraph {
    nodes: Vec<HandlerNode>,
    filter: FilterCascade,
    downsampler: DownsampleHelper,
    wave: Vec<f32>,
}

impl ChannelGraph {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            filter: FilterCascade::default(),
            downsampler: DownsampleHelper::default(),
            wave: Vec::new(),
        }
    }

    /// Runs every node in order; false if the deadline cut the cycle short.
    fn process(&mut self, input: &[f32], kill_time: Instant) -> bool {
        // the filter is built for the downsampled rate
        let downsampled = self.downsampler.process(input);
        self.wave.clear();
        self.wave.extend_from_slice(downsampled);
        self.filter.apply(&mut self.wave);
        let wave = &self.wave;

        for node in &mut self.nodes {
            node.purge();
        }
        for i in 0..self.nodes.len() {
            if Instant::now() >= kill_time {
                return false;
            }
            let (earlier, rest) = self.nodes.split_at_mut(i);
            rest[0].process(wave, earlier, kill_time);
        }
        true
    }
}

/// Handler graphs of one processing, one per channel.
#[derive(Debug)]
pub struct ProcessingManager {
    name: String,
    definition: Option<ProcessingDefinition>,
    sample_rate: u32,
    graphs: BTreeMap<Channel, ChannelGraph>,
    generation: u64,
    cycle: u64,
}

impl ProcessingManager {
    /// Empty manager.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: None,
            sample_rate: 0,
            graphs: BTreeMap::new(),
            generation: 0,
            cycle: 0,
        }
    }

    /// Processing name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sample rate the handlers see, after downsampling.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Definition applied by the last [`set_params`](Self::set_params).
    pub fn definition(&self) -> Option<&ProcessingDefinition> {
        self.definition.as_ref()
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Channels with a graph.
    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.graphs.keys().copied()
    }

    /// Nodes of `channel` in process order.
    pub fn nodes(&self, channel: Channel) -> &[HandlerNode] {
        self.graphs.get(&channel).map_or(&[], |g| g.nodes.as_slice())
    }

    /// Applies a definition for a stream of `layout` at `source_rate`.
    ///
    /// Channels the layout lacks are skipped. Returns the number of handler
    /// nodes that ended up invalid.
    pub fn set_params(
        &mut self,
        definition: ProcessingDefinition,
        layout: &ChannelLayout,
        source_rate: u32,
    ) -> usize {
        self.generation += 1;
        let generation = self.generation;
        let divider = compute_divider(source_rate, definition.target_rate());
        self.sample_rate = source_rate / divider as u32;

        let mut old = std::mem::take(&mut self.graphs);
        let mut invalid = 0;
        for &channel in definition.channels() {
            if !layout.contains(channel) {
                tracing::debug!(
                    processing = %self.name,
                    %channel,
                    layout = layout.name(),
                    "channel not in layout, skipped"
                );
                continue;
            }
            let mut graph = old.remove(&channel).unwrap_or_else(ChannelGraph::new);

            if !graph.filter.matches(definition.filter(), self.sample_rate) {
                graph.filter = FilterCascade::new(definition.filter(), self.sample_rate);
            }
            if graph.downsampler.divider() != divider {
                graph.downsampler.set_divider(divider);
            }

            let mut previous: HashMap<String, HandlerNode> = graph
                .nodes
                .drain(..)
                .map(|node| (node.name().to_owned(), node))
                .collect();
            for def in definition.handlers() {
                let mut node = match previous.remove(&def.name) {
                    Some(node) => node.take_over(&def.name, def.kind),
                    None => HandlerNode::new(def.name.clone(), def.kind),
                };
                let ok = node.patch(
                    &def.params,
                    def.source.as_deref(),
                    &graph.nodes,
                    self.sample_rate,
                    channel,
                    definition.version(),
                    generation,
                );
                if !ok {
                    invalid += 1;
                }
                graph.nodes.push(node);
            }
            self.graphs.insert(channel, graph);
        }

        tracing::debug!(
            processing = %self.name,
            generation,
            sample_rate = self.sample_rate,
            channels = self.graphs.len(),
            invalid,
            "processing configured"
        );
        self.definition = Some(definition);
        invalid
    }

    /// Runs one cycle on the mixer's current waves.
    ///
    /// Returns false if the deadline passed before every node ran; nodes
    /// that did not run keep their previous values.
    pub fn process(&mut self, mixer: &ChannelMixer, kill_time: Instant) -> bool {
        self.cycle += 1;
        let mut completed = true;
        for (&channel, graph) in &mut self.graphs {
            let Some(input) = mixer.channel_data(channel) else {
                continue;
            };
            if !graph.process(input, kill_time) && completed {
                tracing::debug!(
                    processing = %self.name,
                    %channel,
                    cycle = self.cycle,
                    "compute deadline passed, holding previous values"
                );
                completed = false;
            }
        }
        completed
    }

    /// Lets every node complete pending work for the current cycle.
    pub fn finish(&mut self, kill_time: Instant) -> bool {
        for graph in self.graphs.values_mut() {
            for node in &mut graph.nodes {
                if Instant::now() >= kill_time {
                    tracing::debug!(processing = %self.name, "finish deadline passed");
                    return false;
                }
                node.finish(self.cycle);
            }
        }
        true
    }

    /// Copies newest values into `snapshot`, dropping stale entries.
    pub fn update_snapshot(&self, snapshot: &mut ProcessingSnapshot) {
        snapshot.retain(|channel, _| self.graphs.contains_key(channel));
        for (&channel, graph) in &self.graphs {
            let handlers = snapshot.entry(channel).or_default();
            handlers.retain(|name, _| graph.nodes.iter().any(|n| n.name() == name));
            for node in &graph.nodes {
                handlers
                    .entry(node.name().to_owned())
                    .or_insert_with(HandlerSnapshot::default)
                    .update(node);
            }
        }
    }

    /// Drops signal state of every node and filter.
    pub fn reset(&mut self) {
        for graph in self.graphs.values_mut() {
            graph.filter.reset();
            graph.downsampler.reset();
            for node in &mut graph.nodes {
                node.reset();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::HandlerDefinition;
    use crate::handler::{HandlerKind, HandlerState};
    use crate::mixer::{SampleData, SampleFormat, WaveFormat};
    use crate::options::OptionMap;
    use crate::version::ParamsVersion;
    use sondeo_core::FilterDescription;
    use std::time::Duration;

    fn definition(
        channels: Vec<Channel>,
        target_rate: u32,
        rms_interval: &str,
    ) -> ProcessingDefinition {
        let rms = HandlerDefinition::parse(
            "rms",
            HandlerKind::BlockRms,
            &OptionMap::new().with("updateInterval", rms_interval),
            ParamsVersion::CURRENT,
        )
        .unwrap();
        let db = HandlerDefinition::parse(
            "db",
            HandlerKind::SingleValueTransformer,
            &OptionMap::new().with("source", "rms").with("transform", "db"),
            ParamsVersion::CURRENT,
        )
        .unwrap();
        ProcessingDefinition::new(
            channels,
            target_rate,
            &FilterDescription::default(),
            ParamsVersion::CURRENT,
            vec![db, rms],
        )
        .unwrap()
    }

    fn stereo_mixer(frames: usize, value: f32) -> ChannelMixer {
        let mut mixer = ChannelMixer::new();
        mixer.set_format(&WaveFormat {
            sample_rate: 48000,
            format: SampleFormat::F32,
            layout: ChannelLayout::stereo(),
        });
        mixer.decompose(SampleData::F32(&vec![value; frames * 2]));
        mixer
    }

    fn later() -> Instant {
        Instant::now() + Duration::from_secs(3600)
    }

    #[test]
    fn test_missing_channels_are_skipped() {
        let mut manager = ProcessingManager::new("main");
        let def = definition(vec![Channel::Center, Channel::FrontLeft, Channel::Auto], 0, "10");
        manager.set_params(def, &ChannelLayout::stereo(), 48000);
        let channels: Vec<Channel> = manager.channels().collect();
        assert_eq!(channels, [Channel::FrontLeft, Channel::Auto]);
        let order: Vec<&str> = manager.nodes(Channel::Auto).iter().map(|n| n.name()).collect();
        assert_eq!(order, ["rms", "db"]);
    }

    #[test]
    fn test_downsampling_sets_handler_rate() {
        let mut manager = ProcessingManager::new("main");
        let def = definition(vec![Channel::Auto], 22050, "10");
        manager.set_params(def, &ChannelLayout::stereo(), 48000);
        assert_eq!(manager.sample_rate(), 24000);

        // two blocks of 10 ms at 24 kHz
        let mixer = stereo_mixer(960, 0.5);
        assert!(manager.process(&mixer, later()));
        let rms = &manager.nodes(Channel::Auto)[0];
        assert_eq!(rms.output().chunk_count(0), 2);
    }

    #[test]
    fn test_unchanged_params_keep_configuration() {
        let mut manager = ProcessingManager::new("main");
        let layout = ChannelLayout::stereo();
        manager.set_params(definition(vec![Channel::Auto], 0, "10"), &layout, 48000);
        manager.set_params(definition(vec![Channel::Auto], 0, "10"), &layout, 48000);
        for node in manager.nodes(Channel::Auto) {
            assert_eq!(node.configure_count(), 1);
        }

        manager.set_params(definition(vec![Channel::Auto], 0, "20"), &layout, 48000);
        for node in manager.nodes(Channel::Auto) {
            assert_eq!(node.configure_count(), 2, "{} reconfigures", node.name());
        }
    }

    #[test]
    fn test_snapshot_follows_graph() {
        let mut manager = ProcessingManager::new("main");
        let layout = ChannelLayout::stereo();
        manager.set_params(definition(vec![Channel::Auto], 0, "10"), &layout, 48000);
        assert!(manager.process(&stereo_mixer(480, 0.5), later()));
        assert!(manager.finish(later()));

        let mut snapshot = ProcessingSnapshot::new();
        manager.update_snapshot(&mut snapshot);
        let rms = &snapshot[&Channel::Auto]["rms"];
        assert!((rms.value(0) - 0.5).abs() < 1e-6);
        assert_eq!(manager.nodes(Channel::Auto)[1].state(), HandlerState::Configured);

        manager.set_params(definition(vec![Channel::FrontLeft], 0, "10"), &layout, 48000);
        manager.update_snapshot(&mut snapshot);
        assert!(!snapshot.contains_key(&Channel::Auto));
        assert!(snapshot.contains_key(&Channel::FrontLeft));
    }

    #[test]
    fn test_past_deadline_holds_values() {
        let mut manager = ProcessingManager::new("main");
        let def = definition(vec![Channel::Auto], 0, "10");
        manager.set_params(def, &ChannelLayout::stereo(), 48000);
        assert!(manager.process(&stereo_mixer(480, 0.5), later()));

        let past = Instant::now();
        assert!(!manager.process(&stereo_mixer(480, 0.0), past));
        let rms = &manager.nodes(Channel::Auto)[0];
        assert_eq!(rms.output().chunk_count(0), 0);
        assert!((rms.output().last_data(0)[0] - 0.5).abs() < 1e-6);
    }
}
