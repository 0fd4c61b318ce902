//! Graph node: a handler plus its link state and output.
//!
//! Nodes live in a per-channel arena in process order, so a node's source
//! always has a smaller index. [`HandlerNode::patch`] decides whether the
//! handler has to be reconfigured by comparing the new [`Configuration`] and
//! params with the previous ones and by checking whether the source itself
//! was reconfigured in the same generation. The last check makes upstream
//! changes propagate down the chain.

use std::time::Instant;

use crate::channel::Channel;
use crate::error::ConfigureError;
use crate::version::ParamsVersion;

use super::{
    ConfigureContext, DataSize, Handler, HandlerInfo, HandlerKind, LayerBuffer, Params,
    ProcessContext, SourceView,
};

/// Resolves a source name to an already patched node.
pub trait HandlerFinder {
    /// Arena index and node named `name`.
    fn find(&self, name: &str) -> Option<(usize, &HandlerNode)>;
}

impl HandlerFinder for [HandlerNode] {
    fn find(&self, name: &str) -> Option<(usize, &HandlerNode)> {
        self.iter().enumerate().find(|(_, n)| n.name == name)
    }
}

/// Everything besides params that a handler configuration depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Configuration {
    /// Arena index of the source.
    pub source: Option<usize>,
    /// Effective sample rate.
    pub sample_rate: u32,
    /// Channel of the graph.
    pub channel: Channel,
    /// Parameter protocol version.
    pub version: ParamsVersion,
}

/// Link state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    /// Never configured.
    Unconfigured,
    /// Configured and processing.
    Configured,
    /// Configuration failed; output is empty until params change.
    Invalid,
}

/// One handler in a channel graph.
#[derive(Debug)]
pub struct HandlerNode {
    name: String,
    kind: HandlerKind,
    handler: Box<dyn Handler>,
    params: Option<Params>,
    config: Option<Configuration>,
    state: HandlerState,
    output: LayerBuffer,
    data_size: DataSize,
    source: Option<usize>,
    resampler: Option<usize>,
    changed_at: u64,
    configure_count: u64,
    finished_cycle: Option<u64>,
}

impl HandlerNode {
    /// New unconfigured node.
    pub fn new(name: impl Into<String>, kind: HandlerKind) -> Self {
        Self {
            name: name.into(),
            kind,
            handler: kind.create(),
            params: None,
            config: None,
            state: HandlerState::Unconfigured,
            output: LayerBuffer::default(),
            data_size: DataSize::default(),
            source: None,
            resampler: None,
            changed_at: 0,
            configure_count: 0,
            finished_cycle: None,
        }
    }

    /// Node name, unique within the graph.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handler kind.
    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    /// Current link state.
    pub fn state(&self) -> HandlerState {
        self.state
    }

    /// Output shape; empty unless configured.
    pub fn data_size(&self) -> &DataSize {
        &self.data_size
    }

    /// Output buffer.
    pub fn output(&self) -> &LayerBuffer {
        &self.output
    }

    /// The handler.
    pub fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }

    /// Generation of the last (re)configuration attempt.
    pub fn changed_at(&self) -> u64 {
        self.changed_at
    }

    /// How many times `configure` has run.
    pub fn configure_count(&self) -> u64 {
        self.configure_count
    }

    /// Arena index of the source.
    pub fn source_index(&self) -> Option<usize> {
        self.source
    }

    /// Links the node for `generation`.
    ///
    /// `earlier` holds the nodes before this one in process order. Returns
    /// true if the node ends up configured.
    #[allow(clippy::too_many_arguments)]
    pub fn patch(
        &mut self,
        params: &Params,
        source_name: Option<&str>,
        earlier: &[HandlerNode],
        sample_rate: u32,
        channel: Channel,
        version: ParamsVersion,
        generation: u64,
    ) -> bool {
        let source = match source_name {
            None => None,
            Some(name) => match earlier.find(name) {
                None => {
                    return self
                        .invalidate(ConfigureError::SourceNotFound(name.to_owned()), generation);
                }
                Some((_, node)) if node.data_size.is_empty() => {
                    return self
                        .invalidate(ConfigureError::EmptySource(name.to_owned()), generation);
                }
                Some(found) => Some(found),
            },
        };

        let config = Configuration {
            source: source.map(|(idx, _)| idx),
            sample_rate,
            channel,
            version,
        };
        let source_changed = source.is_some_and(|(_, node)| node.changed_at == generation);
        if self.state != HandlerState::Unconfigured
            && self.config == Some(config)
            && self.params.as_ref() == Some(params)
            && !source_changed
        {
            if self.state == HandlerState::Configured {
                self.handler.retune(params);
            }
            self.params = Some(params.clone());
            return self.state == HandlerState::Configured;
        }

        self.changed_at = generation;
        self.configure_count += 1;
        self.params = Some(params.clone());
        self.config = Some(config);

        let resampler = source.and_then(|(idx, node)| {
            if node.handler.band_resampler().is_some() {
                Some(idx)
            } else if node.handler.forwards_resampler() {
                node.resampler
            } else {
                None
            }
        });
        let ctx = ConfigureContext {
            source: source.map(|(_, node)| SourceView::new(node)),
            resampler: resampler
                .and_then(|idx| earlier.get(idx))
                .and_then(|node| node.handler.band_resampler()),
            sample_rate,
            channel,
            version,
            name: &self.name,
        };

        match self.handler.configure(params, &ctx) {
            Ok(size) => {
                tracing::debug!(
                    handler = %self.name,
                    kind = %self.kind,
                    layers = size.layers_count,
                    values = size.values_count,
                    "handler configured"
                );
                self.output.reshape(&size);
                self.data_size = size;
                self.source = config.source;
                self.resampler = resampler;
                self.state = HandlerState::Configured;
                true
            }
            Err(error) => {
                tracing::error!(
                    handler = %self.name,
                    kind = %self.kind,
                    %error,
                    "handler configuration failed"
                );
                self.mark_invalid();
                false
            }
        }
    }

    fn invalidate(&mut self, error: ConfigureError, generation: u64) -> bool {
        tracing::error!(
            handler = %self.name,
            kind = %self.kind,
            %error,
            "handler configuration failed"
        );
        if self.state != HandlerState::Invalid {
            self.changed_at = generation;
        }
        self.params = None;
        self.config = None;
        self.mark_invalid();
        false
    }

    fn mark_invalid(&mut self) {
        self.state = HandlerState::Invalid;
        self.data_size = DataSize::default();
        self.output.reshape(&self.data_size);
        self.source = None;
        self.resampler = None;
    }

    /// Commits last cycle's output to the saved data.
    pub fn purge(&mut self) {
        self.output.purge();
    }

    /// Runs the handler for this cycle. Unconfigured nodes do nothing.
    pub fn process(&mut self, wave: &[f32], earlier: &[HandlerNode], kill_time: Instant) {
        if self.state != HandlerState::Configured {
            return;
        }
        let ctx = ProcessContext {
            wave,
            source: self
                .source
                .and_then(|idx| earlier.get(idx))
                .map(SourceView::new),
            resampler: self
                .resampler
                .and_then(|idx| earlier.get(idx))
                .and_then(|node| node.handler.band_resampler()),
            kill_time,
        };
        self.handler.process(&ctx, &mut self.output);
    }

    /// Finishes the handler once per `cycle`.
    pub fn finish(&mut self, cycle: u64) {
        if self.finished_cycle == Some(cycle) {
            return;
        }
        self.finished_cycle = Some(cycle);
        if self.state == HandlerState::Configured {
            self.handler.finish();
        }
    }

    /// Writes the handler's introspection data.
    pub fn update_info(&self, info: &mut HandlerInfo) {
        if self.state == HandlerState::Configured {
            self.handler.update_info(info);
        } else {
            *info = HandlerInfo::None;
        }
    }

    /// Drops signal state and output, keeping the configuration.
    pub fn reset(&mut self) {
        self.handler.reset();
        self.output.clear();
    }

    /// Moves the handler into a node for a new graph, keeping its state.
    pub(crate) fn take_over(mut self, name: &str, kind: HandlerKind) -> Self {
        if self.kind != kind {
            return Self::new(name, kind);
        }
        self.name = name.to_owned();
        self
    }
}
