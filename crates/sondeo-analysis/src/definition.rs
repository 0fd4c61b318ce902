//! Typed description of a processing: channels, pre-filter, downsampling and
//! the handler graph in process order.
//!
//! Handlers may be declared in any order. [`ProcessingDefinition::new`] sorts
//! them so every handler comes after its source (Kahn's algorithm, ties
//! broken by declaration order) and rejects duplicate names, unknown sources
//! and cycles.

use std::collections::{BTreeSet, HashMap};

use sondeo_core::{FilterDescription, FilterStage};

use crate::channel::Channel;
use crate::error::PipelineError;
use crate::handler::{HandlerKind, Params};
use crate::options::OptionMap;
use crate::version::ParamsVersion;

/// One handler of a processing, with parsed params.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerDefinition {
    /// Name, unique within the processing.
    pub name: String,
    /// Handler kind.
    pub kind: HandlerKind,
    /// Typed params.
    pub params: Params,
    /// Source handler name.
    pub source: Option<String>,
}

impl HandlerDefinition {
    /// Parses raw options for `kind`.
    pub fn parse(
        name: impl Into<String>,
        kind: HandlerKind,
        options: &OptionMap,
        version: ParamsVersion,
    ) -> Result<Self, PipelineError> {
        let name = name.into();
        let parsed = kind
            .parse_params(options, version)
            .map_err(|error| PipelineError::Parse {
                handler: name.clone(),
                error,
            })?;
        Ok(Self {
            source: parsed.source().map(str::to_owned),
            params: parsed.params,
            kind,
            name,
        })
    }
}

/// A processing: which channels to analyse and how.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingDefinition {
    channels: Vec<Channel>,
    target_rate: u32,
    filter: Vec<FilterStage>,
    version: ParamsVersion,
    handlers: Vec<HandlerDefinition>,
}

impl ProcessingDefinition {
    /// Resolves the filter and sorts `handlers` into process order.
    pub fn new(
        channels: Vec<Channel>,
        target_rate: u32,
        filter: &FilterDescription,
        version: ParamsVersion,
        handlers: Vec<HandlerDefinition>,
    ) -> Result<Self, PipelineError> {
        let mut unique = Vec::with_capacity(channels.len());
        for channel in channels {
            if !unique.contains(&channel) {
                unique.push(channel);
            }
        }

        Ok(Self {
            channels: unique,
            target_rate,
            filter: filter.stages()?,
            version,
            handlers: sort_handlers(handlers)?,
        })
    }

    /// Requested channels, without duplicates.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Target sample rate; 0 disables downsampling.
    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Resolved pre-filter stages.
    pub fn filter(&self) -> &[FilterStage] {
        &self.filter
    }

    /// Parameter protocol version.
    pub fn version(&self) -> ParamsVersion {
        self.version
    }

    /// Handlers in process order.
    pub fn handlers(&self) -> &[HandlerDefinition] {
        &self.handlers
    }

    /// Handler names in process order.
    pub fn order(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|h| h.name.as_str())
    }
}

/// Orders handlers so that sources come first.
fn sort_handlers(
    handlers: Vec<HandlerDefinition>,
) -> Result<Vec<HandlerDefinition>, PipelineError> {
    let mut index = HashMap::with_capacity(handlers.len());
    for (i, handler) in handlers.iter().enumerate() {
        if index.insert(handler.name.as_str(), i).is_some() {
            return Err(PipelineError::DuplicateHandler(handler.name.clone()));
        }
    }

    let mut dependents = vec![Vec::new(); handlers.len()];
    let mut pending = vec![0usize; handlers.len()];
    for (i, handler) in handlers.iter().enumerate() {
        let Some(source) = &handler.source else {
            continue;
        };
        let Some(&s) = index.get(source.as_str()) else {
            return Err(PipelineError::UnknownSource {
                handler: handler.name.clone(),
                source_name: source.clone(),
            });
        };
        dependents[s].push(i);
        pending[i] += 1;
    }

    let mut ready: BTreeSet<usize> = (0..handlers.len()).filter(|&i| pending[i] == 0).collect();
    let mut order = Vec::with_capacity(handlers.len());
    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &d in &dependents[i] {
            pending[d] -= 1;
            if pending[d] == 0 {
                ready.insert(d);
            }
        }
    }

    if order.len() != handlers.len() {
        let stuck = (0..handlers.len())
            .find(|&i| pending[i] > 0)
            .map(|i| handlers[i].name.clone())
            .unwrap_or_default();
        return Err(PipelineError::Cycle(stuck));
    }

    let mut slots: Vec<Option<HandlerDefinition>> = handlers.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}
