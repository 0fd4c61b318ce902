//! Published results of a compute cycle.
//!
//! The orchestrator stages a [`Snapshot`] privately and copies it into the
//! [`SharedSnapshot`] under one lock at the end of each cycle, so readers
//! always see a complete cycle.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use sondeo_core::Buffer2D;

use crate::channel::Channel;
use crate::handler::{HandlerInfo, HandlerNode};

/// Values and introspection data of one handler.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HandlerSnapshot {
    /// Newest values, one row per layer.
    pub values: Buffer2D<f32>,
    /// Handler-specific data.
    pub info: HandlerInfo,
}

impl HandlerSnapshot {
    /// Copies the node's newest values and info.
    pub fn update(&mut self, node: &HandlerNode) {
        let size = node.data_size();
        if self.values.rows() != size.layers_count || self.values.columns() != size.values_count {
            self.values.reshape(size.layers_count, size.values_count, 0.0);
        }
        for layer in 0..size.layers_count {
            let data = node.output().last_data(layer);
            if let Some(row) = self.values.row_mut(layer) {
                let n = row.len().min(data.len());
                row[..n].copy_from_slice(&data[..n]);
            }
        }
        node.update_info(&mut self.info);
    }

    /// Value `index` of layer 0, `0.0` when out of range.
    pub fn value(&self, index: usize) -> f64 {
        self.values
            .row(0)
            .and_then(|row| row.get(index))
            .map_or(0.0, |&v| f64::from(v))
    }
}

/// Handlers of one channel by name.
pub type ChannelSnapshot = BTreeMap<String, HandlerSnapshot>;

/// Channels of one processing.
pub type ProcessingSnapshot = BTreeMap<Channel, ChannelSnapshot>;

/// `processing → channel → handler` results.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    processings: BTreeMap<String, ProcessingSnapshot>,
}

impl Snapshot {
    /// Empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry of one handler.
    pub fn handler(
        &self,
        processing: &str,
        channel: Channel,
        handler: &str,
    ) -> Option<&HandlerSnapshot> {
        self.processings
            .get(processing)?
            .get(&channel)?
            .get(handler)
    }

    /// Value `index` of layer 0 of a handler.
    ///
    /// Absent keys, handlers without layers and out of range indices read `0.0`.
    pub fn value(&self, processing: &str, channel: Channel, handler: &str, index: usize) -> f64 {
        self.handler(processing, channel, handler)
            .map_or(0.0, |h| h.value(index))
    }

    /// Writes a handler property; false if any key or the property is unknown.
    pub fn prop(
        &self,
        processing: &str,
        channel: Channel,
        handler: &str,
        name: &str,
        out: &mut dyn fmt::Write,
    ) -> bool {
        self.handler(processing, channel, handler)
            .is_some_and(|h| h.info.prop(name, out))
    }

    /// Processing entries by name.
    pub fn processings(&self) -> &BTreeMap<String, ProcessingSnapshot> {
        &self.processings
    }

    /// Mutable entry of a processing, created on demand.
    pub fn processing_mut(&mut self, name: &str) -> &mut ProcessingSnapshot {
        self.processings.entry(name.to_owned()).or_default()
    }

    /// Drops processings not accepted by `keep`.
    pub fn retain_processings(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.processings.retain(|name, _| keep(name));
    }
}

/// Lock-guarded snapshot shared between the compute thread and readers.
#[derive(Debug, Clone, Default)]
pub struct SharedSnapshot {
    inner: Arc<Mutex<Snapshot>>,
}

impl SharedSnapshot {
    /// Empty shared snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the published snapshot with `staged`.
    pub fn publish(&self, staged: &Snapshot) {
        self.inner.lock().clone_from(staged);
    }

    /// Locks for reading several values from the same cycle.
    pub fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.inner.lock()
    }

    /// See [`Snapshot::value`].
    pub fn value(&self, processing: &str, channel: Channel, handler: &str, index: usize) -> f64 {
        self.inner.lock().value(processing, channel, handler, index)
    }

    /// See [`Snapshot::prop`].
    pub fn prop(
        &self,
        processing: &str,
        channel: Channel,
        handler: &str,
        name: &str,
        out: &mut dyn fmt::Write,
    ) -> bool {
        self.inner.lock().prop(processing, channel, handler, name, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        let mut snapshot = Snapshot::new();
        let mut entry = HandlerSnapshot::default();
        entry.values.reshape(2, 3, 0.0);
        entry.values.row_mut(0).unwrap().copy_from_slice(&[0.25, 0.5, 0.75]);
        entry.info = HandlerInfo::Block {
            block_size: 480,
            attack: 0.0,
            decay: 0.0,
        };
        snapshot
            .processing_mut("main")
            .entry(Channel::Auto)
            .or_default()
            .insert("rms".into(), entry);
        snapshot
    }

    #[test]
    fn test_value_lookup() {
        let snapshot = sample();
        assert_eq!(snapshot.value("main", Channel::Auto, "rms", 1), 0.5);
        assert_eq!(snapshot.value("main", Channel::Auto, "rms", 3), 0.0);
        assert_eq!(snapshot.value("main", Channel::FrontLeft, "rms", 0), 0.0);
        assert_eq!(snapshot.value("other", Channel::Auto, "rms", 0), 0.0);
        assert_eq!(snapshot.value("main", Channel::Auto, "nope", 0), 0.0);
        assert_eq!(HandlerSnapshot::default().value(0), 0.0);
    }

    #[test]
    fn test_prop_lookup() {
        let snapshot = sample();
        let mut s = String::new();
        assert!(snapshot.prop("main", Channel::Auto, "rms", "block size", &mut s));
        assert_eq!(s, "480");
        assert!(!snapshot.prop("main", Channel::Auto, "rms", "bogus", &mut String::new()));
        assert!(!snapshot.prop("x", Channel::Auto, "rms", "block size", &mut String::new()));
    }

    #[test]
    fn test_shared_publish() {
        let shared = SharedSnapshot::new();
        let reader = shared.clone();
        assert_eq!(reader.value("main", Channel::Auto, "rms", 0), 0.0);
        shared.publish(&sample());
        assert_eq!(reader.value("main", Channel::Auto, "rms", 2), 0.75);

        let mut staged = sample();
        staged.retain_processings(|_| false);
        shared.publish(&staged);
        assert!(reader.lock().processings().is_empty());
    }
}
