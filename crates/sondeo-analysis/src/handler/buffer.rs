//! Layered, chunked handler output.
//!
//! Every cycle a handler appends zero or more chunks per layer. All chunks of
//! all layers share one backing vector; each layer records `(offset,
//! equivalent_wave_size)` for its chunks. [`LayerBuffer::purge`] commits the
//! last chunk of each layer into the saved-data cache before clearing, so a
//! layer that produced nothing this cycle still answers with its last value.

use sondeo_core::Buffer2D;

use super::DataSize;

/// One increment of output for one layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataChunk<'a> {
    /// Number of input samples this chunk stands for.
    pub equivalent_wave_size: usize,
    /// `values_count` values.
    pub data: &'a [f32],
}

/// Chunked output of one handler.
#[derive(Debug, Clone, Default)]
pub struct LayerBuffer {
    buffer: Vec<f32>,
    chunks: Vec<Vec<(usize, usize)>>,
    last_results: Buffer2D<f32>,
    values_count: usize,
}

impl LayerBuffer {
    /// Empty buffer of shape `size`.
    pub fn new(size: &DataSize) -> Self {
        let mut buffer = Self::default();
        buffer.reshape(size);
        buffer
    }

    /// Changes the shape; all chunks and saved values are dropped.
    pub fn reshape(&mut self, size: &DataSize) {
        self.buffer.clear();
        self.values_count = size.values_count;
        self.chunks.clear();
        self.chunks.resize_with(size.layers_count, Vec::new);
        self.last_results
            .reshape(size.layers_count, size.values_count, 0.0);
    }

    /// Number of layers.
    pub fn layers_count(&self) -> usize {
        self.chunks.len()
    }

    /// Values per chunk.
    pub fn values_count(&self) -> usize {
        self.values_count
    }

    /// Appends a zeroed chunk to `layer` and returns it for writing.
    ///
    /// An out-of-range layer yields an empty slice.
    pub fn push_layer(&mut self, layer: usize, equivalent_wave_size: usize) -> &mut [f32] {
        let Some(meta) = self.chunks.get_mut(layer) else {
            return &mut [];
        };
        let offset = self.buffer.len();
        meta.push((offset, equivalent_wave_size));
        self.buffer.resize(offset + self.values_count, 0.0);
        &mut self.buffer[offset..]
    }

    /// Appends a copy of `values` (truncated or zero-padded) to `layer`.
    pub fn push_from(&mut self, layer: usize, equivalent_wave_size: usize, values: &[f32]) {
        let dest = self.push_layer(layer, equivalent_wave_size);
        let n = dest.len().min(values.len());
        dest[..n].copy_from_slice(&values[..n]);
    }

    /// Appends a copy of the layer's most recent values.
    ///
    /// Repeats the last chunk of this cycle, or the saved data when the layer
    /// has none yet. This is how skipped computation holds the previous value.
    pub fn push_copy(&mut self, layer: usize, equivalent_wave_size: usize) {
        let Some(meta) = self.chunks.get_mut(layer) else {
            return;
        };
        let offset = self.buffer.len();
        match meta.last().map(|&(o, _)| o) {
            Some(previous) => {
                self.buffer
                    .extend_from_within(previous..previous + self.values_count);
            }
            None => match self.last_results.row(layer) {
                Some(row) => self.buffer.extend_from_slice(row),
                None => self.buffer.resize(offset + self.values_count, 0.0),
            },
        }
        meta.push((offset, equivalent_wave_size));
    }

    /// Chunks produced for `layer` this cycle, oldest first.
    pub fn chunks(&self, layer: usize) -> impl Iterator<Item = DataChunk<'_>> + '_ {
        let width = self.values_count;
        self.chunks
            .get(layer)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(move |&(offset, equivalent_wave_size)| DataChunk {
                equivalent_wave_size,
                data: &self.buffer[offset..offset + width],
            })
    }

    /// Number of chunks produced for `layer` this cycle.
    pub fn chunk_count(&self, layer: usize) -> usize {
        self.chunks.get(layer).map_or(0, Vec::len)
    }

    /// Values committed by the last purge.
    pub fn saved_data(&self, layer: usize) -> &[f32] {
        self.last_results.row(layer).unwrap_or(&[])
    }

    /// The newest values: last chunk of this cycle, else the saved data.
    pub fn last_data(&self, layer: usize) -> &[f32] {
        match self.chunks.get(layer).and_then(|c| c.last()) {
            Some(&(offset, _)) => &self.buffer[offset..offset + self.values_count],
            None => self.saved_data(layer),
        }
    }

    /// Commits each layer's last chunk to the saved data and clears chunks.
    pub fn purge(&mut self) {
        for (layer, meta) in self.chunks.iter_mut().enumerate() {
            if let Some(&(offset, _)) = meta.last() {
                if let Some(row) = self.last_results.row_mut(layer) {
                    row.copy_from_slice(&self.buffer[offset..offset + self.values_count]);
                }
            }
            meta.clear();
        }
        self.buffer.clear();
    }

    /// Drops chunks and zeroes the saved data, keeping the shape.
    pub fn clear(&mut self) {
        for meta in &mut self.chunks {
            meta.clear();
        }
        self.buffer.clear();
        self.last_results.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_three() -> LayerBuffer {
        LayerBuffer::new(&DataSize::new(3, vec![4, 8]))
    }

    #[test]
    fn test_push_and_read_chunks() {
        let mut buffer = two_by_three();
        buffer.push_layer(0, 4).copy_from_slice(&[1.0, 2.0, 3.0]);
        buffer.push_layer(1, 8)[1] = 5.0;
        buffer.push_from(0, 4, &[7.0]);

        let chunks: Vec<_> = buffer.chunks(0).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].data, &[1.0, 2.0, 3.0]);
        assert_eq!(chunks[1].data, &[7.0, 0.0, 0.0]);
        assert_eq!(buffer.last_data(1), &[0.0, 5.0, 0.0]);
        assert_eq!(buffer.chunk_count(2), 0);
        assert!(buffer.push_layer(2, 1).is_empty());
    }

    #[test]
    fn test_purge_commits_last_chunk() {
        let mut buffer = two_by_three();
        buffer.push_from(0, 4, &[1.0, 1.0, 1.0]);
        buffer.push_from(0, 4, &[2.0, 2.0, 2.0]);
        buffer.purge();

        assert_eq!(buffer.chunk_count(0), 0);
        assert_eq!(buffer.saved_data(0), &[2.0, 2.0, 2.0]);
        assert_eq!(buffer.last_data(0), &[2.0, 2.0, 2.0]);
        assert_eq!(buffer.saved_data(1), &[0.0, 0.0, 0.0]);

        // a layer without new chunks keeps its saved values across purges
        buffer.purge();
        assert_eq!(buffer.saved_data(0), &[2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_push_copy_holds_previous_value() {
        let mut buffer = two_by_three();
        buffer.push_from(0, 4, &[3.0, 2.0, 1.0]);
        buffer.purge();

        buffer.push_copy(0, 4);
        assert_eq!(buffer.last_data(0), &[3.0, 2.0, 1.0]);
        buffer.push_from(0, 4, &[9.0, 9.0, 9.0]);
        buffer.push_copy(0, 4);
        let chunks: Vec<_> = buffer.chunks(0).map(|c| c.data.to_vec()).collect();
        assert_eq!(chunks[2], vec![9.0, 9.0, 9.0]);
    }

    #[test]
    fn test_reshape_resets() {
        let mut buffer = two_by_three();
        buffer.push_from(0, 4, &[1.0, 1.0, 1.0]);
        buffer.purge();
        buffer.reshape(&DataSize::new(2, vec![16]));
        assert_eq!(buffer.layers_count(), 1);
        assert_eq!(buffer.saved_data(0), &[0.0, 0.0]);
    }
}
