//! Row-major 2-D buffer with a fixed shape.
//!
//! Used for layered handler output (`rows = layers`, `columns = values`),
//! filter kernels and image lines. Reshaping reallocates only when the total
//! size grows.

/// Contiguous `rows × columns` storage.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Buffer2D<T> {
    rows: usize,
    columns: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> Buffer2D<T> {
    /// Creates a buffer filled with `T::default()`.
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            data: vec![T::default(); rows * columns],
        }
    }

    /// Changes the shape and resets every element to `value`.
    pub fn reshape(&mut self, rows: usize, columns: usize, value: T) {
        self.rows = rows;
        self.columns = columns;
        self.data.clear();
        self.data.resize(rows * columns, value);
    }

    /// Sets every element to `value`.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

impl<T> Buffer2D<T> {
    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of elements per row.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// True when the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row `index`, or `None` if out of range.
    pub fn row(&self, index: usize) -> Option<&[T]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.columns;
        Some(&self.data[start..start + self.columns])
    }

    /// Mutable row `index`, or `None` if out of range.
    pub fn row_mut(&mut self, index: usize) -> Option<&mut [T]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.columns;
        Some(&mut self.data[start..start + self.columns])
    }

    /// Iterates rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[T]> {
        // chunks_exact rejects a zero width; zero-width buffers yield nothing anyway
        let width = self.columns.max(1);
        self.data.chunks_exact(width).take(self.rows)
    }

    /// The flat backing storage.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}
