//! Grid model: shape, cell encoding and the set of active cells.
//!
//! A cell is a (row, column) pair, where a row is one step of the pattern and
//! a column is one drum voice. Cells are stored encoded as
//! `row * row_stride + column`.

use crate::error::{Error, Result};
use std::collections::BTreeSet;

/// Encoded (row, column) pair.
pub type CellId = usize;

/// Dimensions of the step grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridShape {
    rows: usize,
    columns: usize,
    row_stride: usize,
}

impl GridShape {
    /// Create a grid shape.
    ///
    /// `row_stride` must be at least `columns` so that every encoded cell
    /// decodes back to exactly one (row, column) pair.
    pub fn new(rows: usize, columns: usize, row_stride: usize) -> Result<Self> {
        if rows == 0 || columns == 0 {
            return Err(Error::InvalidGrid(format!(
                "grid must have at least one row and one column (got {rows}x{columns})"
            )));
        }
        if row_stride < columns {
            return Err(Error::InvalidGrid(format!(
                "row stride {row_stride} is smaller than column count {columns}"
            )));
        }
        Ok(Self {
            rows,
            columns,
            row_stride,
        })
    }

    /// Create a shape whose row stride equals its column count.
    pub fn dense(rows: usize, columns: usize) -> Result<Self> {
        Self::new(rows, columns, columns)
    }

    /// Number of rows, which is also the pattern length in steps.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of voice columns.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Multiplier applied to the row when encoding a cell.
    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    /// Encode a (row, column) pair, or `None` if it lies outside the grid.
    pub fn encode(&self, row: usize, column: usize) -> Option<CellId> {
        (row < self.rows && column < self.columns).then(|| row * self.row_stride + column)
    }

    /// Decode a cell back into (row, column), or `None` if it is not a valid cell.
    pub fn decode(&self, cell: CellId) -> Option<(usize, usize)> {
        let row = cell / self.row_stride;
        let column = cell % self.row_stride;
        (row < self.rows && column < self.columns).then_some((row, column))
    }
}

/// The set of cells the user has switched on.
#[derive(Clone, Debug)]
pub struct ActiveCellSet {
    shape: GridShape,
    cells: BTreeSet<CellId>,
}

impl ActiveCellSet {
    /// Create an empty set for the given grid.
    pub fn new(shape: GridShape) -> Self {
        Self {
            shape,
            cells: BTreeSet::new(),
        }
    }

    /// The grid this set belongs to.
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    fn checked_encode(&self, row: usize, column: usize) -> Result<CellId> {
        self.shape.encode(row, column).ok_or_else(|| {
            Error::InvalidGrid(format!(
                "cell ({row}, {column}) is outside the {}x{} grid",
                self.shape.rows, self.shape.columns
            ))
        })
    }

    /// Flip a cell. Returns whether the cell is active afterwards.
    pub fn toggle(&mut self, row: usize, column: usize) -> Result<bool> {
        let cell = self.checked_encode(row, column)?;
        if self.cells.remove(&cell) {
            Ok(false)
        } else {
            self.cells.insert(cell);
            Ok(true)
        }
    }

    /// Switch a cell on. Returns `true` if it was previously off.
    pub fn insert(&mut self, row: usize, column: usize) -> Result<bool> {
        let cell = self.checked_encode(row, column)?;
        Ok(self.cells.insert(cell))
    }

    /// Switch a cell off. Returns `true` if it was previously on.
    pub fn remove(&mut self, row: usize, column: usize) -> Result<bool> {
        let cell = self.checked_encode(row, column)?;
        Ok(self.cells.remove(&cell))
    }

    /// Whether the encoded cell is active.
    pub fn contains(&self, cell: CellId) -> bool {
        self.cells.contains(&cell)
    }

    /// Whether (row, column) is active. Out-of-range coordinates are never active.
    pub fn is_active(&self, row: usize, column: usize) -> bool {
        self.shape
            .encode(row, column)
            .is_some_and(|cell| self.cells.contains(&cell))
    }

    /// Columns that sound on the given row, in ascending order.
    pub fn active_columns(&self, row: usize) -> Vec<usize> {
        (0..self.shape.columns)
            .filter(|&column| self.is_active(row, column))
            .collect()
    }

    /// Iterate over active cells as (row, column) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cells.iter().filter_map(|&cell| self.shape.decode(cell))
    }

    /// Switch every cell off.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Number of active cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no cell is active.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl PartialEq for ActiveCellSet {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.cells == other.cells
    }
}
