//! Shared grid state.
//!
//! [`GridState`] provides synchronized access to the [`ActiveCellSet`]. The UI
//! side writes to it when cells are toggled; the scheduler only ever reads
//! it, one row at a time.

use std::sync::{Arc, PoisonError, RwLock};

use crate::error::Result;
use crate::grid::{ActiveCellSet, GridShape};

#[derive(Debug)]
struct Inner {
    cells: ActiveCellSet,
    version: u64,
}

/// Thread-safe handle to the active cells.
///
/// Clones share the same underlying set.
#[derive(Clone)]
pub struct GridState {
    inner: Arc<RwLock<Inner>>,
}

impl GridState {
    /// Create an empty grid.
    pub fn new(shape: GridShape) -> Self {
        Self::with_cells(ActiveCellSet::new(shape))
    }

    /// Create a grid state from an existing set.
    pub fn with_cells(cells: ActiveCellSet) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner { cells, version: 0 })),
        }
    }

    /// Read the cells with a closure.
    ///
    /// This acquires a read lock for the duration of the closure.
    pub fn with_cells_read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ActiveCellSet) -> R,
    {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&inner.cells)
    }

    /// Modify the cells with a closure, bumping the version.
    pub fn with_cells_write<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut ActiveCellSet) -> R,
    {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.version += 1;
        f(&mut inner.cells)
    }

    /// Modify the cells with a fallible closure.
    ///
    /// The version is bumped only if the closure succeeds.
    pub fn try_with_cells_write<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut ActiveCellSet) -> Result<R>,
    {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let value = f(&mut inner.cells)?;
        inner.version += 1;
        Ok(value)
    }

    /// The grid dimensions.
    pub fn shape(&self) -> GridShape {
        self.with_cells_read(|cells| cells.shape())
    }

    /// Flip a cell. Returns whether it is active afterwards.
    pub fn toggle(&self, row: usize, column: usize) -> Result<bool> {
        self.try_with_cells_write(|cells| cells.toggle(row, column))
    }

    /// Whether (row, column) is active.
    pub fn is_active(&self, row: usize, column: usize) -> bool {
        self.with_cells_read(|cells| cells.is_active(row, column))
    }

    /// Columns that sound on `row`.
    pub fn active_columns(&self, row: usize) -> Vec<usize> {
        self.with_cells_read(|cells| cells.active_columns(row))
    }

    /// Switch every cell off.
    pub fn clear(&self) {
        self.with_cells_write(|cells| cells.clear());
    }

    /// Get a clone of the current set.
    pub fn snapshot(&self) -> ActiveCellSet {
        self.with_cells_read(|cells| cells.clone())
    }

    /// Number of successful writes so far.
    pub fn version(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .version
    }
}

impl std::fmt::Debug for GridState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridState")
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> GridShape {
        GridShape::new(16, 8, 16).unwrap()
    }

    #[test]
    fn test_grid_state_toggle() {
        let state = GridState::new(shape());
        assert!(state.toggle(0, 2).unwrap());
        assert!(state.is_active(0, 2));
        assert_eq!(state.active_columns(0), vec![2]);
        assert_eq!(state.version(), 1);
    }

    #[test]
    fn test_grid_state_clone_shares_cells() {
        let ui = GridState::new(shape());
        let scheduler_view = ui.clone();
        ui.toggle(3, 1).unwrap();
        assert!(scheduler_view.is_active(3, 1));
        ui.clear();
        assert!(scheduler_view.snapshot().is_empty());
    }

    #[test]
    fn test_rejected_toggle_leaves_cells_untouched() {
        let state = GridState::new(shape());
        assert!(state.toggle(40, 0).is_err());
        assert!(state.snapshot().is_empty());
    }

    #[test]
    fn test_version_counts_only_successful_writes() {
        let state = GridState::new(shape());
        assert!(state.toggle(0, 8).is_err());
        assert!(state.try_with_cells_write(|cells| cells.insert(16, 0)).is_err());
        assert_eq!(state.version(), 0);

        state.toggle(1, 1).unwrap();
        assert!(state.try_with_cells_write(|cells| cells.insert(2, 3)).unwrap());
        assert_eq!(state.version(), 2);
    }
}
