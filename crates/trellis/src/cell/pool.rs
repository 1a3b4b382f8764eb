//! A fixed set of cells covering a scrolling window of rows.

use std::ops::Range;
use std::sync::{Arc, Weak};

use trellis_core::logging::targets;

use crate::config::ViewConfig;

use super::base::CellContent;
use super::column::Column;
use super::indexed::{CellHost, CellVariant, IndexedCell};

/// The cells of one column of a virtualized view.
///
/// The pool owns as many cells as fit into the viewport. Scrolling reassigns
/// only the cells whose row left the window; cells still inside it keep
/// their index and are not touched.
///
/// With lazy updates enabled, changes of bound values are applied on the
/// next [`layout`](Self::layout) pass instead of right after a scroll or
/// refresh.
pub struct CellPool<S, T, C> {
    cells: Vec<IndexedCell<S, T, C>>,
    first: usize,
    lazy: bool,
}

impl<S, T, C> CellPool<S, T, C>
where
    S: Send + Sync + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
    C: CellContent<T>,
{
    /// Creates `size` unassigned cells, each with content from `make_content`.
    pub fn new<F>(
        variant: CellVariant,
        size: usize,
        column: Arc<Column<S, T>>,
        host: Weak<dyn CellHost<S>>,
        mut make_content: F,
    ) -> Self
    where
        F: FnMut() -> C,
    {
        let cells = (0..size)
            .map(|_| IndexedCell::new(variant, column.clone(), host.clone(), make_content()))
            .collect();
        Self {
            cells,
            first: 0,
            lazy: false,
        }
    }

    /// Creates a pool sized and scheduled by `config`: `visible_cells`
    /// cells, with lazy updates if `lazy_item_updates` is set.
    pub fn with_config<F>(
        variant: CellVariant,
        column: Arc<Column<S, T>>,
        host: Weak<dyn CellHost<S>>,
        config: &ViewConfig,
        make_content: F,
    ) -> Self
    where
        F: FnMut() -> C,
    {
        tracing::debug!(
            target: targets::CELL,
            visible_cells = config.visible_cells,
            lazy = config.lazy_item_updates,
            "creating configured cell pool"
        );
        Self::new(variant, config.visible_cells, column, host, make_content)
            .with_lazy_updates(config.lazy_item_updates)
    }

    /// Enables or disables lazy item updates.
    pub fn with_lazy_updates(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Returns `true` if value changes wait for `layout`.
    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if the pool has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// First row of the window.
    pub fn first_index(&self) -> usize {
        self.first
    }

    /// Rows covered by the window.
    pub fn visible_range(&self) -> Range<usize> {
        self.first..self.first.saturating_add(self.cells.len())
    }

    /// All cells, in no particular row order.
    pub fn cells(&self) -> &[IndexedCell<S, T, C>] {
        &self.cells
    }

    /// Mutable access to all cells.
    pub fn cells_mut(&mut self) -> &mut [IndexedCell<S, T, C>] {
        &mut self.cells
    }

    /// The cell showing row `index`.
    pub fn cell_for_index(&self, index: usize) -> Option<&IndexedCell<S, T, C>> {
        self.cells.iter().find(|cell| cell.index() == Some(index))
    }

    /// Mutable access to the cell showing row `index`.
    pub fn cell_for_index_mut(&mut self, index: usize) -> Option<&mut IndexedCell<S, T, C>> {
        self.cells.iter_mut().find(|cell| cell.index() == Some(index))
    }

    // =========================================================================
    // Scrolling
    // =========================================================================

    /// Moves the window to start at `first`.
    ///
    /// Returns the number of cells that were reassigned.
    pub fn scroll_to(&mut self, first: usize) -> usize {
        self.first = first;
        let window = self.visible_range();

        let mut covered = vec![false; self.cells.len()];
        for cell in &self.cells {
            if let Some(index) = cell.index()
                && window.contains(&index)
            {
                covered[index - window.start] = true;
            }
        }

        let mut free = covered
            .iter()
            .enumerate()
            .filter(|(_, covered)| !**covered)
            .map(|(offset, _)| window.start + offset);

        let mut reassigned = 0;
        for cell in &mut self.cells {
            if cell.index().is_some_and(|index| window.contains(&index)) {
                continue;
            }
            cell.update_index(free.next());
            reassigned += 1;
        }
        tracing::trace!(target: targets::CELL, first, reassigned, "scrolled cell pool");

        if !self.lazy {
            self.layout();
        }
        reassigned
    }

    /// Re-runs the recycle protocol for every cell, e.g. after a data
    /// change.
    pub fn refresh(&mut self) {
        for cell in &mut self.cells {
            cell.refresh();
        }
        if !self.lazy {
            self.layout();
        }
    }

    /// Flushes deferred updates of every cell.
    pub fn layout(&mut self) {
        for cell in &mut self.cells {
            cell.layout();
        }
    }
}

impl<S, T: std::fmt::Debug, C> std::fmt::Debug for CellPool<S, T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellPool")
            .field("first", &self.first)
            .field("size", &self.cells.len())
            .field("lazy", &self.lazy)
            .finish()
    }
}
