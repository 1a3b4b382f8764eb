//! Index-driven cells: the recycle protocol of list, table and tree cells.
//!
//! An [`IndexedCell`] is assigned a row index by its container and keeps
//! everything else (value binding, item, selection, focus, edit state) in
//! sync with that index. The four cell kinds of item views share one type
//! and differ only in their [`CellCapabilities`]:
//!
//! | variant     | column binding | row grouping |
//! |-------------|----------------|--------------|
//! | `List`      | no             | no           |
//! | `Table`     | yes            | no           |
//! | `Tree`      | no             | yes          |
//! | `TreeTable` | yes            | yes          |
//!
//! With column binding, the column's visibility guards the cell and
//! selection, focus and edit target are matched per (row, column). With row
//! grouping, the edit target is matched by row identity, so an edit follows
//! its row when the row moves.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use trellis_core::logging::targets;
use trellis_core::{ConnectionId, ObservableValue};

use super::base::{Cell, CellContent, CellState};
use super::column::{CellEditEvent, Column, ColumnId, EditEventKind};

/// The kind of an [`IndexedCell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellVariant {
    /// A row of a list.
    List,
    /// One (row, column) cell of a table.
    Table,
    /// A row of a tree.
    Tree,
    /// One (row, column) cell of a tree table.
    TreeTable,
}

impl CellVariant {
    /// The capabilities of this variant.
    pub fn capabilities(self) -> CellCapabilities {
        match self {
            CellVariant::List => CellCapabilities {
                column_binding: false,
                row_grouping: false,
            },
            CellVariant::Table => CellCapabilities {
                column_binding: true,
                row_grouping: false,
            },
            CellVariant::Tree => CellCapabilities {
                column_binding: false,
                row_grouping: true,
            },
            CellVariant::TreeTable => CellCapabilities {
                column_binding: true,
                row_grouping: true,
            },
        }
    }
}

/// What distinguishes the cell variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellCapabilities {
    /// Selection, focus and editing are tracked per column, and the column's
    /// visibility guards the cell.
    pub column_binding: bool,
    /// Rows belong to a hierarchy; the edit target is matched by row
    /// identity.
    pub row_grouping: bool,
}

/// The cell a control is currently editing.
#[derive(Debug)]
pub struct EditTarget<S> {
    /// Row index.
    pub index: usize,
    /// Column, for column-bound cells.
    pub column: Option<ColumnId>,
    /// The edited row, if it still exists.
    pub row: Option<Arc<S>>,
}

impl<S> Clone for EditTarget<S> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            column: self.column,
            row: self.row.clone(),
        }
    }
}

/// The control that owns a set of cells.
///
/// Cells query their host during the recycle protocol and report edit
/// transitions back to it.
pub trait CellHost<S>: Send + Sync {
    /// Number of rows.
    fn item_count(&self) -> usize;

    /// The row at `index`, or `None` if out of range.
    fn row_at(&self, index: usize) -> Option<Arc<S>>;

    /// Returns `true` if the row (or the (row, column) cell) is selected.
    fn is_selected(&self, index: usize, column: Option<ColumnId>) -> bool;

    /// Returns `true` if the row (or the (row, column) cell) is focused.
    fn is_focused(&self, index: usize, column: Option<ColumnId>) -> bool;

    /// Returns `true` if the control allows editing.
    fn is_editable(&self) -> bool;

    /// The current edit target.
    fn editing_cell(&self) -> Option<EditTarget<S>>;

    /// Makes (index, column) the edit target.
    fn edit(&self, index: usize, column: Option<ColumnId>);

    /// Clears the edit target.
    fn clear_editing_cell(&self);

    /// Nesting level of the row at `index`, for hierarchical rows.
    fn depth(&self, _index: usize) -> Option<usize> {
        None
    }
}

/// Whether cancelling an edit reports back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelMode {
    /// Clear the host's edit target.
    NotifyHost,
    /// Leave the host alone. Used when the host's edit target moved away
    /// from this cell, which the host already knows.
    Suppress,
}

struct ValueBinding<T> {
    value: Arc<ObservableValue<T>>,
    connection: ConnectionId,
}

/// A recyclable cell bound to a row index.
///
/// `S` is the row type, `T` the displayed value, `C` the content hooks.
pub struct IndexedCell<S, T, C> {
    cell: Cell<T, C>,
    capabilities: CellCapabilities,
    index: Option<usize>,
    column: Arc<Column<S, T>>,
    host: Weak<dyn CellHost<S>>,
    visible: bool,
    /// Identity of the row shown by the last update.
    row: Option<Weak<S>>,
    binding: Option<ValueBinding<T>>,
    /// Set by the bound value's listener; consumed by `layout`.
    value_dirty: Arc<AtomicBool>,
    /// Index the current edit started at.
    editing_at: Option<usize>,
    first_run: bool,
}

impl<S, T, C> IndexedCell<S, T, C>
where
    S: Send + Sync + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
    C: CellContent<T>,
{
    /// Creates an unassigned cell.
    pub fn new(
        variant: CellVariant,
        column: Arc<Column<S, T>>,
        host: Weak<dyn CellHost<S>>,
        content: C,
    ) -> Self {
        Self {
            cell: Cell::new(content),
            capabilities: variant.capabilities(),
            index: None,
            column,
            host,
            visible: true,
            row: None,
            binding: None,
            value_dirty: Arc::new(AtomicBool::new(false)),
            editing_at: None,
            first_run: true,
        }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// The assigned index.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// The capabilities of this cell's variant.
    pub fn capabilities(&self) -> CellCapabilities {
        self.capabilities
    }

    /// The value binding.
    pub fn column(&self) -> &Arc<Column<S, T>> {
        &self.column
    }

    /// The underlying cell state.
    pub fn cell(&self) -> &Cell<T, C> {
        &self.cell
    }

    /// The content hooks.
    pub fn content(&self) -> &C {
        self.cell.content()
    }

    /// The displayed item.
    pub fn item(&self) -> Option<&T> {
        self.cell.item()
    }

    /// Returns `true` if the cell shows no item.
    pub fn is_empty(&self) -> bool {
        self.cell.is_empty()
    }

    /// Returns `true` if the cell is selected.
    pub fn is_selected(&self) -> bool {
        self.cell.is_selected()
    }

    /// Returns `true` if the cell is focused.
    pub fn is_focused(&self) -> bool {
        self.cell.is_focused()
    }

    /// Returns `true` while editing.
    pub fn is_editing(&self) -> bool {
        self.cell.is_editing()
    }

    /// The derived cell state.
    pub fn state(&self) -> CellState {
        self.cell.state()
    }

    /// The row shown by this cell, if it still exists.
    pub fn row(&self) -> Option<Arc<S>> {
        self.row.as_ref().and_then(Weak::upgrade)
    }

    /// Returns `true` if the cell is visible.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Shows or hides the cell. A hidden cell is empty.
    pub fn set_visible(&mut self, visible: bool) {
        if self.visible != visible {
            self.visible = visible;
            self.refresh();
        }
    }

    /// Sets whether this cell may enter edit mode.
    pub fn set_editable(&mut self, editable: bool) {
        self.cell.set_editable(editable);
    }

    /// Nesting level of the shown row, for tree variants.
    pub fn tree_depth(&self) -> Option<usize> {
        if !self.capabilities.row_grouping {
            return None;
        }
        let index = self.index?;
        self.host.upgrade()?.depth(index)
    }

    // =========================================================================
    // Recycle Protocol
    // =========================================================================

    /// Assigns a new index and runs the recycle protocol.
    pub fn update_index(&mut self, index: Option<usize>) {
        let old = self.index;
        self.index = index;
        self.index_changed(old, index);
    }

    /// Runs the recycle protocol for the current index again.
    pub fn refresh(&mut self) {
        self.index_changed(self.index, self.index);
    }

    /// Flushes deferred work: value changes of the bound observable, lazy
    /// item requests and edit target changes of the host.
    ///
    /// Value changes stay pending while the cell is editing.
    pub fn layout(&mut self) {
        if !self.cell.is_editing()
            && self.value_dirty.swap(false, Ordering::SeqCst)
            && !self.cell.is_empty()
            && let Some(binding) = &self.binding
        {
            self.cell.request_item(Some(binding.value.get()), false);
        }
        self.cell.layout();

        if let (Some(host), Some(index)) = (self.host.upgrade(), self.index) {
            self.update_editing(host.as_ref(), index);
        }
    }

    fn index_changed(&mut self, old: Option<usize>, new: Option<usize>) {
        tracing::trace!(target: targets::CELL, ?old, ?new, "cell index changed");
        self.unbind();

        let host = self.host.upgrade();
        let count = host.as_ref().map_or(0, |host| host.item_count());
        let shown = self.visible && (!self.capabilities.column_binding || self.column.is_visible());
        let resolved = host
            .zip(new)
            .filter(|&(_, index)| shown && index < count)
            .and_then(|(host, index)| host.row_at(index).map(|row| (host, index, row)));

        let Some((host, index, row)) = resolved else {
            self.show_empty();
            return;
        };

        // Value binding for the new (row, column).
        let value = self.column.cell_observable_value(&row);
        let new_item = value.as_ref().map(|value| value.get());
        self.bind(value);

        // Item, with dirty check unless the row itself changed.
        if !(self.cell.is_editing() && old == new) {
            let same_row = self.row().is_some_and(|previous| Arc::ptr_eq(&previous, &row));
            let changed = self.first_run
                || self.cell.is_empty()
                || !same_row
                || self.cell.is_item_changed(self.cell.item(), new_item.as_ref());
            if changed {
                self.cell.update_item(new_item, false);
            }
        }
        self.row = Some(Arc::downgrade(&row));
        self.first_run = false;

        let column = self.column_id();
        self.cell.update_selected(host.is_selected(index, column));
        self.cell.update_focused(host.is_focused(index, column));

        self.update_editing(host.as_ref(), index);
    }

    /// Moves the cell to `(None, empty)`. An already empty cell is only
    /// updated on its first run.
    fn show_empty(&mut self) {
        if self.cell.is_editing() {
            tracing::trace!(target: targets::CELL, "cancelling edit of invalidated cell");
            self.cancel_edit_with(CancelMode::Suppress);
        }
        if self.first_run || !self.cell.is_empty() {
            self.cell.update_item(None, true);
        }
        self.first_run = false;
        self.row = None;
        self.cell.update_selected(false);
        self.cell.update_focused(false);
    }

    fn update_editing(&mut self, host: &dyn CellHost<S>, index: usize) {
        let matches = host
            .editing_cell()
            .is_some_and(|target| self.matches_target(&target, index));

        if matches && !self.cell.is_editing() {
            self.begin_edit(host, index, false);
        } else if !matches && self.cell.is_editing() {
            tracing::trace!(target: targets::CELL, index, "edit target moved away");
            self.cancel_edit_with(CancelMode::Suppress);
        }
    }

    fn matches_target(&self, target: &EditTarget<S>, index: usize) -> bool {
        if self.capabilities.column_binding && target.column != Some(self.column.id()) {
            return false;
        }
        if self.capabilities.row_grouping
            && let (Some(target_row), Some(row)) = (&target.row, self.row())
        {
            return Arc::ptr_eq(target_row, &row);
        }
        target.index == index
    }

    fn column_id(&self) -> Option<ColumnId> {
        self.capabilities.column_binding.then(|| self.column.id())
    }

    fn bind(&mut self, value: Option<Arc<ObservableValue<T>>>) {
        let Some(value) = value else {
            return;
        };
        let dirty = self.value_dirty.clone();
        let connection = value.value_changed.connect(move |_| {
            dirty.store(true, Ordering::SeqCst);
        });
        self.binding = Some(ValueBinding { value, connection });
    }

    fn unbind(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.value.value_changed.disconnect(binding.connection);
        }
        self.value_dirty.store(false, Ordering::SeqCst);
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Starts editing this cell and makes it the host's edit target.
    ///
    /// Requires an editable host, an editable column (for column-bound
    /// cells) and an editable, filled cell.
    pub fn start_edit(&mut self) -> bool {
        let (Some(host), Some(index)) = (self.host.upgrade(), self.index) else {
            return false;
        };
        self.begin_edit(host.as_ref(), index, true)
    }

    /// Commits `value`: the column's commit handler receives it, the cell
    /// shows it and the host's edit target is cleared.
    ///
    /// Returns `false` (and does nothing) if the cell is not editing.
    pub fn commit_edit(&mut self, value: T) -> bool {
        if !self.cell.is_editing() {
            return false;
        }
        let index = self.editing_at.take().or(self.index);
        if let (Some(index), Some(row)) = (index, self.row()) {
            let mut event = self.edit_event(EditEventKind::Commit, index, row);
            event.new_value = Some(value.clone());
            self.column.commit(event);
        }
        self.cell.commit_edit(value.clone());
        self.cell.update_item(Some(value), false);

        if let Some(host) = self.host.upgrade() {
            host.clear_editing_cell();
        }
        true
    }

    /// Cancels editing and clears the host's edit target.
    pub fn cancel_edit(&mut self) -> bool {
        self.cancel_edit_with(CancelMode::NotifyHost)
    }

    /// Cancels editing; `mode` decides whether the host hears about it.
    pub fn cancel_edit_with(&mut self, mode: CancelMode) -> bool {
        if !self.cell.cancel_edit() {
            return false;
        }
        let index = self.editing_at.take().or(self.index);
        if let (Some(index), Some(row)) = (index, self.row()) {
            let event = self.edit_event(EditEventKind::Cancel, index, row);
            self.column.fire_edit_cancelled(event);
        }
        if mode == CancelMode::NotifyHost
            && let Some(host) = self.host.upgrade()
        {
            host.clear_editing_cell();
        }
        true
    }

    /// Tracks input focus. Losing focus while editing cancels the edit.
    pub fn on_input_focus_changed(&mut self, has_focus: bool) {
        if !has_focus && self.cell.is_editing() {
            self.cancel_edit_with(CancelMode::NotifyHost);
        }
        self.cell.on_input_focus_changed(has_focus);
    }

    fn begin_edit(&mut self, host: &dyn CellHost<S>, index: usize, notify_host: bool) -> bool {
        if !host.is_editable() || (self.capabilities.column_binding && !self.column.is_editable()) {
            return false;
        }
        let Some(row) = self.row() else {
            return false;
        };
        if !self.cell.start_edit() {
            return false;
        }
        self.editing_at = Some(index);
        let event = self.edit_event(EditEventKind::Start, index, row);
        self.column.fire_edit_started(event);
        if notify_host {
            host.edit(index, self.column_id());
        }
        true
    }

    fn edit_event(&self, kind: EditEventKind, index: usize, row: Arc<S>) -> CellEditEvent<S, T> {
        CellEditEvent {
            kind,
            index,
            column: self.column.id(),
            row,
            old_value: self.cell.item().cloned(),
            new_value: None,
        }
    }
}

impl<S, T, C> Drop for IndexedCell<S, T, C> {
    fn drop(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.value.value_changed.disconnect(binding.connection);
        }
    }
}

impl<S, T: fmt::Debug, C> fmt::Debug for IndexedCell<S, T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedCell")
            .field("index", &self.index)
            .field("capabilities", &self.capabilities)
            .field("cell", &self.cell)
            .finish()
    }
}
