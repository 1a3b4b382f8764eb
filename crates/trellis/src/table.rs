//! The control that hosts table, list and tree cells.
//!
//! [`TableControl`] ties the pieces together: an [`ObservableList`] of rows,
//! a [`MultipleSelectionModel`] kept in sync with it, optional per-cell
//! selection and the current edit target. Cells reach it through the
//! [`CellHost`] trait.
//!
//! Selection notifications are delivered after the selection lock is
//! released, so listeners may query the control, including through
//! [`CellHost`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use trellis::model::ObservableList;
//! use trellis::table::TableControl;
//!
//! let rows = Arc::new(ObservableList::new(vec![
//!     Arc::new("a".to_string()),
//!     Arc::new("b".to_string()),
//!     Arc::new("c".to_string()),
//! ]));
//! let table = TableControl::new(rows.clone());
//!
//! table.select(2);
//! rows.remove(0);
//! assert_eq!(table.selection().selected_index(), Some(1));
//! ```

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use trellis_core::logging::targets;
use trellis_core::{ConnectionId, Property, Signal};

use crate::cell::{CellHost, Column, ColumnId, EditTarget};
use crate::config::ViewConfig;
use crate::model::{
    ItemSource, ListChange, MultipleSelectionModel, ObservableList, PendingNotifications,
    shifted_index,
};

/// The cell being edited: row index, column and the row itself.
struct EditingCell<S> {
    index: usize,
    column: Option<ColumnId>,
    row: Weak<S>,
}

/// A table-like control over shared rows.
///
/// Rows are `Arc<S>` so cells can track row identity across structural
/// changes of the list. The selection model compares rows by identity: a
/// row replaced by an equal-valued `Arc` is a different row.
///
/// # Signals
///
/// - `editing_changed`: the edit target changed
pub struct TableControl<S> {
    items: Arc<ObservableList<Arc<S>>>,
    selection: Arc<RwLock<MultipleSelectionModel<Arc<S>>>>,
    columns: RwLock<Vec<ColumnId>>,
    cell_selection_enabled: Property<bool>,
    cell_selection: RwLock<BTreeSet<(usize, ColumnId)>>,
    focused_column: RwLock<Option<ColumnId>>,
    editing: RwLock<Option<EditingCell<S>>>,
    editable: Property<bool>,
    list_connection: Mutex<Option<ConnectionId>>,

    /// Emitted with the new (index, column) edit target, or `None`.
    pub editing_changed: Signal<Option<(usize, Option<ColumnId>)>>,
}

impl<S: Send + Sync + 'static> TableControl<S> {
    /// Creates a control over `items` with default settings.
    pub fn new(items: Arc<ObservableList<Arc<S>>>) -> Arc<Self> {
        Self::with_config(items, &ViewConfig::default())
    }

    /// Creates a control over `items` configured by `config`.
    ///
    /// The control follows structural changes of `items` until it is
    /// dropped.
    pub fn with_config(items: Arc<ObservableList<Arc<S>>>, config: &ViewConfig) -> Arc<Self> {
        let source: Arc<dyn ItemSource<Arc<S>>> = items.clone();
        let mut selection = MultipleSelectionModel::by_identity(source);
        selection.set_selection_mode(config.selection_mode);

        let control = Arc::new(Self {
            items,
            selection: Arc::new(RwLock::new(selection)),
            columns: RwLock::new(Vec::new()),
            cell_selection_enabled: Property::new(config.cell_selection_enabled),
            cell_selection: RwLock::new(BTreeSet::new()),
            focused_column: RwLock::new(None),
            editing: RwLock::new(None),
            editable: Property::new(config.editable),
            list_connection: Mutex::new(None),
            editing_changed: Signal::new(),
        });

        let weak = Arc::downgrade(&control);
        let id = control.items.changed.connect(move |change| {
            if let Some(control) = weak.upgrade() {
                control.handle_list_change(change);
            }
        });
        *control.list_connection.lock() = Some(id);
        control
    }

    /// This control as a cell host.
    pub fn host(self: &Arc<Self>) -> Weak<dyn CellHost<S>> {
        let host: Arc<dyn CellHost<S>> = self.clone();
        Arc::downgrade(&host)
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// The rows.
    pub fn items(&self) -> &Arc<ObservableList<Arc<S>>> {
        &self.items
    }

    /// The shared selection model.
    ///
    /// Mutating it through the lock directly fires its signals while the
    /// lock is held; prefer [`update_selection`](Self::update_selection).
    pub fn selection_model(&self) -> &Arc<RwLock<MultipleSelectionModel<Arc<S>>>> {
        &self.selection
    }

    /// Read access to the selection model.
    pub fn selection(&self) -> RwLockReadGuard<'_, MultipleSelectionModel<Arc<S>>> {
        self.selection.read()
    }

    /// Runs `f` on the selection model, then delivers the notifications it
    /// caused once the lock is released.
    pub fn update_selection<R>(&self, f: impl FnOnce(&mut MultipleSelectionModel<Arc<S>>) -> R) -> R {
        let (result, pending) = self.update_selection_deferred(f);
        pending.emit();
        result
    }

    fn update_selection_deferred<R>(
        &self,
        f: impl FnOnce(&mut MultipleSelectionModel<Arc<S>>) -> R,
    ) -> (R, PendingNotifications<Arc<S>>) {
        let mut selection = self.selection.write();
        selection.hold_notifications();
        let result = f(&mut selection);
        (result, selection.release_notifications())
    }

    /// Returns `true` if cells may be edited.
    pub fn is_editable(&self) -> bool {
        self.editable.get()
    }

    /// Sets whether cells may be edited. Disabling editing clears the edit
    /// target.
    pub fn set_editable(&self, editable: bool) {
        if self.editable.set(editable) && !editable {
            self.clear_editing();
        }
    }

    /// Returns `true` if selection is tracked per (row, column).
    pub fn is_cell_selection_enabled(&self) -> bool {
        self.cell_selection_enabled.get()
    }

    /// Switches between row and cell selection. Switching clears the cell
    /// selection.
    pub fn set_cell_selection_enabled(&self, enabled: bool) {
        if self.cell_selection_enabled.set(enabled) {
            self.cell_selection.write().clear();
        }
    }

    // =========================================================================
    // Columns
    // =========================================================================

    /// Registers `column` and attaches it to the rows.
    pub fn add_column<T>(&self, column: &Column<S, T>)
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        let source: Arc<dyn ItemSource<Arc<S>>> = self.items.clone();
        column.attach(Arc::downgrade(&source));
        let mut columns = self.columns.write();
        if !columns.contains(&column.id()) {
            columns.push(column.id());
        }
    }

    /// Unregisters `column`, dropping its selected cells and any edit in it.
    pub fn remove_column<T>(&self, column: &Column<S, T>)
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        let id = column.id();
        column.detach();
        self.columns.write().retain(|&c| c != id);
        self.cell_selection.write().retain(|&(_, c)| c != id);
        {
            let mut focused = self.focused_column.write();
            if *focused == Some(id) {
                *focused = None;
            }
        }
        let editing_here = self.editing.read().as_ref().is_some_and(|e| e.column == Some(id));
        if editing_here {
            self.clear_editing();
        }
    }

    /// The registered columns, in registration order.
    pub fn columns(&self) -> Vec<ColumnId> {
        self.columns.read().clone()
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Selects the row at `index`.
    pub fn select(&self, index: usize) {
        self.update_selection(|selection| selection.select(index));
    }

    /// Selects only the row at `index`.
    pub fn clear_and_select(&self, index: usize) {
        self.cell_selection.write().clear();
        self.update_selection(|selection| selection.clear_and_select(index));
    }

    /// Selects the (row, column) cell. Also selects the row, so the primary
    /// selection follows the last selected cell.
    ///
    /// Without cell selection this selects the row only.
    pub fn select_cell(&self, index: usize, column: ColumnId) {
        if index >= self.items.len() {
            return;
        }
        if self.is_cell_selection_enabled() {
            self.cell_selection.write().insert((index, column));
        }
        self.update_selection(|selection| selection.select(index));
    }

    /// Selected (row, column) cells, ordered by row.
    pub fn selected_cells(&self) -> Vec<(usize, ColumnId)> {
        self.cell_selection.read().iter().copied().collect()
    }

    /// Clears row and cell selection.
    pub fn clear_selection(&self) {
        self.cell_selection.write().clear();
        self.update_selection(|selection| selection.clear_selection());
    }

    /// Moves keyboard focus to the (row, column) cell.
    pub fn focus_cell(&self, index: usize, column: Option<ColumnId>) {
        if index >= self.items.len() {
            return;
        }
        *self.focused_column.write() = column;
        self.update_selection(|selection| selection.focus_model_mut().focus(Some(index)));
    }

    /// The focused (row, column) cell.
    pub fn focused_cell(&self) -> Option<(usize, Option<ColumnId>)> {
        let index = self.selection.read().focused_index()?;
        Some((index, *self.focused_column.read()))
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// The (row, column) being edited.
    pub fn editing_cell(&self) -> Option<(usize, Option<ColumnId>)> {
        self.editing.read().as_ref().map(|e| (e.index, e.column))
    }

    /// Makes (index, column) the edit target. Cells pick it up on their next
    /// layout pass.
    pub fn edit(&self, index: usize, column: Option<ColumnId>) {
        if !self.is_editable() {
            return;
        }
        let Some(row) = self.items.get(index) else {
            return;
        };
        self.set_editing(Some(EditingCell {
            index,
            column,
            row: Arc::downgrade(&row),
        }));
    }

    /// Clears the edit target.
    pub fn clear_editing(&self) {
        self.set_editing(None);
    }

    fn set_editing(&self, editing: Option<EditingCell<S>>) {
        let position = editing.as_ref().map(|e| (e.index, e.column));
        let changed = {
            let mut current = self.editing.write();
            let before = current.as_ref().map(|e| (e.index, e.column));
            *current = editing;
            before != position
        };
        if changed {
            tracing::debug!(target: targets::TABLE, ?position, "editing cell changed");
            self.editing_changed.emit(position);
        }
    }

    // =========================================================================
    // Data Changes
    // =========================================================================

    fn handle_list_change(&self, change: &ListChange) {
        tracing::trace!(target: targets::TABLE, ?change, "rows changed");
        let ((), pending) = self.update_selection_deferred(|selection| selection.handle_list_change(change));

        let records = change.shift_records();
        let relocate = |index: usize| -> Option<usize> {
            match change {
                ListChange::Inserted { .. } => Some(shifted_index(index, &records)),
                ListChange::Removed { from, count } => {
                    if (*from..from.saturating_add(*count)).contains(&index) {
                        None
                    } else {
                        Some(shifted_index(index, &records))
                    }
                }
                ListChange::Replaced { .. } => Some(index),
                ListChange::Permuted { permutation } => permutation.get(index).copied(),
                ListChange::Reset => None,
            }
        };

        {
            let mut cells = self.cell_selection.write();
            let moved: BTreeSet<_> = cells
                .iter()
                .filter_map(|&(index, column)| relocate(index).map(|new| (new, column)))
                .collect();
            *cells = moved;
        }
        pending.emit();

        let editing = self.editing.read().as_ref().map(|e| (e.index, e.column, e.row.clone()));
        if let Some((index, column, row)) = editing {
            let replaced = matches!(change, ListChange::Replaced { index: at } if *at == index);
            let next = relocate(index).filter(|_| !replaced);
            match next {
                Some(new) if new != index => self.set_editing(Some(EditingCell {
                    index: new,
                    column,
                    row,
                })),
                Some(_) => {}
                None => self.clear_editing(),
            }
        }
    }
}

impl<S: Send + Sync + 'static> CellHost<S> for TableControl<S> {
    fn item_count(&self) -> usize {
        self.items.len()
    }

    fn row_at(&self, index: usize) -> Option<Arc<S>> {
        self.items.get(index)
    }

    fn is_selected(&self, index: usize, column: Option<ColumnId>) -> bool {
        match column {
            Some(column) if self.is_cell_selection_enabled() => {
                self.cell_selection.read().contains(&(index, column))
            }
            _ => self.selection.read().is_selected(index),
        }
    }

    fn is_focused(&self, index: usize, column: Option<ColumnId>) -> bool {
        if self.selection.read().focused_index() != Some(index) {
            return false;
        }
        match column {
            Some(column) if self.is_cell_selection_enabled() => *self.focused_column.read() == Some(column),
            _ => true,
        }
    }

    fn is_editable(&self) -> bool {
        TableControl::is_editable(self)
    }

    fn editing_cell(&self) -> Option<EditTarget<S>> {
        self.editing.read().as_ref().map(|e| EditTarget {
            index: e.index,
            column: e.column,
            row: e.row.upgrade(),
        })
    }

    fn edit(&self, index: usize, column: Option<ColumnId>) {
        TableControl::edit(self, index, column);
    }

    fn clear_editing_cell(&self) {
        self.clear_editing();
    }

    fn depth(&self, index: usize) -> Option<usize> {
        ItemSource::depth(self.items.as_ref(), index)
    }
}

impl<S> Drop for TableControl<S> {
    fn drop(&mut self) {
        if let Some(id) = self.list_connection.lock().take() {
            self.items.changed.disconnect(id);
        }
    }
}

impl<S> std::fmt::Debug for TableControl<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableControl")
            .field("columns", &self.columns.read().len())
            .field("cell_selection", &self.cell_selection.read().len())
            .finish()
    }
}

static_assertions::assert_impl_all!(TableControl<String>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SelectionMode;

    fn rows(labels: &[&str]) -> Arc<ObservableList<Arc<String>>> {
        Arc::new(ObservableList::new(labels.iter().map(|l| Arc::new(l.to_string())).collect()))
    }

    #[test]
    fn test_selection_follows_removal() {
        let items = rows(&["a", "b", "c", "d", "e"]);
        let table = TableControl::new(items.clone());
        table.select(4);

        items.remove_range(0, 2);
        assert_eq!(table.selection().selected_index(), Some(2));
        assert_eq!(table.selection().selected_item().as_deref().map(String::as_str), Some("e"));
    }

    #[test]
    fn test_config_applies_mode() {
        let config = ViewConfig {
            selection_mode: SelectionMode::Multiple,
            ..ViewConfig::default()
        };
        let table = TableControl::with_config(rows(&["a", "b"]), &config);
        table.select(0);
        table.select(1);
        assert_eq!(table.selection().selected_indices(), vec![0, 1]);
    }

    #[test]
    fn test_cell_selection_shifts_with_rows() {
        let items = rows(&["a", "b", "c"]);
        let table = TableControl::new(items.clone());
        table.set_cell_selection_enabled(true);
        let column: Column<String, String> = Column::new("Text");
        table.add_column(&column);

        table.select_cell(1, column.id());
        items.insert(0, Arc::new("z".to_string())).unwrap();
        assert_eq!(table.selected_cells(), vec![(2, column.id())]);
        assert!(CellHost::is_selected(table.as_ref(), 2, Some(column.id())));
        assert!(!CellHost::is_selected(table.as_ref(), 1, Some(column.id())));

        items.remove(2);
        assert!(table.selected_cells().is_empty());
    }

    #[test]
    fn test_edit_target_follows_rows() {
        let items = rows(&["a", "b", "c"]);
        let table = TableControl::new(items.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        table.editing_changed.connect(move |&position| seen_clone.lock().push(position));

        table.edit(1, None);
        items.insert(0, Arc::new("z".to_string())).unwrap();
        assert_eq!(table.editing_cell(), Some((2, None)));

        items.sort_by(|a, b| b.cmp(a));
        // z c b a
        assert_eq!(table.editing_cell(), Some((2, None)));

        items.remove(2);
        assert_eq!(table.editing_cell(), None);
        assert_eq!(*seen.lock(), vec![Some((1, None)), Some((2, None)), None]);
    }

    #[test]
    fn test_replacing_edited_row_clears_edit() {
        let items = rows(&["a", "b"]);
        let table = TableControl::new(items.clone());
        table.edit(0, None);
        items.set(0, Arc::new("x".to_string()));
        assert_eq!(table.editing_cell(), None);
    }

    #[test]
    fn test_not_editable_ignores_edit() {
        let table = TableControl::new(rows(&["a"]));
        table.set_editable(false);
        table.edit(0, None);
        assert_eq!(table.editing_cell(), None);
    }

    #[test]
    fn test_remove_column_drops_its_state() {
        let table = TableControl::new(rows(&["a", "b"]));
        table.set_cell_selection_enabled(true);
        let column: Column<String, String> = Column::new("Text");
        table.add_column(&column);
        table.select_cell(0, column.id());
        table.edit(1, Some(column.id()));

        table.remove_column(&column);
        assert!(table.columns().is_empty());
        assert!(table.selected_cells().is_empty());
        assert_eq!(table.editing_cell(), None);
    }

    #[test]
    fn test_reset_clears_everything() {
        let items = rows(&["a", "b"]);
        let table = TableControl::new(items.clone());
        table.select(1);
        table.edit(1, None);

        items.replace_all(vec![Arc::new("q".to_string())]);
        assert!(table.selection().is_empty());
        assert_eq!(table.editing_cell(), None);
    }

    #[test]
    fn test_drop_disconnects_from_rows() {
        let items = rows(&["a"]);
        let table = TableControl::new(items.clone());
        assert_eq!(items.changed.connection_count(), 1);
        drop(table);
        assert_eq!(items.changed.connection_count(), 0);
    }

    #[test]
    fn test_focus_cell_per_column() {
        let table = TableControl::new(rows(&["a", "b"]));
        table.set_cell_selection_enabled(true);
        let first: Column<String, String> = Column::new("A");
        let second: Column<String, String> = Column::new("B");

        table.focus_cell(1, Some(first.id()));
        assert!(CellHost::is_focused(table.as_ref(), 1, Some(first.id())));
        assert!(!CellHost::is_focused(table.as_ref(), 1, Some(second.id())));
        assert!(CellHost::is_focused(table.as_ref(), 1, None));
        assert_eq!(table.focused_cell(), Some((1, Some(first.id()))));
    }

    #[test]
    fn test_selection_listener_can_query_host_during_row_removal() {
        let items = rows(&["a", "b", "c"]);
        let table = TableControl::new(items.clone());
        table.select(2);

        let answers = Arc::new(Mutex::new(Vec::new()));
        let weak = Arc::downgrade(&table);
        let answers_clone = answers.clone();
        table.selection().selected_index_changed.connect(move |&index| {
            if let (Some(table), Some(index)) = (weak.upgrade(), index) {
                answers_clone.lock().push((
                    index,
                    CellHost::is_selected(table.as_ref(), index, None),
                    CellHost::is_focused(table.as_ref(), index, None),
                ));
            }
        });

        items.remove(0);
        assert_eq!(*answers.lock(), vec![(1, true, true)]);
    }

    #[test]
    fn test_selection_listener_can_query_host_on_select() {
        let table = TableControl::new(rows(&["a", "b"]));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let weak = Arc::downgrade(&table);
        let seen_clone = seen.clone();
        table.selection().index_set().changed.connect(move |change| {
            if let Some(table) = weak.upgrade() {
                let selected = table.selection().selected_indices();
                seen_clone.lock().push((change.added_indices(), selected));
            }
        });

        table.select(1);
        table.clear_selection();
        assert_eq!(*seen.lock(), vec![(vec![1], vec![1]), (vec![], vec![])]);
    }

    #[test]
    fn test_replacing_selected_row_with_equal_value_changes_item() {
        let items = rows(&["a", "b"]);
        let table = TableControl::new(items.clone());
        table.select(0);
        let original = items.get(0).unwrap();

        let changes = Arc::new(Mutex::new(Vec::new()));
        let changes_clone = changes.clone();
        table
            .selection()
            .selected_item_changed
            .connect(move |item: &Option<Arc<String>>| changes_clone.lock().push(item.clone()));

        let replacement = Arc::new("a".to_string());
        items.set(0, replacement.clone());

        let changes = changes.lock();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].as_ref().is_some_and(|row| Arc::ptr_eq(row, &replacement)));
        assert!(!changes[0].as_ref().is_some_and(|row| Arc::ptr_eq(row, &original)));
        assert_eq!(table.selection().selected_index(), Some(0));
    }

    #[test]
    fn test_update_selection_returns_result() {
        let table = TableControl::new(rows(&["a", "b", "c"]));
        let count = table.update_selection(|selection| {
            selection.set_selection_mode(SelectionMode::Multiple);
            selection.select_all();
            selection.selected_count()
        });
        assert_eq!(count, 3);
    }
}
