//! Selection model for item views.
//!
//! This module provides [`MultipleSelectionModel`], which tracks which rows of
//! a control are selected. Selection is kept in two forms:
//!
//! - a [`SelectionIndexSet`] holding every selected row, and
//! - a *primary* selected index with its item, used for single selection and
//!   as the anchor for relative navigation.
//!
//! Out-of-range requests are ignored rather than reported: selection input
//! routinely races with changes to the underlying data.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use trellis::model::{MultipleSelectionModel, SelectionMode, ShiftRecord};
//!
//! let rows: Vec<String> = (0..10).map(|i| format!("row {i}")).collect();
//! let mut selection = MultipleSelectionModel::<String>::builder()
//!     .source(Arc::new(rows))
//!     .mode(SelectionMode::Multiple)
//!     .build()
//!     .unwrap();
//!
//! selection.index_set().changed.connect(|change| {
//!     println!("+{:?} -{:?}", change.added_indices(), change.removed_indices());
//! });
//!
//! selection.select(4);
//! // Two rows were removed from the top of the data.
//! selection.reconcile_shift(&[ShiftRecord::new(0, -2)]);
//! assert_eq!(selection.selected_index(), Some(2));
//! ```
//!
//! # Row comparison
//!
//! [`MultipleSelectionModel::new`] compares rows with `PartialEq`. Rows
//! without it, or rows whose identity matters more than their value, use
//! [`MultipleSelectionModel::with_item_eq`].
//!
//! # Re-entrancy
//!
//! Signals fire while the model is mutably borrowed. When the model is
//! shared behind a lock, wrap the mutation in
//! [`hold_notifications`](MultipleSelectionModel::hold_notifications) and
//! [`release_notifications`](MultipleSelectionModel::release_notifications)
//! and emit the returned [`PendingNotifications`] after unlocking.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use trellis_core::logging::targets;
use trellis_core::{Deferred, PerfSpan, Result, Signal, TrellisError};

use super::focus::{FocusModel, shifted_index};
use super::index_set::{SelectionChange, SelectionIndexSet, ShiftRecord};
use super::list::ListChange;
use super::source::ItemSource;

/// How many rows can be selected at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// At most one row is selected (default).
    #[default]
    Single,
    /// Any number of rows can be selected.
    Multiple,
}

/// Decides whether two rows are the same row.
pub type ItemEq<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// Manages row selection for a control.
///
/// # Signals
///
/// - `selected_index_changed`: emitted with the new primary index
/// - `selected_item_changed`: emitted with the new primary item
///
/// Changes to the set of selected rows are published by the underlying
/// [`SelectionIndexSet::changed`] signal, reachable via
/// [`index_set`](Self::index_set).
pub struct MultipleSelectionModel<T> {
    source: Arc<dyn ItemSource<T>>,
    item_eq: ItemEq<T>,
    indices: SelectionIndexSet,
    mode: SelectionMode,
    focus: FocusModel,

    selected_index: Option<usize>,
    /// Also set for items that are not in the data (see `select_item`).
    selected_item: Option<T>,

    /// Emitted when the primary selected index changes.
    pub selected_index_changed: Signal<Option<usize>>,
    /// Emitted when the primary selected item changes.
    pub selected_item_changed: Signal<Option<T>>,
}

/// Builder for [`MultipleSelectionModel`].
pub struct SelectionModelBuilder<T> {
    source: Option<Arc<dyn ItemSource<T>>>,
    item_eq: ItemEq<T>,
    mode: SelectionMode,
}

impl<T: PartialEq + 'static> Default for SelectionModelBuilder<T> {
    fn default() -> Self {
        Self {
            source: None,
            item_eq: Arc::new(|a: &T, b: &T| a == b),
            mode: SelectionMode::default(),
        }
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> SelectionModelBuilder<T> {
    /// Creates a builder with no source and single selection.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Clone + Send + Sync + 'static> SelectionModelBuilder<T> {
    /// Creates a builder that compares rows with `item_eq`.
    pub fn with_item_eq<F>(item_eq: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Self {
            source: None,
            item_eq: Arc::new(item_eq),
            mode: SelectionMode::default(),
        }
    }

    /// Sets the rows the model selects from.
    pub fn source(mut self, source: Arc<dyn ItemSource<T>>) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets the selection mode.
    pub fn mode(mut self, mode: SelectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Builds the model.
    ///
    /// # Errors
    ///
    /// [`TrellisError::MissingCollaborator`] if no source was given.
    pub fn build(self) -> Result<MultipleSelectionModel<T>> {
        let source = self
            .source
            .ok_or(TrellisError::MissingCollaborator("item source"))?;
        let mut model = MultipleSelectionModel::from_parts(source, self.item_eq);
        model.mode = self.mode;
        Ok(model)
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> MultipleSelectionModel<T> {
    /// Creates a single-selection model over `source`, comparing rows with
    /// `PartialEq`.
    pub fn new(source: Arc<dyn ItemSource<T>>) -> Self {
        Self::from_parts(source, Arc::new(|a: &T, b: &T| a == b))
    }

    /// Returns a builder.
    pub fn builder() -> SelectionModelBuilder<T> {
        SelectionModelBuilder::new()
    }
}

impl<S: Send + Sync + 'static> MultipleSelectionModel<Arc<S>> {
    /// Creates a single-selection model over shared rows that are the same
    /// row only if they are the same allocation.
    pub fn by_identity(source: Arc<dyn ItemSource<Arc<S>>>) -> Self {
        Self::with_item_eq(source, |a: &Arc<S>, b: &Arc<S>| Arc::ptr_eq(a, b))
    }
}

impl<T: Clone + Send + Sync + 'static> MultipleSelectionModel<T> {
    /// Creates a single-selection model over `source` that compares rows
    /// with `item_eq`.
    pub fn with_item_eq<F>(source: Arc<dyn ItemSource<T>>, item_eq: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Self::from_parts(source, Arc::new(item_eq))
    }

    fn from_parts(source: Arc<dyn ItemSource<T>>, item_eq: ItemEq<T>) -> Self {
        Self {
            source,
            item_eq,
            indices: SelectionIndexSet::new(),
            mode: SelectionMode::default(),
            focus: FocusModel::new(),
            selected_index: None,
            selected_item: None,
            selected_index_changed: Signal::new(),
            selected_item_changed: Signal::new(),
        }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Returns the selection mode.
    pub fn selection_mode(&self) -> SelectionMode {
        self.mode
    }

    /// Sets the selection mode.
    ///
    /// Switching to [`SelectionMode::Single`] with several rows selected keeps
    /// only the primary row.
    pub fn set_selection_mode(&mut self, mode: SelectionMode) {
        if self.mode == mode {
            return;
        }
        self.mode = mode;
        if mode == SelectionMode::Single && self.indices.cardinality() > 1 {
            let keep = self
                .selected_index
                .filter(|&index| self.indices.is_selected(index))
                .or_else(|| self.indices.iter().last());
            self.indices.begin_atomic();
            self.indices.clear_all();
            if let Some(index) = keep {
                self.indices.set(index);
            }
            self.indices.end_atomic();
            self.update_primary(keep);
        }
    }

    /// The rows this model selects from.
    pub fn source(&self) -> &Arc<dyn ItemSource<T>> {
        &self.source
    }

    /// Number of rows in the source.
    pub fn item_count(&self) -> usize {
        self.source.item_count()
    }

    /// The set of selected rows.
    pub fn index_set(&self) -> &SelectionIndexSet {
        &self.indices
    }

    /// The focus model.
    pub fn focus_model(&self) -> &FocusModel {
        &self.focus
    }

    /// Mutable access to the focus model.
    pub fn focus_model_mut(&mut self) -> &mut FocusModel {
        &mut self.focus
    }

    /// The focused row, if any.
    pub fn focused_index(&self) -> Option<usize> {
        self.focus.focused_index()
    }

    /// The primary selected row.
    pub fn selected_index(&self) -> Option<usize> {
        self.selected_index
    }

    /// The primary selected item.
    pub fn selected_item(&self) -> Option<T> {
        self.selected_item.clone()
    }

    /// All selected rows, ascending.
    pub fn selected_indices(&self) -> Vec<usize> {
        self.indices.to_vec()
    }

    /// The items of all selected rows that are within the source.
    pub fn selected_items(&self) -> Vec<T> {
        self.indices
            .iter()
            .filter_map(|index| self.source.item_at(index))
            .collect()
    }

    /// Number of selected rows.
    pub fn selected_count(&self) -> usize {
        self.indices.cardinality()
    }

    /// Returns `true` if `index` is selected.
    pub fn is_selected(&self, index: usize) -> bool {
        self.indices.is_selected(index)
    }

    /// Returns `true` if no row is selected.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Queues the notifications of this model and its index set and focus
    /// model until [`release_notifications`](Self::release_notifications).
    pub fn hold_notifications(&self) {
        self.focus.focused_index_changed.hold();
        self.indices.changed.hold();
        self.selected_index_changed.hold();
        self.selected_item_changed.hold();
    }

    /// Stops queueing and returns what was queued since
    /// [`hold_notifications`](Self::hold_notifications).
    pub fn release_notifications(&self) -> PendingNotifications<T> {
        PendingNotifications {
            focus: self.focus.focused_index_changed.release(),
            indices: self.indices.changed.release(),
            index: self.selected_index_changed.release(),
            item: self.selected_item_changed.release(),
        }
    }

    // =========================================================================
    // Selection Operations
    // =========================================================================

    /// Selects `index`, replacing the selection in single mode.
    ///
    /// Focus moves to `index` before the selection changes.
    pub fn select(&mut self, index: usize) {
        if index >= self.item_count() {
            return;
        }
        tracing::trace!(target: targets::SELECTION, index, "select");
        self.focus.focus(Some(index));

        self.indices.begin_atomic();
        if self.mode == SelectionMode::Single {
            self.indices.clear_all();
        }
        self.indices.set(index);
        self.indices.end_atomic();

        self.update_primary(Some(index));
    }

    /// Selects the first row that compares equal to `item`.
    ///
    /// If no row matches, the primary index is cleared but `item` is still
    /// published as the selected item, so a value can be selected before the
    /// data that contains it arrives.
    pub fn select_item(&mut self, item: &T) {
        let count = self.item_count();
        let found = (0..count).find(|&i| {
            self.source
                .item_at(i)
                .is_some_and(|row| (self.item_eq)(&row, item))
        });
        match found {
            Some(index) => {
                if !self.is_selected(index) {
                    self.select(index);
                }
            }
            None => {
                tracing::trace!(target: targets::SELECTION, "selecting item outside the data");
                self.set_primary_index(None);
                self.set_primary_item(Some(item.clone()));
            }
        }
    }

    /// Replaces the whole selection with `index`, publishing one change.
    pub fn clear_and_select(&mut self, index: usize) {
        if index >= self.item_count() {
            return;
        }
        let item = self.source.item_at(index);
        if self.indices.cardinality() == 1
            && self.indices.is_selected(index)
            && self.selected_index == Some(index)
            && self.same_item(self.selected_item.as_ref(), item.as_ref())
        {
            return;
        }

        self.focus.focus(Some(index));
        self.indices.begin_atomic();
        self.indices.clear_all();
        self.indices.set(index);
        self.indices.end_atomic();
        self.update_primary(Some(index));
    }

    /// Selects `anchor` and `rest`, skipping invalid indices.
    ///
    /// In single mode only the last valid index is selected. In multiple mode
    /// every valid index is selected and the last valid one, in argument
    /// order, becomes the primary and focused row.
    pub fn select_indices(&mut self, anchor: usize, rest: &[usize]) {
        let count = self.item_count();
        let all: Vec<usize> = std::iter::once(anchor).chain(rest.iter().copied()).collect();
        let Some(&last) = all.iter().rev().find(|&&index| index < count) else {
            return;
        };

        if self.mode == SelectionMode::Single {
            self.select(last);
            return;
        }

        self.focus.focus(Some(last));
        self.indices
            .set_many(all.into_iter().filter(|&index| index < count));
        self.update_primary(Some(last));
    }

    /// Selects the rows from `start` towards `end`, excluding `end`.
    ///
    /// A descending range (`start > end`) is walked downwards; the last row
    /// walked becomes the primary selection.
    pub fn select_range(&mut self, start: usize, end: usize) {
        if start == end {
            return;
        }
        let walked: Vec<usize> = if start < end {
            (start..end).collect()
        } else {
            (end + 1..=start).rev().collect()
        };
        if let Some((&anchor, rest)) = walked.split_first() {
            self.select_indices(anchor, rest);
        }
    }

    /// Selects every row. Does nothing in single mode.
    ///
    /// The primary row becomes the focused row if it is valid, otherwise the
    /// last row.
    pub fn select_all(&mut self) {
        if self.mode == SelectionMode::Single {
            return;
        }
        let count = self.item_count();
        if count == 0 {
            return;
        }
        let primary = self
            .focus
            .focused_index()
            .filter(|&index| index < count)
            .unwrap_or(count - 1);

        self.focus.focus(Some(primary));
        self.indices.set_range(0, count, true);
        self.update_primary(Some(primary));
    }

    /// Selects the first row.
    pub fn select_first(&mut self) {
        if self.item_count() > 0 {
            self.select(0);
        }
    }

    /// Selects the last row.
    pub fn select_last(&mut self) {
        if let Some(last) = self.item_count().checked_sub(1) {
            self.select(last);
        }
    }

    /// Selects the row above the focused row.
    pub fn select_previous(&mut self) {
        match self.focus.focused_index() {
            Some(0) => {}
            Some(focused) => self.select(focused - 1),
            None => self.select_last(),
        }
    }

    /// Selects the row below the focused row.
    pub fn select_next(&mut self) {
        match self.focus.focused_index() {
            Some(focused) => {
                if focused + 1 < self.item_count() {
                    self.select(focused + 1);
                }
            }
            None => self.select_first(),
        }
    }

    /// Deselects everything and resets the primary row and focus.
    pub fn clear_selection(&mut self) {
        tracing::trace!(target: targets::SELECTION, "clear selection");
        self.indices.clear_all();
        self.update_primary(None);
        self.focus.clear_focus();
    }

    /// Deselects `index`. Deselecting the last selected row clears the
    /// selection entirely.
    pub fn clear_selection_at(&mut self, index: usize) {
        if !self.indices.is_selected(index) {
            return;
        }
        self.indices.clear(index);
        if self.indices.is_empty() {
            self.clear_selection();
        }
    }

    // =========================================================================
    // Data Changes
    // =========================================================================

    /// Adjusts the selection after rows were inserted or removed.
    ///
    /// Selected rows are relocated as one batch and the primary row follows
    /// the sum of the deltas at or below it. If no selected row moved, the
    /// new primary row is selected again so listeners see the change.
    pub fn reconcile_shift(&mut self, records: &[ShiftRecord]) {
        if !records.iter().any(ShiftRecord::is_effective) {
            return;
        }
        let _span = PerfSpan::new("reconcile_shift");

        self.indices.begin_atomic();
        let moved = self.indices.shift(records);
        let count = self.item_count();
        self.focus.reconcile_shift(records, count);

        if let Some(old) = self.selected_index {
            let new = shifted_index(old, records);
            tracing::debug!(target: targets::SELECTION, old, new, moved, "reconciled primary index");
            if new >= count {
                self.update_primary(None);
            } else if moved {
                self.update_primary(Some(new));
            } else {
                self.select(new);
            }
        }
        self.indices.end_atomic();
    }

    /// Updates the selection after a change of the source list.
    ///
    /// Removed rows are deselected and the remaining rows shifted in one
    /// batch; permutations move the selection with the rows; a reset clears
    /// it.
    pub fn handle_list_change(&mut self, change: &ListChange) {
        match change {
            ListChange::Inserted { .. } => self.reconcile_shift(&change.shift_records()),
            ListChange::Removed { from, count } => {
                self.indices.begin_atomic();
                self.indices.set_range(*from, from.saturating_add(*count), false);
                self.reconcile_shift(&change.shift_records());
                self.indices.end_atomic();
            }
            ListChange::Replaced { index } => {
                if self.selected_index == Some(*index) {
                    let item = self.source.item_at(*index);
                    self.set_primary_item(item);
                }
            }
            ListChange::Permuted { permutation } => {
                self.indices.remap(permutation);
                self.focus.remap(permutation);
                if let Some(old) = self.selected_index
                    && let Some(&new) = permutation.get(old)
                {
                    self.set_primary_index(Some(new));
                }
            }
            ListChange::Reset => self.clear_selection(),
        }
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    /// Points the primary selection at `index`, refreshing the item only
    /// when it differs from the current one.
    fn update_primary(&mut self, index: Option<usize>) {
        self.set_primary_index(index);
        let item = index.and_then(|i| self.source.item_at(i));
        self.set_primary_item(item);
    }

    fn set_primary_index(&mut self, index: Option<usize>) {
        if self.selected_index != index {
            self.selected_index = index;
            self.selected_index_changed.emit(index);
        }
    }

    fn set_primary_item(&mut self, item: Option<T>) {
        if !self.same_item(self.selected_item.as_ref(), item.as_ref()) {
            self.selected_item = item.clone();
            self.selected_item_changed.emit(item);
        }
    }

    fn same_item(&self, a: Option<&T>, b: Option<&T>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => (self.item_eq)(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

/// Notifications queued by [`MultipleSelectionModel::hold_notifications`].
///
/// [`emit`](Self::emit) delivers them in the order a listener expects:
/// focus, selected rows, primary index, primary item.
#[must_use = "queued notifications are lost unless emitted"]
pub struct PendingNotifications<T> {
    focus: Deferred<Option<usize>>,
    indices: Deferred<SelectionChange>,
    index: Deferred<Option<usize>>,
    item: Deferred<Option<T>>,
}

impl<T> PendingNotifications<T> {
    /// Returns `true` if nothing was queued.
    pub fn is_empty(&self) -> bool {
        self.focus.is_empty()
            && self.indices.is_empty()
            && self.index.is_empty()
            && self.item.is_empty()
    }

    /// Delivers the queued notifications.
    pub fn emit(self) {
        self.focus.emit();
        self.indices.emit();
        self.index.emit();
        self.item.emit();
    }
}

impl<T> fmt::Debug for PendingNotifications<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingNotifications")
            .field("focus", &self.focus)
            .field("indices", &self.indices)
            .field("index", &self.index)
            .field("item", &self.item)
            .finish()
    }
}

impl<T: fmt::Debug> fmt::Debug for MultipleSelectionModel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipleSelectionModel")
            .field("mode", &self.mode)
            .field("indices", &self.indices)
            .field("selected_index", &self.selected_index)
            .field("selected_item", &self.selected_item)
            .field("focus", &self.focus)
            .finish()
    }
}

static_assertions::assert_impl_all!(MultipleSelectionModel<String>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn letters(count: usize) -> Arc<dyn ItemSource<String>> {
        Arc::new(
            (0..count)
                .map(|i| char::from(b'A' + (i % 26) as u8).to_string())
                .collect::<Vec<_>>(),
        )
    }

    fn model(count: usize, mode: SelectionMode) -> MultipleSelectionModel<String> {
        MultipleSelectionModel::builder()
            .source(letters(count))
            .mode(mode)
            .build()
            .unwrap()
    }

    fn change_recorder(model: &MultipleSelectionModel<String>) -> Arc<Mutex<Vec<SelectionChange>>> {
        let changes = Arc::new(Mutex::new(Vec::new()));
        let changes_clone = changes.clone();
        model
            .index_set()
            .changed
            .connect(move |change| changes_clone.lock().push(change.clone()));
        changes
    }

    #[test]
    fn test_builder_requires_source() {
        let result = SelectionModelBuilder::<String>::new().build();
        assert!(matches!(
            result,
            Err(TrellisError::MissingCollaborator("item source"))
        ));
    }

    #[test]
    fn test_select_sets_primary_and_focus() {
        let mut model = model(10, SelectionMode::Single);
        model.select(4);

        assert_eq!(model.selected_index(), Some(4));
        assert_eq!(model.selected_item(), Some("E".to_string()));
        assert_eq!(model.focused_index(), Some(4));
        assert!(model.is_selected(4));
    }

    #[test]
    fn test_select_out_of_range_is_ignored() {
        let mut model = model(3, SelectionMode::Single);
        model.select(1);
        model.select(3);
        model.select(usize::MAX);
        assert_eq!(model.selected_indices(), vec![1]);
    }

    #[test]
    fn test_focus_moves_before_selection_fires() {
        let mut model = model(5, SelectionMode::Single);
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_clone = order.clone();
        model
            .focus_model()
            .focused_index_changed
            .connect(move |_| order_clone.lock().push("focus"));
        let order_clone = order.clone();
        model
            .index_set()
            .changed
            .connect(move |_| order_clone.lock().push("selection"));
        let order_clone = order.clone();
        model
            .selected_index_changed
            .connect(move |_| order_clone.lock().push("index"));

        model.select(2);
        assert_eq!(*order.lock(), vec!["focus", "selection", "index"]);
    }

    #[test]
    fn test_single_mode_replaces_selection_in_one_change() {
        let mut model = model(10, SelectionMode::Single);
        model.select(1);
        let changes = change_recorder(&model);

        model.select(6);

        assert_eq!(model.selected_indices(), vec![6]);
        let changes = changes.lock();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].added_indices(), vec![6]);
        assert_eq!(changes[0].removed_indices(), vec![1]);
    }

    #[test]
    fn test_reselecting_same_row_does_not_renotify_item() {
        let mut model = model(5, SelectionMode::Single);
        let notified = Arc::new(AtomicUsize::new(0));
        let notified_clone = notified.clone();
        model.selected_item_changed.connect(move |_| {
            notified_clone.fetch_add(1, Ordering::SeqCst);
        });

        model.select(2);
        model.select(2);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_select_item_found_and_phantom() {
        let mut model = model(5, SelectionMode::Single);
        model.select_item(&"C".to_string());
        assert_eq!(model.selected_index(), Some(2));

        model.select_item(&"Z".to_string());
        assert_eq!(model.selected_index(), None);
        assert_eq!(model.selected_item(), Some("Z".to_string()));
    }

    #[test]
    fn test_clear_and_select_short_circuits() {
        let mut model = model(10, SelectionMode::Multiple);
        model.select_indices(1, &[2, 3]);
        let changes = change_recorder(&model);

        model.clear_and_select(5);
        model.clear_and_select(5);

        assert_eq!(model.selected_indices(), vec![5]);
        let changes = changes.lock();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].removed_indices(), vec![1, 2, 3]);
        assert_eq!(changes[0].added_indices(), vec![5]);
    }

    #[test]
    fn test_select_indices_single_mode_takes_last_valid() {
        let mut model = model(10, SelectionMode::Single);
        model.select_indices(750_397, &[3, 709_709_375, 4, 8_597_998, 47_929]);

        assert_eq!(model.selected_index(), Some(4));
        assert!(!model.is_selected(3));
        assert_eq!(model.selected_count(), 1);
    }

    #[test]
    fn test_select_indices_multiple_mode_skips_invalid() {
        let mut model = model(10, SelectionMode::Multiple);
        model.select_indices(750_397, &[3, 709_709_375, 4, 8_597_998, 47_929]);

        assert_eq!(model.selected_indices(), vec![3, 4]);
        assert_eq!(model.selected_index(), Some(4));
        assert_eq!(model.selected_items(), vec!["D".to_string(), "E".to_string()]);
    }

    #[test]
    fn test_select_indices_all_invalid_is_noop() {
        let mut model = model(10, SelectionMode::Multiple);
        model.select_indices(20, &[23_505, 78_125]);
        assert!(model.is_empty());
        assert_eq!(model.selected_index(), None);
        assert_eq!(model.selected_item(), None);
    }

    #[test]
    fn test_primary_is_last_in_argument_order() {
        let mut model = model(10, SelectionMode::Multiple);
        model.select_indices(8, &[7, 6]);
        assert_eq!(model.selected_index(), Some(6));
        assert_eq!(model.focused_index(), Some(6));
    }

    #[test]
    fn test_select_range() {
        let mut model = model(20, SelectionMode::Multiple);
        model.select_range(3, 10);
        assert_eq!(model.selected_indices(), (3..10).collect::<Vec<_>>());
        assert_eq!(model.selected_index(), Some(9));

        model.clear_selection();
        model.select_range(10, 3);
        assert_eq!(model.selected_indices(), (4..=10).collect::<Vec<_>>());
        assert_eq!(model.selected_index(), Some(4));

        model.select_range(6, 6);
        assert_eq!(model.selected_count(), 7);
    }

    #[test]
    fn test_select_all() {
        let mut single = model(5, SelectionMode::Single);
        single.select_all();
        assert!(single.is_empty());

        let mut multiple = model(5, SelectionMode::Multiple);
        multiple.select_all();
        assert_eq!(multiple.selected_count(), 5);
        assert_eq!(multiple.selected_index(), Some(4));

        let mut focused = model(5, SelectionMode::Multiple);
        focused.focus_model_mut().focus(Some(1));
        focused.select_all();
        assert_eq!(focused.selected_index(), Some(1));
    }

    #[test]
    fn test_relative_navigation_follows_focus() {
        let mut model = model(3, SelectionMode::Single);
        model.select_next();
        assert_eq!(model.selected_index(), Some(0));

        model.focus_model_mut().focus(Some(1));
        model.select_next();
        assert_eq!(model.selected_index(), Some(2));

        // Bounded at the end.
        model.select_next();
        assert_eq!(model.selected_index(), Some(2));

        model.select_first();
        model.select_previous();
        assert_eq!(model.selected_index(), Some(0));

        model.select_last();
        model.select_previous();
        assert_eq!(model.selected_index(), Some(1));
        assert_eq!(model.selected_count(), 1);
    }

    #[test]
    fn test_clear_selection_at_last_row_clears_everything() {
        let mut model = model(10, SelectionMode::Multiple);
        model.select_indices(2, &[5]);

        model.clear_selection_at(2);
        assert_eq!(model.selected_index(), Some(5));
        assert_eq!(model.selected_indices(), vec![5]);

        model.clear_selection_at(5);
        assert!(model.is_empty());
        assert_eq!(model.selected_index(), None);
        assert_eq!(model.selected_item(), None);
        assert_eq!(model.focused_index(), None);
    }

    #[test]
    fn test_switch_to_single_keeps_primary() {
        let mut model = model(20, SelectionMode::Multiple);
        model.select_indices(5, &[10, 15]);
        model.set_selection_mode(SelectionMode::Single);

        assert_eq!(model.selected_indices(), vec![15]);
        assert_eq!(model.selected_index(), Some(15));
    }

    #[test]
    fn test_reconcile_shift_moves_primary_with_bits() {
        let mut model = model(10, SelectionMode::Single);
        model.select(4);
        let changes = change_recorder(&model);

        model.reconcile_shift(&[ShiftRecord::new(0, -2)]);

        assert_eq!(model.selected_index(), Some(2));
        assert!(model.is_selected(2));
        assert!(!model.is_selected(4));
        assert_eq!(model.focused_index(), Some(2));
        assert_eq!(changes.lock().len(), 1);
    }

    #[test]
    fn test_reconcile_noop_shift_changes_nothing() {
        let mut model = model(10, SelectionMode::Single);
        model.select(4);
        let changes = change_recorder(&model);

        model.reconcile_shift(&[ShiftRecord::new(3, 0)]);

        assert_eq!(model.selected_indices(), vec![4]);
        assert_eq!(model.selected_index(), Some(4));
        assert!(changes.lock().is_empty());
    }

    #[test]
    fn test_reconcile_without_moved_bits_reselects() {
        let mut model = model(10, SelectionMode::Multiple);
        model.select_indices(5, &[8]);
        model.clear_selection_at(8);
        assert_eq!(model.selected_index(), Some(8));

        // Row 7 removed: no selected bit sits at or above it, so the new
        // primary row is driven through `select`.
        model.reconcile_shift(&[ShiftRecord::new(7, -1)]);

        assert_eq!(model.selected_index(), Some(7));
        assert_eq!(model.selected_indices(), vec![5, 7]);
        assert_eq!(model.focused_index(), Some(7));
    }

    #[test]
    fn test_handle_removal_of_selected_rows() {
        let mut model = model(10, SelectionMode::Multiple);
        model.select_indices(2, &[5, 9]);
        let changes = change_recorder(&model);

        model.handle_list_change(&ListChange::Removed { from: 3, count: 3 });

        assert_eq!(model.selected_indices(), vec![2, 6]);
        assert_eq!(model.selected_index(), Some(6));
        assert_eq!(changes.lock().len(), 1);
    }

    #[test]
    fn test_handle_permutation_and_reset() {
        let mut model = model(3, SelectionMode::Single);
        model.select(0);

        model.handle_list_change(&ListChange::Permuted {
            permutation: vec![2, 0, 1],
        });
        assert_eq!(model.selected_indices(), vec![2]);
        assert_eq!(model.selected_index(), Some(2));
        assert_eq!(model.focused_index(), Some(2));

        model.handle_list_change(&ListChange::Reset);
        assert!(model.is_empty());
        assert_eq!(model.selected_index(), None);
    }

    #[derive(Clone)]
    struct Node {
        id: u32,
        label: &'static str,
    }

    #[test]
    fn test_rows_without_partial_eq_use_item_eq() {
        let rows = vec![
            Node { id: 1, label: "one" },
            Node { id: 2, label: "two" },
            Node { id: 3, label: "three" },
        ];
        let mut model =
            MultipleSelectionModel::<Node>::with_item_eq(Arc::new(rows), |a: &Node, b: &Node| a.id == b.id);

        model.select_item(&Node { id: 2, label: "renamed" });
        assert_eq!(model.selected_index(), Some(1));
        assert_eq!(model.selected_item().map(|n| n.label), Some("two"));

        let items = Arc::new(AtomicUsize::new(0));
        let items_clone = items.clone();
        model.selected_item_changed.connect(move |_| {
            items_clone.fetch_add(1, Ordering::SeqCst);
        });
        model.clear_and_select(1);
        assert_eq!(items.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_identity_rows_ignore_equal_values() {
        let rows: Vec<Arc<String>> = vec![Arc::new("a".to_string()), Arc::new("b".to_string())];
        let first = rows[0].clone();
        let mut model = MultipleSelectionModel::<Arc<String>>::by_identity(Arc::new(rows));

        model.select_item(&Arc::new("a".to_string()));
        assert_eq!(model.selected_index(), None);
        assert!(model.is_empty());

        model.select_item(&first);
        assert_eq!(model.selected_index(), Some(0));
        assert!(model.selected_item().is_some_and(|row| Arc::ptr_eq(&row, &first)));
    }

    #[test]
    fn test_builder_with_item_eq() {
        let rows = vec![Node { id: 7, label: "seven" }];
        let mut model = SelectionModelBuilder::<Node>::with_item_eq(|a: &Node, b: &Node| a.id == b.id)
            .source(Arc::new(rows))
            .mode(SelectionMode::Multiple)
            .build()
            .unwrap();

        assert_eq!(model.selection_mode(), SelectionMode::Multiple);
        model.select_item(&Node { id: 7, label: "" });
        assert_eq!(model.selected_index(), Some(0));
    }

    #[test]
    fn test_held_notifications_emit_in_order_on_release() {
        let mut model = model(5, SelectionMode::Single);
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_clone = order.clone();
        model
            .focus_model()
            .focused_index_changed
            .connect(move |_| order_clone.lock().push("focus"));
        let order_clone = order.clone();
        model
            .index_set()
            .changed
            .connect(move |_| order_clone.lock().push("indices"));
        let order_clone = order.clone();
        model
            .selected_index_changed
            .connect(move |_| order_clone.lock().push("index"));
        let order_clone = order.clone();
        model
            .selected_item_changed
            .connect(move |_| order_clone.lock().push("item"));

        model.hold_notifications();
        model.select(2);
        assert!(order.lock().is_empty());

        let pending = model.release_notifications();
        assert!(!pending.is_empty());
        pending.emit();
        assert_eq!(*order.lock(), vec!["focus", "indices", "index", "item"]);

        assert!(model.release_notifications().is_empty());
        model.select(3);
        assert_eq!(order.lock().len(), 8);
    }
}
