//! Recyclable cell state machine.

use std::fmt;

use trellis_core::logging::targets;

/// Content hooks of a cell.
///
/// The cell calls these after its own state changed. All edit hooks default
/// to no-ops, so a content type only overrides what it renders.
pub trait CellContent<T: PartialEq>: Send + Sync {
    /// The cell now shows `item` (or nothing, if `empty`).
    fn update_item(&mut self, item: Option<&T>, empty: bool);

    /// Dirty check run before `update_item` when a cell is reused.
    ///
    /// Override to compare a stable key instead of full equality.
    fn is_item_changed(&self, old: Option<&T>, new: Option<&T>) -> bool {
        old != new
    }

    /// Editing started.
    fn start_edit(&mut self) {}

    /// Editing was cancelled.
    fn cancel_edit(&mut self) {}

    /// Editing finished with `value`.
    fn commit_edit(&mut self, _value: &T) {}
}

impl<T: PartialEq> CellContent<T> for () {
    fn update_item(&mut self, _item: Option<&T>, _empty: bool) {}
}

/// The coarse state of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellState {
    /// No item.
    Empty,
    /// Showing an item.
    Filled,
    /// Showing an item in edit mode.
    FilledEditing,
}

/// A reusable visual cell.
///
/// A cell is created once and then shows different items over its lifetime.
/// `update_item` is the only entry point that changes what it shows. An
/// empty cell is never selected, and editing can only start on a filled,
/// editable cell.
pub struct Cell<T, C> {
    item: Option<T>,
    empty: bool,
    selected: bool,
    focused: bool,
    editing: bool,
    editable: bool,
    has_input_focus: bool,
    /// Item requested for the next layout pass.
    pending: Option<(Option<T>, bool)>,
    content: C,
}

impl<T: Clone + PartialEq, C: CellContent<T>> Cell<T, C> {
    /// Creates an empty, editable cell.
    pub fn new(content: C) -> Self {
        Self {
            item: None,
            empty: true,
            selected: false,
            focused: false,
            editing: false,
            editable: true,
            has_input_focus: false,
            pending: None,
            content,
        }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// The item shown by this cell.
    pub fn item(&self) -> Option<&T> {
        self.item.as_ref()
    }

    /// Returns `true` if the cell shows no item.
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// Returns `true` if the cell is selected.
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Returns `true` if the cell is the focused cell of its control.
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Returns `true` while editing.
    pub fn is_editing(&self) -> bool {
        self.editing
    }

    /// Returns `true` if the cell may enter edit mode.
    pub fn is_editable(&self) -> bool {
        self.editable
    }

    /// Sets whether the cell may enter edit mode. Does not affect an edit in
    /// progress.
    pub fn set_editable(&mut self, editable: bool) {
        self.editable = editable;
    }

    /// Returns `true` if the cell has input focus.
    pub fn has_input_focus(&self) -> bool {
        self.has_input_focus
    }

    /// The derived state.
    pub fn state(&self) -> CellState {
        match (self.empty, self.editing) {
            (true, _) => CellState::Empty,
            (false, false) => CellState::Filled,
            (false, true) => CellState::FilledEditing,
        }
    }

    /// The content hooks.
    pub fn content(&self) -> &C {
        &self.content
    }

    /// Mutable access to the content hooks.
    pub fn content_mut(&mut self) -> &mut C {
        &mut self.content
    }

    /// Returns `true` if an item update is waiting for `layout`.
    pub fn is_dirty(&self) -> bool {
        self.pending.is_some()
    }

    // =========================================================================
    // State Transitions
    // =========================================================================

    /// Shows `item`, or nothing if `empty`. Becoming empty deselects the
    /// cell.
    pub fn update_item(&mut self, item: Option<T>, empty: bool) {
        self.pending = None;
        self.item = item;
        self.empty = empty;
        if empty && self.selected {
            self.selected = false;
        }
        self.content.update_item(self.item.as_ref(), empty);
    }

    /// Runs the dirty check of the content hooks.
    pub fn is_item_changed(&self, old: Option<&T>, new: Option<&T>) -> bool {
        self.content.is_item_changed(old, new)
    }

    /// Defers an item update to the next [`layout`](Self::layout).
    ///
    /// Only the last request before a layout pass is applied.
    pub fn request_item(&mut self, item: Option<T>, empty: bool) {
        self.pending = Some((item, empty));
    }

    /// Applies a pending item request if it differs from what is shown.
    ///
    /// Returns `true` if `update_item` ran.
    pub fn layout(&mut self) -> bool {
        let Some((item, empty)) = self.pending.take() else {
            return false;
        };
        if empty == self.empty && !self.is_item_changed(self.item.as_ref(), item.as_ref()) {
            return false;
        }
        self.update_item(item, empty);
        true
    }

    /// Enters edit mode. Returns `false` (and does nothing) unless the cell
    /// is editable, filled and not already editing.
    pub fn start_edit(&mut self) -> bool {
        if !self.editable || self.editing || self.empty {
            return false;
        }
        self.editing = true;
        tracing::trace!(target: targets::CELL, "edit started");
        self.content.start_edit();
        true
    }

    /// Leaves edit mode with `value`.
    ///
    /// Returns the value to route to the backing data, or `None` if the cell
    /// was not editing.
    pub fn commit_edit(&mut self, value: T) -> Option<T> {
        if !self.editing {
            return None;
        }
        self.editing = false;
        tracing::trace!(target: targets::CELL, "edit committed");
        self.content.commit_edit(&value);
        Some(value)
    }

    /// Leaves edit mode without a value. Returns `false` if the cell was not
    /// editing.
    pub fn cancel_edit(&mut self) -> bool {
        if !self.editing {
            return false;
        }
        self.editing = false;
        tracing::trace!(target: targets::CELL, "edit cancelled");
        self.content.cancel_edit();
        true
    }

    /// Sets the selected flag. Empty cells cannot be selected.
    pub fn update_selected(&mut self, selected: bool) {
        if selected && self.empty {
            return;
        }
        self.selected = selected;
    }

    /// Sets the focused flag.
    pub fn update_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    /// Tracks input focus. Losing focus while editing cancels the edit.
    pub fn on_input_focus_changed(&mut self, has_focus: bool) {
        self.has_input_focus = has_focus;
        if !has_focus && self.editing {
            self.cancel_edit();
        }
    }
}

impl<T: fmt::Debug, C> fmt::Debug for Cell<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("item", &self.item)
            .field("empty", &self.empty)
            .field("selected", &self.selected)
            .field("focused", &self.focused)
            .field("editing", &self.editing)
            .finish()
    }
}
