//! Focus model: the keyboard cursor of an item view.
//!
//! The focused index is tracked separately from selection. Selection
//! operations move focus before they change the selection so that listeners
//! of either signal see a consistent cursor.

use trellis_core::Signal;
use trellis_core::logging::targets;

use super::index_set::ShiftRecord;

/// Tracks the focused row of a control.
///
/// # Signals
///
/// - `focused_index_changed`: emitted with the new focused index
#[derive(Debug, Default)]
pub struct FocusModel {
    focused: Option<usize>,

    /// Emitted when the focused index changes. Args: the new index.
    pub focused_index_changed: Signal<Option<usize>>,
}

impl FocusModel {
    /// Creates a focus model with nothing focused.
    pub fn new() -> Self {
        Self::default()
    }

    /// The focused index, if any.
    pub fn focused_index(&self) -> Option<usize> {
        self.focused
    }

    /// Returns `true` if `index` is focused.
    pub fn is_focused(&self, index: usize) -> bool {
        self.focused == Some(index)
    }

    /// Focuses `index`, or clears focus with `None`.
    pub fn focus(&mut self, index: Option<usize>) {
        if self.focused == index {
            return;
        }
        self.focused = index;
        tracing::trace!(target: targets::SELECTION, ?index, "focus moved");
        self.focused_index_changed.emit(index);
    }

    /// Clears focus.
    pub fn clear_focus(&mut self) {
        self.focus(None);
    }

    /// Moves focus one row down, if there is a row below.
    pub fn focus_next(&mut self, item_count: usize) {
        let next = self.focused.map_or(0, |index| index + 1);
        if next < item_count {
            self.focus(Some(next));
        }
    }

    /// Moves focus one row up, if there is a row above.
    pub fn focus_previous(&mut self, item_count: usize) {
        match self.focused {
            Some(index) if index > 0 && index - 1 < item_count => self.focus(Some(index - 1)),
            None if item_count > 0 => self.focus(Some(0)),
            _ => {}
        }
    }

    /// Follows the focused row through a batch of index shifts.
    ///
    /// Focus is dropped if the adjusted index is no longer within
    /// `item_count`.
    pub fn reconcile_shift(&mut self, records: &[ShiftRecord], item_count: usize) {
        let Some(old) = self.focused else {
            return;
        };
        let new = shifted_index(old, records);
        self.focus((new < item_count).then_some(new));
    }

    /// Follows the focused row through a permutation (`permutation[old] == new`).
    pub fn remap(&mut self, permutation: &[usize]) {
        if let Some(old) = self.focused
            && let Some(&new) = permutation.get(old)
        {
            self.focus(Some(new));
        }
    }
}

/// Applies the deltas of every effective record at or below `index`,
/// clamping the result at zero.
pub(crate) fn shifted_index(index: usize, records: &[ShiftRecord]) -> usize {
    let origin = isize::try_from(index).unwrap_or(isize::MAX);
    let delta: isize = records
        .iter()
        .filter(|r| r.is_effective() && r.position <= origin)
        .map(|r| r.delta)
        .sum();
    usize::try_from(origin.saturating_add(delta)).unwrap_or(0)
}
