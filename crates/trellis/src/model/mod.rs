//! Selection and data layer for item views.
//!
//! This module provides the row-level state a virtualized view keeps in sync
//! with its data:
//!
//! - `SelectionIndexSet`: a bitset of selected rows with rank queries,
//!   atomic batching and shift reconciliation
//! - `MultipleSelectionModel`: single/multiple selection with a primary row
//! - `FocusModel`: the keyboard cursor
//! - `ObservableList`: the backing rows, publishing `ListChange`s
//! - `ItemSource`: the read-only data accessor every component consumes
//!
//! # Architecture Overview
//!
//! ```text
//! ┌────────────────┐ ListChange ┌────────────────────────┐
//! │ ObservableList │───────────>│ MultipleSelectionModel │
//! │  (ItemSource)  │            │  SelectionIndexSet     │
//! └────────────────┘            │  FocusModel            │
//!         │                     └────────────────────────┘
//!         │ item_at                        │ is_selected
//!         v                                v
//! ┌──────────────────────────────────────────────────────┐
//! │                  cells (crate::cell)                 │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Data changes reach the selection model before cells re-pull their items,
//! so a cell never observes a selection that refers to pre-change indices.

mod focus;
mod index_set;
mod list;
pub mod selection;
mod source;

pub use focus::FocusModel;
pub(crate) use focus::shifted_index;
pub use index_set::{Iter, SelectionChange, SelectionIndexSet, ShiftRecord, SubChange};
pub use list::{DepthFn, ListChange, ObservableList};
pub use selection::{
    ItemEq, MultipleSelectionModel, PendingNotifications, SelectionMode, SelectionModelBuilder,
};
pub use source::ItemSource;
