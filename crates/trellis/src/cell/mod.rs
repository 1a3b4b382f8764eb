//! Recyclable cells for virtualized item views.
//!
//! A view creates a small number of cells and reuses them while scrolling.
//! Each cell goes through the same protocol whenever its index changes:
//!
//! 1. release the old value binding
//! 2. resolve the row and column value, or become empty
//! 3. update the item (skipped when unchanged)
//! 4. sync selection, focus and edit state with the host
//!
//! # Components
//!
//! - [`Cell`]: the item/empty/selected/editing state machine
//! - [`IndexedCell`]: a cell driven by a row index, in list, table, tree and
//!   tree table flavors
//! - [`Column`]: maps a row to the observable value a cell shows and routes
//!   edit commits back
//! - [`CellPool`]: the cells of a scrolling window
//! - [`CellHost`]: what a cell needs from its control

mod base;
mod column;
mod indexed;
mod pool;

pub use base::{Cell, CellContent, CellState};
pub use column::{CellEditEvent, CellValueFactory, Column, ColumnId, EditCommitHandler, EditEventKind};
pub use indexed::{CancelMode, CellCapabilities, CellHost, CellVariant, EditTarget, IndexedCell};
pub use pool::CellPool;
