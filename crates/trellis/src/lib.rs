//! Trellis - selection models and recyclable cells for virtualized item views.
//!
//! This is the main crate. It re-exports the core systems of `trellis-core`
//! (signals, observable values, errors) and adds:
//!
//! - [`model`]: selection index set, selection and focus models, observable
//!   row lists
//! - [`cell`]: the cell state machine, index-driven list/table/tree cells,
//!   columns and cell pools
//! - [`table`]: the control that hosts cells and keeps selection and editing
//!   in sync with its rows
//! - [`config`]: TOML view configuration
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use trellis::ObservableValue;
//! use trellis::cell::{CellPool, CellVariant, Column};
//! use trellis::model::ObservableList;
//! use trellis::table::TableControl;
//!
//! struct Task {
//!     title: Arc<ObservableValue<String>>,
//! }
//!
//! let rows = Arc::new(ObservableList::new(
//!     ["write", "review", "ship"]
//!         .iter()
//!         .map(|t| Arc::new(Task { title: Arc::new(ObservableValue::new(t.to_string())) }))
//!         .collect(),
//! ));
//! let table = TableControl::new(rows.clone());
//! let title = Arc::new(Column::new("Title").with_cell_value_factory(|t: &Task| Some(t.title.clone())));
//! table.add_column(&title);
//!
//! let mut cells = CellPool::new(CellVariant::Table, 2, title, table.host(), || ());
//! cells.scroll_to(0);
//! table.select(1);
//! cells.refresh();
//!
//! let cell = cells.cell_for_index(1).unwrap();
//! assert_eq!(cell.item().map(String::as_str), Some("review"));
//! assert!(cell.is_selected());
//! ```

pub use trellis_core::*;

pub mod cell;
pub mod config;
pub mod model;
pub mod table;
