//! Columns: the (row, column) to value binding of table cells.
//!
//! A [`Column`] resolves an [`ObservableValue`] for a row through its cell
//! value factory and routes edit events back to the data. Cells that have
//! no column of their own (list and tree cells) use a column as their value
//! binding as well; its identity and visibility are then ignored.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use trellis::cell::Column;
//! use trellis::ObservableValue;
//!
//! struct Person {
//!     name: Arc<ObservableValue<String>>,
//! }
//!
//! let column = Column::new("Name")
//!     .with_cell_value_factory(|person: &Person| Some(person.name.clone()));
//!
//! let ada = Person { name: Arc::new(ObservableValue::new("Ada".to_string())) };
//! assert_eq!(column.cell_data(&ada), Some("Ada".to_string()));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use trellis_core::logging::targets;
use trellis_core::{ObservableValue, Property, Signal};

use crate::model::ItemSource;

/// Identifies a column within a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnId(u64);

impl ColumnId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Resolves the observable value shown for a row.
pub type CellValueFactory<S, T> = Arc<dyn Fn(&S) -> Option<Arc<ObservableValue<T>>> + Send + Sync>;

/// The kind of a [`CellEditEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditEventKind {
    /// Editing started.
    Start,
    /// Editing finished with a new value.
    Commit,
    /// Editing was cancelled.
    Cancel,
}

/// An edit transition of one cell.
pub struct CellEditEvent<S, T> {
    /// What happened.
    pub kind: EditEventKind,
    /// Row index of the edited cell.
    pub index: usize,
    /// Column of the edited cell.
    pub column: ColumnId,
    /// The edited row.
    pub row: Arc<S>,
    /// Value shown before the edit.
    pub old_value: Option<T>,
    /// Committed value (only for [`EditEventKind::Commit`]).
    pub new_value: Option<T>,
}

impl<S, T: Clone> Clone for CellEditEvent<S, T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            index: self.index,
            column: self.column,
            row: self.row.clone(),
            old_value: self.old_value.clone(),
            new_value: self.new_value.clone(),
        }
    }
}

impl<S, T: fmt::Debug> fmt::Debug for CellEditEvent<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellEditEvent")
            .field("kind", &self.kind)
            .field("index", &self.index)
            .field("column", &self.column)
            .field("old_value", &self.old_value)
            .field("new_value", &self.new_value)
            .finish()
    }
}

/// What a column does with a committed value.
pub enum EditCommitHandler<S, T> {
    /// Write the value into the row's observable value, if it is writable.
    Default,
    /// Hand the event to a callback.
    Custom(Arc<dyn Fn(&CellEditEvent<S, T>) + Send + Sync>),
    /// Drop the value.
    Disabled,
}

impl<S, T> Clone for EditCommitHandler<S, T> {
    fn clone(&self) -> Self {
        match self {
            Self::Default => Self::Default,
            Self::Custom(handler) => Self::Custom(handler.clone()),
            Self::Disabled => Self::Disabled,
        }
    }
}

impl<S, T> fmt::Debug for EditCommitHandler<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Custom(_) => f.write_str("Custom(..)"),
            Self::Disabled => f.write_str("Disabled"),
        }
    }
}

/// A column of a table-like control.
///
/// # Signals
///
/// - `edit_started`: a cell of this column entered edit mode
/// - `edit_committed`: a commit was handled
/// - `edit_cancelled`: a cell of this column left edit mode without a value
/// - `visible_changed`: the column was shown or hidden
pub struct Column<S, T> {
    id: ColumnId,
    text: Property<String>,
    visible: Property<bool>,
    editable: Property<bool>,
    factory: RwLock<Option<CellValueFactory<S, T>>>,
    source: RwLock<Option<Weak<dyn ItemSource<Arc<S>>>>>,
    commit_handler: RwLock<EditCommitHandler<S, T>>,

    /// Emitted when a cell of this column starts editing.
    pub edit_started: Signal<CellEditEvent<S, T>>,
    /// Emitted after a commit was handled.
    pub edit_committed: Signal<CellEditEvent<S, T>>,
    /// Emitted when a cell of this column cancels editing.
    pub edit_cancelled: Signal<CellEditEvent<S, T>>,
    /// Emitted when visibility changes.
    pub visible_changed: Signal<bool>,
}

impl<S, T> Column<S, T>
where
    S: Send + Sync + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Creates a visible, editable column without a value factory.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: ColumnId::next(),
            text: Property::new(text.into()),
            visible: Property::new(true),
            editable: Property::new(true),
            factory: RwLock::new(None),
            source: RwLock::new(None),
            commit_handler: RwLock::new(EditCommitHandler::Default),
            edit_started: Signal::new(),
            edit_committed: Signal::new(),
            edit_cancelled: Signal::new(),
            visible_changed: Signal::new(),
        }
    }

    /// Sets the cell value factory.
    pub fn with_cell_value_factory<F>(self, factory: F) -> Self
    where
        F: Fn(&S) -> Option<Arc<ObservableValue<T>>> + Send + Sync + 'static,
    {
        self.set_cell_value_factory(factory);
        self
    }

    /// Sets the edit commit handler.
    pub fn with_on_edit_commit(self, handler: EditCommitHandler<S, T>) -> Self {
        self.set_on_edit_commit(handler);
        self
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// The column's identity.
    pub fn id(&self) -> ColumnId {
        self.id
    }

    /// The header text.
    pub fn text(&self) -> String {
        self.text.get()
    }

    /// Sets the header text.
    pub fn set_text(&self, text: impl Into<String>) {
        self.text.set(text.into());
    }

    /// Returns `true` if the column is shown.
    pub fn is_visible(&self) -> bool {
        self.visible.get()
    }

    /// Shows or hides the column.
    pub fn set_visible(&self, visible: bool) {
        if self.visible.set(visible) {
            self.visible_changed.emit(visible);
        }
    }

    /// Returns `true` if cells of this column may be edited.
    pub fn is_editable(&self) -> bool {
        self.editable.get()
    }

    /// Sets whether cells of this column may be edited.
    pub fn set_editable(&self, editable: bool) {
        self.editable.set(editable);
    }

    /// Replaces the cell value factory.
    pub fn set_cell_value_factory<F>(&self, factory: F)
    where
        F: Fn(&S) -> Option<Arc<ObservableValue<T>>> + Send + Sync + 'static,
    {
        *self.factory.write() = Some(Arc::new(factory));
    }

    /// Replaces the edit commit handler.
    pub fn set_on_edit_commit(&self, handler: EditCommitHandler<S, T>) {
        *self.commit_handler.write() = handler;
    }

    /// Attaches the column to the rows it reads by index.
    pub fn attach(&self, source: Weak<dyn ItemSource<Arc<S>>>) {
        *self.source.write() = Some(source);
    }

    /// Detaches the column from its rows.
    pub fn detach(&self) {
        *self.source.write() = None;
    }

    // =========================================================================
    // Value Resolution
    // =========================================================================

    /// The observable value for `row`, or `None` without a factory.
    pub fn cell_observable_value(&self, row: &S) -> Option<Arc<ObservableValue<T>>> {
        let factory = self.factory.read().clone()?;
        factory(row)
    }

    /// The observable value for the row at `index`.
    ///
    /// `None` if the column is not attached, its rows are gone, or the index
    /// is out of range.
    pub fn cell_observable_value_at(&self, index: usize) -> Option<Arc<ObservableValue<T>>> {
        let source = self.source.read().as_ref()?.upgrade()?;
        let row = source.item_at(index)?;
        self.cell_observable_value(&row)
    }

    /// The current value for `row`.
    pub fn cell_data(&self, row: &S) -> Option<T> {
        self.cell_observable_value(row).map(|value| value.get())
    }

    /// The current value for the row at `index`.
    pub fn cell_data_at(&self, index: usize) -> Option<T> {
        self.cell_observable_value_at(index).map(|value| value.get())
    }

    // =========================================================================
    // Edit Events
    // =========================================================================

    pub(crate) fn fire_edit_started(&self, event: CellEditEvent<S, T>) {
        self.edit_started.emit(event);
    }

    pub(crate) fn fire_edit_cancelled(&self, event: CellEditEvent<S, T>) {
        self.edit_cancelled.emit(event);
    }

    /// Runs the commit handler for `event`, then emits `edit_committed`.
    pub(crate) fn commit(&self, event: CellEditEvent<S, T>) {
        let handler = self.commit_handler.read().clone();
        match handler {
            EditCommitHandler::Default => self.write_back(&event),
            EditCommitHandler::Custom(handler) => handler(&event),
            EditCommitHandler::Disabled => {}
        }
        self.edit_committed.emit(event);
    }

    fn write_back(&self, event: &CellEditEvent<S, T>) {
        let Some(value) = event.new_value.clone() else {
            return;
        };
        let Some(target) = self.cell_observable_value(&event.row) else {
            return;
        };
        if !target.is_writable() {
            tracing::debug!(target: targets::CELL, index = event.index, "commit target is read-only");
            return;
        }
        if let Err(err) = target.set(value) {
            tracing::debug!(target: targets::CELL, %err, "commit write-back failed");
        }
    }
}

impl<S, T> fmt::Debug for Column<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("id", &self.id)
            .field("text", &self.text.get())
            .field("visible", &self.visible.get())
            .field("editable", &self.editable.get())
            .finish()
    }
}

static_assertions::assert_impl_all!(Column<String, String>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ObservableList;
    use parking_lot::Mutex;

    struct Person {
        name: Arc<ObservableValue<String>>,
        id: Arc<ObservableValue<u32>>,
    }

    fn person(name: &str, id: u32) -> Arc<Person> {
        Arc::new(Person {
            name: Arc::new(ObservableValue::new(name.to_string())),
            id: Arc::new(ObservableValue::read_only(id)),
        })
    }

    fn name_column() -> Column<Person, String> {
        Column::new("Name").with_cell_value_factory(|p: &Person| Some(p.name.clone()))
    }

    fn commit_event(row: Arc<Person>, value: &str) -> CellEditEvent<Person, String> {
        CellEditEvent {
            kind: EditEventKind::Commit,
            index: 0,
            column: ColumnId(0),
            row,
            old_value: None,
            new_value: Some(value.to_string()),
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let a: Column<Person, String> = Column::new("A");
        let b: Column<Person, String> = Column::new("B");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_no_factory_means_no_value() {
        let column: Column<Person, String> = Column::new("Name");
        assert!(column.cell_observable_value(&person("Ada", 1)).is_none());
    }

    #[test]
    fn test_value_at_index_requires_attachment() {
        let column = name_column();
        let rows = Arc::new(ObservableList::new(vec![person("Ada", 1), person("Grace", 2)]));
        assert!(column.cell_data_at(0).is_none());

        let source: Arc<dyn ItemSource<Arc<Person>>> = rows.clone();
        column.attach(Arc::downgrade(&source));
        assert_eq!(column.cell_data_at(1), Some("Grace".to_string()));
        assert!(column.cell_data_at(2).is_none());

        drop(source);
        drop(rows);
        assert!(column.cell_data_at(0).is_none());
    }

    #[test]
    fn test_default_commit_writes_back() {
        let column = name_column();
        let row = person("Ada", 1);
        column.commit(commit_event(row.clone(), "Lovelace"));
        assert_eq!(row.name.get(), "Lovelace");
    }

    #[test]
    fn test_default_commit_skips_read_only_values() {
        let column: Column<Person, u32> =
            Column::new("Id").with_cell_value_factory(|p: &Person| Some(p.id.clone()));
        let row = person("Ada", 1);
        column.commit(CellEditEvent {
            kind: EditEventKind::Commit,
            index: 0,
            column: column.id(),
            row: row.clone(),
            old_value: Some(1),
            new_value: Some(7),
        });
        assert_eq!(row.id.get(), 1);
    }

    #[test]
    fn test_custom_and_disabled_handlers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let column = name_column().with_on_edit_commit(EditCommitHandler::Custom(Arc::new(
            move |event: &CellEditEvent<Person, String>| {
                seen_clone.lock().push(event.new_value.clone());
            },
        )));
        let row = person("Ada", 1);

        column.commit(commit_event(row.clone(), "X"));
        assert_eq!(*seen.lock(), vec![Some("X".to_string())]);
        assert_eq!(row.name.get(), "Ada");

        column.set_on_edit_commit(EditCommitHandler::Disabled);
        column.commit(commit_event(row.clone(), "Y"));
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(row.name.get(), "Ada");
    }

    #[test]
    fn test_visibility_signal() {
        let column = name_column();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        column
            .visible_changed
            .connect(move |&visible| seen_clone.lock().push(visible));

        column.set_visible(false);
        column.set_visible(false);
        column.set_visible(true);
        assert_eq!(*seen.lock(), vec![false, true]);
    }
}
