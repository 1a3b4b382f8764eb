//! Observable list of rows.
//!
//! `ObservableList<T>` is the backing collection of a control. Every
//! structural mutation is published as a [`ListChange`] on
//! [`ObservableList::changed`], which selection models and controls turn into
//! shift reconciliation.
//!
//! # Example
//!
//! ```
//! use trellis::model::{ListChange, ObservableList};
//!
//! let list = ObservableList::new(vec!["a", "b", "c"]);
//! list.changed.connect(|change| {
//!     if let ListChange::Removed { from, count } = change {
//!         println!("{count} rows removed at {from}");
//!     }
//! });
//! list.remove(0);
//! assert_eq!(list.to_vec(), vec!["b", "c"]);
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use trellis_core::logging::targets;
use trellis_core::{Result, Signal, TrellisError};

use super::index_set::ShiftRecord;
use super::source::ItemSource;

/// A structural change of an [`ObservableList`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListChange {
    /// `count` rows were inserted at `from`.
    Inserted {
        /// Index of the first inserted row.
        from: usize,
        /// Number of inserted rows.
        count: usize,
    },
    /// `count` rows were removed starting at `from`.
    Removed {
        /// Index the first removed row had.
        from: usize,
        /// Number of removed rows.
        count: usize,
    },
    /// The row at `index` was replaced in place.
    Replaced {
        /// Index of the replaced row.
        index: usize,
    },
    /// Rows were reordered. `permutation[old] == new`.
    Permuted {
        /// Old-to-new index mapping covering every row.
        permutation: Vec<usize>,
    },
    /// The whole content was replaced.
    Reset,
}

impl ListChange {
    /// Shift records describing how existing indices move.
    ///
    /// Only insertions and removals shift indices.
    pub fn shift_records(&self) -> Vec<ShiftRecord> {
        match *self {
            ListChange::Inserted { from, count } if count > 0 => {
                vec![ShiftRecord::inserted(from, count)]
            }
            ListChange::Removed { from, count } if count > 0 => {
                vec![ShiftRecord::removed(from, count)]
            }
            _ => Vec::new(),
        }
    }
}

/// Type alias for a row depth function of a flattened tree.
pub type DepthFn<T> = Arc<dyn Fn(&T) -> usize + Send + Sync>;

/// A list of rows that publishes structural changes.
///
/// Change notifications are emitted after the internal lock is released,
/// so listeners may read the list.
///
/// # Signals
///
/// - `changed`: emitted after every effective mutation
pub struct ObservableList<T> {
    items: RwLock<Vec<T>>,
    depth: Option<DepthFn<T>>,

    /// Emitted after the list changed.
    pub changed: Signal<ListChange>,
}

impl<T: Send + Sync + 'static> ObservableList<T> {
    /// Creates a list with the given rows.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items),
            depth: None,
            changed: Signal::new(),
        }
    }

    /// Creates an empty list.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Creates a flattened tree: `depth` reports each row's nesting level.
    pub fn with_depth<F>(items: Vec<T>, depth: F) -> Self
    where
        F: Fn(&T) -> usize + Send + Sync + 'static,
    {
        Self {
            depth: Some(Arc::new(depth)),
            ..Self::new(items)
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns `true` if the list has no rows.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Appends a row.
    pub fn push(&self, item: T) {
        let from = {
            let mut items = self.items.write();
            items.push(item);
            items.len() - 1
        };
        self.publish(ListChange::Inserted { from, count: 1 });
    }

    /// Inserts a row at `index`.
    ///
    /// # Errors
    ///
    /// [`TrellisError::IndexOutOfRange`] if `index > len()`.
    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        self.insert_all(index, vec![item])
    }

    /// Inserts rows at `index`, publishing a single change.
    ///
    /// # Errors
    ///
    /// [`TrellisError::IndexOutOfRange`] if `index > len()`.
    pub fn insert_all(&self, index: usize, new_items: Vec<T>) -> Result<()> {
        let count = new_items.len();
        {
            let mut items = self.items.write();
            if index > items.len() {
                return Err(TrellisError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            items.splice(index..index, new_items);
        }
        if count > 0 {
            self.publish(ListChange::Inserted { from: index, count });
        }
        Ok(())
    }

    /// Removes and returns the row at `index`, or `None` if out of range.
    pub fn remove(&self, index: usize) -> Option<T> {
        let removed = {
            let mut items = self.items.write();
            (index < items.len()).then(|| items.remove(index))
        };
        if removed.is_some() {
            self.publish(ListChange::Removed {
                from: index,
                count: 1,
            });
        }
        removed
    }

    /// Removes rows in `from..to` (clamped to the list), publishing a single
    /// change.
    pub fn remove_range(&self, from: usize, to: usize) -> Vec<T> {
        let removed: Vec<T> = {
            let mut items = self.items.write();
            let to = to.min(items.len());
            if from >= to {
                return Vec::new();
            }
            items.drain(from..to).collect()
        };
        self.publish(ListChange::Removed {
            from,
            count: removed.len(),
        });
        removed
    }

    /// Replaces the row at `index`, returning the old row.
    pub fn set(&self, index: usize, item: T) -> Option<T> {
        let old = {
            let mut items = self.items.write();
            items
                .get_mut(index)
                .map(|slot| std::mem::replace(slot, item))
        };
        if old.is_some() {
            self.publish(ListChange::Replaced { index });
        }
        old
    }

    /// Moves the row at `from` so that it ends up at index `to`.
    pub fn move_item(&self, from: usize, to: usize) {
        let permutation = {
            let mut items = self.items.write();
            let len = items.len();
            if from >= len || to >= len || from == to {
                return;
            }
            let mut order: Vec<usize> = (0..len).collect();
            let moved = order.remove(from);
            order.insert(to, moved);

            let item = items.remove(from);
            items.insert(to, item);
            invert(&order)
        };
        self.publish(ListChange::Permuted { permutation });
    }

    /// Stable-sorts the rows, publishing the resulting permutation.
    pub fn sort_by<F>(&self, mut compare: F)
    where
        F: FnMut(&T, &T) -> std::cmp::Ordering,
    {
        let permutation = {
            let mut items = self.items.write();
            let mut order: Vec<usize> = (0..items.len()).collect();
            order.sort_by(|&a, &b| compare(&items[a], &items[b]));
            if order.iter().enumerate().all(|(new, &old)| new == old) {
                return;
            }
            let mut taken: Vec<Option<T>> = items.drain(..).map(Some).collect();
            *items = order.iter().filter_map(|&old| taken[old].take()).collect();
            invert(&order)
        };
        self.publish(ListChange::Permuted { permutation });
    }

    /// Replaces the whole content.
    pub fn replace_all(&self, items: Vec<T>) {
        *self.items.write() = items;
        self.publish(ListChange::Reset);
    }

    /// Removes all rows.
    pub fn clear(&self) {
        let was_empty = {
            let mut items = self.items.write();
            let was_empty = items.is_empty();
            items.clear();
            was_empty
        };
        if !was_empty {
            self.publish(ListChange::Reset);
        }
    }

    /// Read access to the rows.
    pub fn items(&self) -> impl std::ops::Deref<Target = Vec<T>> + '_ {
        self.items.read()
    }

    fn publish(&self, change: ListChange) {
        tracing::trace!(target: targets::LIST, ?change, "list changed");
        self.changed.emit(change);
    }
}

impl<T: Clone + Send + Sync + 'static> ObservableList<T> {
    /// A copy of the row at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.items.read().get(index).cloned()
    }

    /// A copy of all rows.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.read().clone()
    }
}

impl<T: Clone + Send + Sync + 'static> ItemSource<T> for ObservableList<T> {
    fn item_count(&self) -> usize {
        self.len()
    }

    fn item_at(&self, index: usize) -> Option<T> {
        self.get(index)
    }

    fn depth(&self, index: usize) -> Option<usize> {
        let depth = self.depth.as_ref()?;
        self.items.read().get(index).map(|item| depth(item))
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableList")
            .field("items", &*self.items.read())
            .finish()
    }
}

/// Turns a new-to-old ordering into an old-to-new permutation.
fn invert(order: &[usize]) -> Vec<usize> {
    let mut permutation = vec![0; order.len()];
    for (new, &old) in order.iter().enumerate() {
        permutation[old] = new;
    }
    permutation
}

static_assertions::assert_impl_all!(ObservableList<String>: Send, Sync);
