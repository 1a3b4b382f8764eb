//! Data access trait used by selection models, columns and cells.

use std::sync::Arc;

/// Read access to the rows of a control.
///
/// Implementations must tolerate any index: out-of-range lookups return
/// `None` rather than panicking, because selection and cell requests
/// routinely race with data size changes.
pub trait ItemSource<T>: Send + Sync {
    /// Number of rows currently available.
    fn item_count(&self) -> usize;

    /// The row at `index`, or `None` if out of range.
    fn item_at(&self, index: usize) -> Option<T>;

    /// Nesting level of the row at `index` for flattened trees.
    ///
    /// Flat sources return `None`.
    fn depth(&self, _index: usize) -> Option<usize> {
        None
    }
}

impl<T: Clone + Send + Sync> ItemSource<T> for Vec<T> {
    fn item_count(&self) -> usize {
        self.len()
    }

    fn item_at(&self, index: usize) -> Option<T> {
        self.get(index).cloned()
    }
}

impl<T, S: ItemSource<T> + ?Sized> ItemSource<T> for Arc<S> {
    fn item_count(&self) -> usize {
        (**self).item_count()
    }

    fn item_at(&self, index: usize) -> Option<T> {
        (**self).item_at(index)
    }

    fn depth(&self, index: usize) -> Option<usize> {
        (**self).depth(index)
    }
}
