//! Property system for Trellis.
//!
//! This module provides reactive state holders with change detection:
//!
//! - **Property<T>**: a value with change detection; the owner decides what
//!   to emit when [`Property::set`] reports a change.
//! - **ObservableValue<T>**: a shared value reference that publishes its own
//!   change notifications. Columns resolve one of these per (row, column)
//!   pair, and cells listen to it while they display that row.
//!
//! # Example
//!
//! ```
//! use trellis_core::{ObservableValue, Property, Signal};
//!
//! let width = Property::new(80);
//! assert!(width.set(120));
//! assert!(!width.set(120));
//!
//! let name = ObservableValue::new("Ada".to_string());
//! name.value_changed.connect(|value| println!("renamed to {value}"));
//! assert_eq!(name.set("Grace".to_string()), Ok(true));
//! ```

use std::fmt;

use parking_lot::RwLock;
use thiserror::Error;

use crate::logging::targets;
use crate::signal::Signal;

/// A reactive property that tracks changes.
///
/// `Property<T>` wraps a value and provides change detection. When `set()` is
/// called, it compares the new value with the current one and returns whether
/// the value actually changed.
///
/// # Thread Safety
///
/// `Property<T>` uses interior mutability with `RwLock` and is `Send + Sync`
/// whenever `T` is.
pub struct Property<T> {
    value: RwLock<T>,
}

impl<T: Clone> Property<T> {
    /// Create a new property with an initial value.
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Get the current value.
    ///
    /// This clones the value. For large types, consider using `with()` instead.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Access the value through a closure without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.value.read())
    }

    /// Set the value without change detection.
    pub fn set_silent(&self, value: T) {
        *self.value.write() = value;
    }
}

impl<T: Clone + PartialEq> Property<T> {
    /// Set the value, returning `true` if the value changed.
    pub fn set(&self, value: T) -> bool {
        let mut current = self.value.write();
        if *current != value {
            *current = value;
            true
        } else {
            false
        }
    }

    /// Set the value, returning the old value if it changed.
    pub fn replace(&self, value: T) -> Option<T> {
        let mut current = self.value.write();
        if *current != value {
            Some(std::mem::replace(&mut *current, value))
        } else {
            None
        }
    }
}

impl<T: Clone + Default> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &self.get())
            .finish()
    }
}

/// Error types for property operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    /// The value is read-only and cannot be modified.
    #[error("property '{name}' is read-only")]
    ReadOnly {
        /// The name of the read-only value.
        name: String,
    },
}

/// An observable, optionally writable value reference.
///
/// `value_changed` fires with the new value after every effective `set`.
/// Listeners run with no internal lock held, so they may read the value.
pub struct ObservableValue<T> {
    name: &'static str,
    value: Property<T>,
    writable: bool,
    /// Emitted after the value changed. Args: the new value.
    pub value_changed: Signal<T>,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> ObservableValue<T> {
    /// Creates a writable value.
    pub fn new(value: T) -> Self {
        Self::with_access("value", value, true)
    }

    /// Creates a read-only value. [`set`](Self::set) fails with
    /// [`PropertyError::ReadOnly`].
    pub fn read_only(value: T) -> Self {
        Self::with_access("value", value, false)
    }

    /// Creates a value with a diagnostic name, used in errors and traces.
    pub fn named(name: &'static str, value: T, writable: bool) -> Self {
        Self::with_access(name, value, writable)
    }

    fn with_access(name: &'static str, value: T, writable: bool) -> Self {
        Self {
            name,
            value: Property::new(value),
            writable,
            value_changed: Signal::new(),
        }
    }

    /// Returns the current value.
    pub fn get(&self) -> T {
        self.value.get()
    }

    /// Returns `true` if [`set`](Self::set) can modify this value.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Writes a new value.
    ///
    /// Returns `Ok(true)` if the value changed (and `value_changed` fired),
    /// `Ok(false)` if it was equal to the current one.
    pub fn set(&self, value: T) -> Result<bool, PropertyError> {
        if !self.writable {
            return Err(PropertyError::ReadOnly {
                name: self.name.to_string(),
            });
        }
        if self.value.set(value.clone()) {
            tracing::trace!(target: targets::PROPERTY, name = self.name, "observable value changed");
            self.value_changed.emit(value);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for ObservableValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableValue")
            .field("name", &self.name)
            .field("value", &self.value.get())
            .field("writable", &self.writable)
            .finish()
    }
}

static_assertions::assert_impl_all!(ObservableValue<String>: Send, Sync);
