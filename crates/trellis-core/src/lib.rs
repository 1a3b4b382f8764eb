//! Core systems for Trellis.
//!
//! This crate provides the foundational components shared by the Trellis
//! selection and cell crates:
//!
//! - **Signal/Slot System**: Type-safe change notification
//! - **Property System**: Change-detecting properties and observable values
//! - **Errors**: The workspace-wide error type
//! - **Logging**: `tracing` targets and span helpers
//!
//! # Signal/Slot Example
//!
//! ```
//! use trellis_core::Signal;
//!
//! let value_changed = Signal::<i32>::new();
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! value_changed.emit(42);
//! value_changed.disconnect(conn_id);
//! ```
//!
//! # Property Example
//!
//! ```
//! use trellis_core::{Property, Signal};
//!
//! struct Counter {
//!     value: Property<i32>,
//!     value_changed: Signal<i32>,
//! }
//!
//! impl Counter {
//!     fn increment(&self) {
//!         let new_value = self.value.get() + 1;
//!         if self.value.set(new_value) {
//!             self.value_changed.emit(new_value);
//!         }
//!     }
//! }
//! ```

mod error;
pub mod logging;
pub mod property;
pub mod signal;

pub use error::{Result, TrellisError};
pub use logging::PerfSpan;
pub use property::{ObservableValue, Property, PropertyError};
pub use signal::{ConnectionGuard, ConnectionId, Deferred, Signal};
