//! Signal/slot system for Trellis.
//!
//! This module provides a type-safe, Qt-inspired signal/slot mechanism used by
//! selection models, observable values and lists to publish change
//! notifications. Signals are emitted when state changes, and connected slots
//! (callbacks) are invoked synchronously in the emitting thread.
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - The main signal type for emitting notifications
//! - [`ConnectionId`] - Unique identifier returned when connecting a slot
//! - [`ConnectionGuard`] - RAII guard that disconnects when dropped
//! - [`Deferred`] - Emissions queued while a signal was held
//!
//! # Re-entrancy
//!
//! The slot list is snapshotted before any slot runs, so a slot may connect
//! or disconnect slots on the same signal while it is being emitted. Slots
//! connected during an emission are first invoked by the next emission.
//!
//! An owner that emits while holding a lock can [`hold`](Signal::hold) its
//! signals first. Emissions are then queued, and the [`Deferred`] batch
//! returned by [`release`](Signal::release) is emitted once the lock is gone.
//!
//! # Example
//!
//! ```
//! use trellis_core::Signal;
//!
//! // Create a signal that passes a string argument
//! let text_changed = Signal::<String>::new();
//!
//! // Connect a slot (closure)
//! let conn_id = text_changed.connect(|text| {
//!     println!("Text changed to: {}", text);
//! });
//!
//! // Emit the signal
//! text_changed.emit("Hello, World!".to_string());
//!
//! // Disconnect when done
//! text_changed.disconnect(conn_id);
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Use this ID to disconnect a specific connection via [`Signal::disconnect`].
    /// The ID remains valid until the connection is explicitly disconnected or
    /// the signal is dropped.
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A type-safe signal that can have multiple connected slots.
///
/// # Type Parameter
///
/// - `Args`: The argument type passed to connected slots. Use `()` for signals
///   with no arguments, or a tuple like `(usize, usize)` for multiple arguments.
///
/// # Thread Safety
///
/// `Signal<Args>` is `Send + Sync`; slots must be `Send + Sync` as well. Slots
/// always run on the thread that calls [`emit`](Self::emit).
pub struct Signal<Args> {
    /// All active connections.
    connections: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
    /// Whether signal emission is temporarily blocked.
    blocked: AtomicBool,
    /// Arguments queued while the signal is held.
    held: Mutex<Option<Vec<Args>>>,
}

impl<Args> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
            blocked: AtomicBool::new(false),
            held: Mutex::new(None),
        }
    }

    /// Connect a slot (closure) to this signal.
    ///
    /// Returns a `ConnectionId` that can be used to disconnect the slot later.
    ///
    /// # Example
    ///
    /// ```
    /// use trellis_core::Signal;
    ///
    /// let signal = Signal::<String>::new();
    /// let id = signal.connect(|s| println!("Got: {}", s));
    /// signal.emit("Hello".to_string());
    /// ```
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connections.lock().insert(Arc::new(slot))
    }

    /// Connect a slot with automatic disconnection when the guard is dropped.
    ///
    /// The guard borrows the signal, so it cannot outlive it.
    pub fn connect_scoped<F>(&self, slot: F) -> ConnectionGuard<'_, Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let id = self.connect(slot);
        ConnectionGuard { signal: self, id }
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed, `false` otherwise.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Disconnect all slots from this signal.
    pub fn disconnect_all(&self) {
        self.connections.lock().clear();
    }

    /// Get the number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Returns `true` if a connection with this ID is still active.
    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.connections.lock().contains_key(id)
    }

    /// Block signal emission temporarily.
    ///
    /// While blocked, calls to `emit()` will do nothing.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Check if signal emission is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Queue emissions instead of invoking slots until [`release`](Self::release).
    ///
    /// Holding an already held signal keeps its queue.
    pub fn hold(&self) {
        let mut held = self.held.lock();
        if held.is_none() {
            *held = Some(Vec::new());
        }
    }

    /// Returns `true` while emissions are being queued.
    pub fn is_held(&self) -> bool {
        self.held.lock().is_some()
    }

    /// Stop queueing and hand back what was queued.
    ///
    /// The slots are captured now; the queued arguments reach them when the
    /// returned batch is emitted.
    pub fn release(&self) -> Deferred<Args> {
        let queued = self.held.lock().take().unwrap_or_default();
        let slots = if queued.is_empty() {
            Vec::new()
        } else {
            self.connections.lock().values().cloned().collect()
        };
        Deferred { slots, queued }
    }

    /// Emit the signal, invoking all connected slots in the current thread.
    ///
    /// If the signal is blocked, this does nothing. If it is held, `args` is
    /// queued.
    #[tracing::instrument(skip_all, target = "trellis_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "signal blocked, skipping emit");
            return;
        }
        if let Some(queue) = self.held.lock().as_mut() {
            tracing::trace!(target: targets::SIGNAL, queued = queue.len() + 1, "signal held, queueing emit");
            queue.push(args);
            return;
        }

        // Snapshot so slots can touch this signal's connections.
        let slots: Vec<Slot<Args>> = self.connections.lock().values().cloned().collect();
        tracing::trace!(target: targets::SIGNAL, connection_count = slots.len(), "emitting signal");

        for slot in slots {
            slot(&args);
        }
    }
}

impl<Args> fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.connections.lock().len())
            .field("blocked", &self.blocked.load(Ordering::SeqCst))
            .field("held", &self.is_held())
            .finish()
    }
}

/// Emissions collected while a signal was held.
///
/// Returned by [`Signal::release`]. Dropping it discards the emissions.
#[must_use = "queued emissions are lost unless emitted"]
pub struct Deferred<Args> {
    slots: Vec<Slot<Args>>,
    queued: Vec<Args>,
}

impl<Args> Deferred<Args> {
    /// Returns `true` if nothing was emitted while the signal was held.
    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Invoke the captured slots with every queued argument, in order.
    pub fn emit(self) {
        for args in &self.queued {
            for slot in &self.slots {
                slot(args);
            }
        }
    }
}

impl<Args> fmt::Debug for Deferred<Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("slots", &self.slots.len())
            .field("queued", &self.queued.len())
            .finish()
    }
}

/// A connection guard that automatically disconnects when dropped.
///
/// Created via [`Signal::connect_scoped`].
///
/// # Example
///
/// ```
/// use trellis_core::Signal;
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use std::sync::Arc;
///
/// let signal = Signal::<i32>::new();
/// let counter = Arc::new(AtomicI32::new(0));
/// {
///     let counter_clone = counter.clone();
///     let _guard = signal.connect_scoped(move |&n| {
///         counter_clone.fetch_add(n, Ordering::SeqCst);
///     });
///     signal.emit(42);  // counter = 42
/// }
/// signal.emit(43);  // Nothing happens - connection was dropped
/// assert_eq!(counter.load(Ordering::SeqCst), 42);
/// ```
pub struct ConnectionGuard<'a, Args> {
    signal: &'a Signal<Args>,
    id: ConnectionId,
}

impl<Args> ConnectionGuard<'_, Args> {
    /// The ID of the guarded connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl<Args> Drop for ConnectionGuard<'_, Args> {
    fn drop(&mut self) {
        self.signal.disconnect(self.id);
    }
}

static_assertions::assert_impl_all!(Signal<usize>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_signal_connect_emit() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        signal.connect(move |&value| {
            received_clone.lock().push(value);
        });

        signal.emit(42);
        signal.emit(100);

        let values = received.lock();
        assert_eq!(*values, vec![42, 100]);
    }

    #[test]
    fn test_signal_disconnect() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        let conn_id = signal.connect(move |&value| {
            received_clone.lock().push(value);
        });

        signal.emit(1);
        assert!(signal.disconnect(conn_id));
        assert!(!signal.is_connected(conn_id));
        signal.emit(2);

        let values = received.lock();
        assert_eq!(*values, vec![1]); // Only received before disconnect
    }

    #[test]
    fn test_signal_blocked() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        signal.connect(move |&value| {
            received_clone.lock().push(value);
        });

        signal.emit(1);
        signal.set_blocked(true);
        signal.emit(2); // Should be ignored
        signal.set_blocked(false);
        signal.emit(3);

        let values = received.lock();
        assert_eq!(*values, vec![1, 3]);
    }

    #[test]
    fn test_disconnect_all() {
        let signal = Signal::<()>::new();

        for _ in 0..5 {
            signal.connect(|_| {});
        }

        assert_eq!(signal.connection_count(), 5);
        signal.disconnect_all();
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_connection_guard() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        {
            let received_clone = received.clone();
            let _guard = signal.connect_scoped(move |&value| {
                received_clone.lock().push(value);
            });
            signal.emit(1);
        } // Guard dropped here, connection should be removed

        signal.emit(2); // Should not be received

        let values = received.lock();
        assert_eq!(*values, vec![1]);
    }

    #[test]
    fn test_slot_may_disconnect_itself_during_emit() {
        let signal = Arc::new(Signal::<i32>::new());
        let received = Arc::new(Mutex::new(Vec::new()));
        let own_id = Arc::new(Mutex::new(None::<ConnectionId>));

        let signal_clone = signal.clone();
        let received_clone = received.clone();
        let own_id_clone = own_id.clone();
        let id = signal.connect(move |&value| {
            received_clone.lock().push(value);
            if let Some(id) = *own_id_clone.lock() {
                signal_clone.disconnect(id);
            }
        });
        *own_id.lock() = Some(id);

        signal.emit(7);
        signal.emit(8);

        assert_eq!(*received.lock(), vec![7]);
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_held_signal_emits_on_release() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        signal.connect(move |&value| {
            received_clone.lock().push(value);
        });

        signal.hold();
        signal.emit(1);
        signal.emit(2);
        assert!(signal.is_held());
        assert!(received.lock().is_empty());

        let deferred = signal.release();
        assert!(!signal.is_held());
        assert!(!deferred.is_empty());
        signal.emit(3);
        deferred.emit();

        assert_eq!(*received.lock(), vec![3, 1, 2]);
        assert!(signal.release().is_empty());
    }

    #[test]
    fn test_deferred_slot_may_lock_what_the_emitter_held() {
        let state = Arc::new(Mutex::new(0));
        let signal = Arc::new(Signal::<i32>::new());
        let seen = Arc::new(Mutex::new(None));

        let state_clone = state.clone();
        let seen_clone = seen.clone();
        signal.connect(move |_| {
            *seen_clone.lock() = Some(*state_clone.lock());
        });

        let deferred = {
            let mut guard = state.lock();
            signal.hold();
            *guard = 5;
            signal.emit(5);
            signal.release()
        };
        deferred.emit();

        assert_eq!(*seen.lock(), Some(5));
    }

    #[test]
    fn test_signal_with_multiple_args() {
        let signal = Signal::<(String, i32)>::new();
        let received = Arc::new(Mutex::new(None));

        let received_clone = received.clone();
        signal.connect(move |args| {
            *received_clone.lock() = Some(args.clone());
        });

        signal.emit(("hello".to_string(), 42));

        let value = received.lock().clone();
        assert_eq!(value, Some(("hello".to_string(), 42)));
    }

    #[test]
    fn test_emit_from_multiple_threads() {
        let signal = Arc::new(Signal::<i32>::new());
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        signal.connect(move |&value| {
            received_clone.lock().push(value);
        });

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let signal_clone = signal.clone();
                std::thread::spawn(move || signal_clone.emit(i))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let values = received.lock();
        assert_eq!(values.len(), 4);
        for i in 0..4 {
            assert!(values.contains(&i), "Missing value {}", i);
        }
    }
}
