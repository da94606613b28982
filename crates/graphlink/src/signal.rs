//! Multicast listener registry for delivery events and faults.
//!
//! A [`Signal<Args>`] holds a set of connected listeners and broadcasts to
//! all of them when emitted. Broadcast iterates over a snapshot of the
//! listener set taken under a short lock, so connecting or disconnecting a
//! listener from inside a running broadcast neither corrupts the broadcast
//! nor causes duplicate delivery to the remaining listeners.
//!
//! # Example
//!
//! ```
//! use graphlink::Signal;
//!
//! let message_received = Signal::<String>::new();
//!
//! let id = message_received.connect(|text| {
//!     println!("got: {}", text);
//! });
//!
//! message_received.emit(&"hello".to_string());
//! message_received.disconnect(id);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// A unique identifier for a connected listener.
    ///
    /// Returned by [`Signal::connect`]; pass it to [`Signal::disconnect`]
    /// to remove that listener. The id is never reused while the signal
    /// is alive.
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A type-safe multicast signal.
///
/// `Signal<Args>` is `Send + Sync`; listeners may be connected, removed,
/// and invoked from any thread. Listeners run in the emitting thread, in
/// the order they appear in the snapshot.
pub struct Signal<Args> {
    listeners: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
}

impl<Args> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args> Signal<Args> {
    /// Create a new signal with no listeners.
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Connect a listener to this signal.
    ///
    /// Returns a [`ConnectionId`] that can be used to disconnect it later.
    pub fn connect<F>(&self, listener: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.listeners.lock().insert(Arc::new(listener))
    }

    /// Disconnect a listener by its connection id.
    ///
    /// Returns `true` if the listener was found and removed.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.listeners.lock().remove(id).is_some()
    }

    /// Disconnect all listeners from this signal.
    pub fn disconnect_all(&self) {
        self.listeners.lock().clear();
    }

    /// Get the number of connected listeners.
    pub fn connection_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Broadcast to all connected listeners.
    ///
    /// The listener set is snapshotted before invocation; listeners added
    /// during the broadcast see only later emissions, and listeners removed
    /// during the broadcast may still receive this one.
    pub fn emit(&self, args: &Args) {
        let snapshot: Vec<Slot<Args>> = self.listeners.lock().values().cloned().collect();
        tracing::trace!(
            target: "graphlink::signal",
            listener_count = snapshot.len(),
            "broadcasting"
        );
        for slot in snapshot {
            slot(args);
        }
    }
}

impl<Args> std::fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("connection_count", &self.connection_count())
            .finish()
    }
}
