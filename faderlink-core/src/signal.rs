//! Change notification primitive.
//!
//! A [`Signal`] holds a list of slots. [`Signal::connect`] returns a
//! [`Connection`] that owns the subscription; disconnecting (or dropping)
//! it removes the slot and waits for any call of that slot already in
//! progress on another thread. Once `disconnect` returns the callback is
//! never invoked again.
//!
//! Emission runs every slot synchronously on the emitting thread, so
//! callbacks must be cheap and must not block.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

type Callback<A> = Box<dyn Fn(&A) + Send + Sync>;

struct Slot<A> {
    id: u64,
    /// `None` once disconnected. Emitters hold the read lock while calling,
    /// so taking the write lock fences out in-flight calls.
    callback: RwLock<Option<Callback<A>>>,
}

struct SignalInner<A> {
    slots: Mutex<Vec<Arc<Slot<A>>>>,
    next_id: AtomicU64,
}

pub struct Signal<A> {
    inner: Arc<SignalInner<A>>,
}

impl<A: 'static> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> Signal<A> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                slots: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Register a callback. The subscription lives as long as the returned
    /// connection.
    pub fn connect<F>(&self, callback: F) -> Connection
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let slot = Arc::new(Slot {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            callback: RwLock::new(Some(Box::new(callback))),
        });
        match self.inner.slots.lock() {
            Ok(mut slots) => slots.push(Arc::clone(&slot)),
            Err(poisoned) => poisoned.into_inner().push(Arc::clone(&slot)),
        }

        let signal = Arc::downgrade(&self.inner);
        Connection {
            disconnect: Some(Box::new(move || detach(&signal, &slot))),
        }
    }

    /// Call every connected slot with `args`.
    pub fn emit(&self, args: &A) {
        let slots: Vec<Arc<Slot<A>>> = match self.inner.slots.lock() {
            Ok(slots) => slots.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for slot in slots {
            if let Ok(callback) = slot.callback.read() {
                if let Some(callback) = callback.as_ref() {
                    callback(args);
                }
            }
        }
    }

    /// Number of live subscriptions.
    pub fn slot_count(&self) -> usize {
        match self.inner.slots.lock() {
            Ok(slots) => slots.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

fn detach<A>(signal: &Weak<SignalInner<A>>, slot: &Arc<Slot<A>>) {
    if let Some(signal) = signal.upgrade() {
        let mut slots = match signal.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.retain(|s| s.id != slot.id);
    }
    // Blocks until no emitter is inside this slot's callback.
    match slot.callback.write() {
        Ok(mut callback) => *callback = None,
        Err(poisoned) => *poisoned.into_inner() = None,
    }
}

/// Handle to one subscription. Dropping it disconnects.
///
/// Must not be disconnected from inside its own callback: the disconnect
/// waits for that very call to finish.
pub struct Connection {
    disconnect: Option<Box<dyn FnOnce() + Send>>,
}

impl Connection {
    /// A handle that was never connected to anything.
    pub fn empty() -> Self {
        Self { disconnect: None }
    }

    pub fn is_connected(&self) -> bool {
        self.disconnect.is_some()
    }

    /// Remove the subscription. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        if let Some(disconnect) = self.disconnect.take() {
            disconnect();
        }
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::empty()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("connected", &self.is_connected())
            .finish()
    }
}
