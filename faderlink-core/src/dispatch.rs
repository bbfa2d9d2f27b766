//! Dedicated OSC I/O thread.
//!
//! Change handlers run on whatever thread mutated the session, possibly
//! the audio thread, so they never touch the network. They push a
//! [`StripUpdate`] onto a bounded queue with `try_send` and drop it when
//! the queue is full. Initial state and refreshes come from control
//! threads and wait for room instead ([`DispatchHandle::send_update`]). The I/O thread
//! owns every observer's transport, looks up the peer's gain mode,
//! encodes and sends.
//!
//! The queue is FIFO with a single consumer, so updates for one property
//! reach the wire in the order they were raised.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use faderlink_types::{GainMode, RemoteControlId};

use crate::encoder::{encode, StripValue};
use crate::peers::PeerRegistry;
use crate::transport::Transport;

/// Identifies one observer's registration on the I/O thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One property change, captured by a handler.
#[derive(Debug, Clone)]
pub struct StripUpdate {
    pub observer: ObserverId,
    /// Remote-control id read when the change was raised.
    pub remote_id: RemoteControlId,
    pub value: StripValue,
}

enum IoCmd {
    Register {
        observer: ObserverId,
        transport: Box<dyn Transport>,
    },
    Update(StripUpdate),
    /// Drop the observer's transport; reply once done.
    Release {
        observer: ObserverId,
        ack: Sender<()>,
    },
    /// Reply once everything queued before it has been handled.
    Fence(Sender<()>),
    Shutdown,
}

#[derive(Default)]
struct Counters {
    sent: AtomicU64,
    dropped: AtomicU64,
    send_errors: AtomicU64,
}

/// Cloneable sender side of the I/O queue, held by observers and their
/// handlers.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: Sender<IoCmd>,
    next_observer: Arc<AtomicU64>,
    counters: Arc<Counters>,
}

impl DispatchHandle {
    /// Hand a transport to the I/O thread.
    pub fn register(&self, transport: Box<dyn Transport>) -> Result<ObserverId, String> {
        let observer = ObserverId(self.next_observer.fetch_add(1, Ordering::Relaxed));
        self.tx
            .send(IoCmd::Register { observer, transport })
            .map_err(|_| "OSC I/O thread disconnected".to_string())?;
        Ok(observer)
    }

    /// Queue an update without blocking. A full queue drops it.
    pub fn push(&self, update: StripUpdate) {
        match self.tx.try_send(IoCmd::Update(update)) {
            Ok(()) => {}
            Err(TrySendError::Full(IoCmd::Update(update))) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!(target: "osc", "I/O queue full, dropped {:?} for observer {}", update.value, update.observer);
            }
            Err(_) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                log::debug!(target: "osc", "I/O thread gone, update dropped");
            }
        }
    }

    /// Queue an update, waiting for room if the queue is full. For control
    /// threads only: initial state and refreshes must not be lost.
    pub fn send_update(&self, update: StripUpdate) -> Result<(), String> {
        self.tx
            .send(IoCmd::Update(update))
            .map_err(|_| "OSC I/O thread disconnected".to_string())
    }

    /// Drop the observer's transport and wait until the I/O thread has done
    /// so. Updates queued earlier are handled first.
    pub fn release(&self, observer: ObserverId) -> Result<(), String> {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        self.tx
            .send(IoCmd::Release { observer, ack: ack_tx })
            .map_err(|_| "OSC I/O thread disconnected".to_string())?;
        ack_rx
            .recv()
            .map_err(|_| "OSC I/O thread exited before release".to_string())
    }

    /// Wait until every update queued before this call has been sent.
    pub fn flush(&self) -> Result<(), String> {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        self.tx
            .send(IoCmd::Fence(ack_tx))
            .map_err(|_| "OSC I/O thread disconnected".to_string())?;
        ack_rx
            .recv()
            .map_err(|_| "OSC I/O thread exited before flush".to_string())
    }

    pub fn sent_messages(&self) -> u64 {
        self.counters.sent.load(Ordering::Relaxed)
    }

    pub fn dropped_updates(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    pub fn send_errors(&self) -> u64 {
        self.counters.send_errors.load(Ordering::Relaxed)
    }
}

/// Owner of the I/O thread. Dropping it stops and joins the thread.
pub struct Dispatcher {
    handle: DispatchHandle,
    join_handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn spawn(registry: PeerRegistry, queue_capacity: usize) -> io::Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded(queue_capacity.max(1));
        let counters = Arc::new(Counters::default());
        let thread_counters = Arc::clone(&counters);

        let join_handle = thread::Builder::new()
            .name("faderlink-osc-io".into())
            .spawn(move || {
                let thread = IoThread {
                    rx,
                    registry,
                    transports: HashMap::new(),
                    counters: thread_counters,
                };
                thread.run();
            })?;

        Ok(Self {
            handle: DispatchHandle {
                tx,
                next_observer: Arc::new(AtomicU64::new(1)),
                counters,
            },
            join_handle: Some(join_handle),
        })
    }

    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    pub fn flush(&self) -> Result<(), String> {
        self.handle.flush()
    }

    pub fn sent_messages(&self) -> u64 {
        self.handle.sent_messages()
    }

    pub fn dropped_updates(&self) -> u64 {
        self.handle.dropped_updates()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if self.handle.tx.send(IoCmd::Shutdown).is_err() {
            log::debug!(target: "osc", "I/O thread already stopped");
        }
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

struct IoThread {
    rx: Receiver<IoCmd>,
    registry: PeerRegistry,
    transports: HashMap<ObserverId, Box<dyn Transport>>,
    counters: Arc<Counters>,
}

impl IoThread {
    fn run(mut self) {
        while let Ok(cmd) = self.rx.recv() {
            match cmd {
                IoCmd::Register { observer, transport } => {
                    log::debug!(target: "osc", "observer {} -> {}", observer, transport.endpoint());
                    self.transports.insert(observer, transport);
                }
                IoCmd::Update(update) => self.deliver(update),
                IoCmd::Release { observer, ack } => {
                    if self.transports.remove(&observer).is_some() {
                        log::debug!(target: "osc", "observer {} released", observer);
                    }
                    let _ = ack.send(());
                }
                IoCmd::Fence(ack) => {
                    let _ = ack.send(());
                }
                IoCmd::Shutdown => break,
            }
        }
        log::debug!(target: "osc", "I/O thread exiting with {} transports open", self.transports.len());
    }

    fn deliver(&mut self, update: StripUpdate) {
        let Some(transport) = self.transports.get_mut(&update.observer) else {
            // Observer already released.
            return;
        };
        let mode = if update.value.is_gain() {
            self.registry.gain_mode(transport.endpoint())
        } else {
            GainMode::Absolute
        };
        let msg = encode(update.remote_id, &update.value, mode);
        match transport.send(&msg) {
            Ok(()) => {
                self.counters.sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.counters.send_errors.fetch_add(1, Ordering::Relaxed);
                log::warn!(target: "osc", "send {} to {} failed: {}", msg.addr, transport.endpoint(), e);
            }
        }
    }
}
