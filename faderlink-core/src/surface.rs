//! OSC control surface host.
//!
//! Listens on a UDP port for commands from remote surfaces, binds strips
//! to peers on request, applies inbound control changes to the session and
//! keeps one [`StripObserver`] per (peer, route) binding.
//!
//! Inbound messages are decoded on a receive thread and handed to the
//! owner through a channel; [`OscSurface::poll`] handles them on the
//! caller's thread.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rosc::{OscMessage, OscPacket, OscType};

use faderlink_types::{paths, ControlRole, GainMode, RemoteControlId};

use crate::dispatch::Dispatcher;
use crate::gain::{db_to_coefficient, slider_position_to_gain};
use crate::observer::StripObserver;
use crate::peers::PeerRegistry;
use crate::route::Route;
use crate::session::Session;
use crate::signal::Connection;
use crate::transport::{Transport, UdpTransport};

/// Default OSC port for incoming surface commands.
pub const DEFAULT_LISTEN_PORT: u16 = 3819;

/// Default depth of the outbound I/O queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

const RECV_BUFFER_SIZE: usize = 4096;

/// Opens the outbound transport for a newly bound peer.
pub type TransportFactory =
    Box<dyn Fn(SocketAddr) -> io::Result<Box<dyn Transport>> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct SurfaceSettings {
    pub listen_addr: SocketAddr,
    pub queue_capacity: usize,
    /// Gain mode for peers that never chose one.
    pub default_gain_mode: GainMode,
    /// Peers known before they connect, with their gain mode.
    pub peers: Vec<(SocketAddr, GainMode)>,
}

impl Default for SurfaceSettings {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_LISTEN_PORT)),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            default_gain_mode: GainMode::Absolute,
            peers: Vec::new(),
        }
    }
}

pub struct OscSurface {
    session: Arc<Session>,
    registry: PeerRegistry,
    bindings: Arc<Mutex<Vec<StripObserver>>>,
    transport_factory: TransportFactory,
    local_addr: SocketAddr,
    inbound_rx: Receiver<(SocketAddr, OscMessage)>,
    running: Arc<AtomicBool>,
    recv_thread: Option<JoinHandle<()>>,
    route_removed: Connection,
    // Dropped last: observers release their transports through it.
    dispatcher: Dispatcher,
}

impl OscSurface {
    pub fn bind(session: Arc<Session>, settings: SurfaceSettings) -> io::Result<Self> {
        let registry = PeerRegistry::with_default(settings.default_gain_mode);
        for (peer, mode) in &settings.peers {
            registry.set_gain_mode(*peer, *mode);
        }
        let dispatcher = Dispatcher::spawn(registry.clone(), settings.queue_capacity)?;

        let socket = UdpSocket::bind(settings.listen_addr)?;
        let local_addr = socket.local_addr()?;
        socket.set_read_timeout(Some(Duration::from_millis(50)))?;

        let (inbound_tx, inbound_rx) = crossbeam_channel::unbounded();
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let recv_thread = thread::Builder::new()
            .name("faderlink-osc-recv".into())
            .spawn(move || receive_loop(socket, inbound_tx, thread_running))?;

        let bindings: Arc<Mutex<Vec<StripObserver>>> = Arc::new(Mutex::new(Vec::new()));
        let route_removed = {
            let bindings = Arc::clone(&bindings);
            session.route_removed.connect(move |route: &Arc<Route>| {
                let closed = take_where(&bindings, |o| o.is_bound_to(route) || o.route().is_none());
                if !closed.is_empty() {
                    log::info!(target: "surface", "route {} removed, closing {} strip(s)", route.name(), closed.len());
                }
                drop(closed);
            })
        };

        log::info!(target: "surface", "OSC surface listening on {}", local_addr);

        Ok(Self {
            session,
            registry,
            bindings,
            transport_factory: Box::new(|peer| {
                UdpTransport::open(peer).map(|t| Box::new(t) as Box<dyn Transport>)
            }),
            local_addr,
            inbound_rx,
            running,
            recv_thread: Some(recv_thread),
            route_removed,
            dispatcher,
        })
    }

    /// Replace how outbound transports are opened.
    pub fn set_transport_factory(&mut self, factory: TransportFactory) {
        self.transport_factory = factory;
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle every inbound message received so far. Returns how many.
    pub fn poll(&self) -> usize {
        let mut handled = 0;
        while let Ok((peer, msg)) = self.inbound_rx.try_recv() {
            self.handle_message(peer, &msg);
            handled += 1;
        }
        handled
    }

    /// Wait up to `timeout` for a message, then handle everything pending.
    pub fn wait_and_poll(&self, timeout: Duration) -> usize {
        match self.inbound_rx.recv_timeout(timeout) {
            Ok((peer, msg)) => {
                self.handle_message(peer, &msg);
                1 + self.poll()
            }
            Err(RecvTimeoutError::Timeout) => 0,
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!(target: "surface", "receive thread stopped");
                0
            }
        }
    }

    /// Apply one command from `peer`.
    pub fn handle_message(&self, peer: SocketAddr, msg: &OscMessage) {
        log::trace!(target: "surface", "{} <- {} {:?}", peer, msg.addr, msg.args);
        match msg.addr.as_str() {
            paths::SET_SURFACE_GAINMODE => {
                let Some(mode) = int_arg(&msg.args, 0) else {
                    return ignore(peer, msg);
                };
                self.set_gain_mode(peer, GainMode::from_wire(mode));
            }
            paths::STRIP_BIND => {
                let Some(id) = id_arg(&msg.args) else {
                    return ignore(peer, msg);
                };
                if let Err(e) = self.bind_strip(peer, id) {
                    log::warn!(target: "surface", "bind {} for {}: {}", id, peer, e);
                }
            }
            paths::STRIP_UNBIND => {
                let Some(id) = id_arg(&msg.args) else {
                    return ignore(peer, msg);
                };
                self.unbind_strip(peer, id);
            }
            paths::STRIP_NAME => {
                let (Some(route), Some(OscType::String(name))) =
                    (self.route_arg(&msg.args), msg.args.get(1))
                else {
                    return ignore(peer, msg);
                };
                route.set_name(name.as_str());
            }
            paths::STRIP_MUTE => self.set_control(peer, msg, ControlRole::Mute, |v| v),
            paths::STRIP_SOLO => self.set_control(peer, msg, ControlRole::Solo, |v| v),
            paths::STRIP_RECENABLE => self.set_control(peer, msg, ControlRole::RecEnable, |v| v),
            paths::STRIP_GAIN_ABS => self.set_control(peer, msg, ControlRole::Gain, |v| v),
            paths::STRIP_GAIN_DB => self.set_control(peer, msg, ControlRole::Gain, db_to_coefficient),
            paths::STRIP_FADER => {
                self.set_control(peer, msg, ControlRole::Gain, slider_position_to_gain)
            }
            paths::STRIP_FADER_1024 => self.set_control(peer, msg, ControlRole::Gain, |v| {
                slider_position_to_gain(v / 1023.0)
            }),
            _ => log::debug!(target: "surface", "unhandled OSC path {} from {}", msg.addr, peer),
        }
    }

    /// Start mirroring route `id` to `peer`. Returns false if it already was.
    pub fn bind_strip(&self, peer: SocketAddr, id: RemoteControlId) -> Result<bool, String> {
        // Look the route up under the bindings lock: a concurrent removal
        // then either hides it or closes the new binding after us.
        let mut bindings = lock(&self.bindings);
        let route = self
            .session
            .route(id)
            .ok_or_else(|| format!("no route with remote id {}", id))?;
        if bindings
            .iter()
            .any(|o| o.endpoint() == peer && o.is_bound_to(&route))
        {
            return Ok(false);
        }
        let transport = (self.transport_factory)(peer).map_err(|e| e.to_string())?;
        let observer = StripObserver::new(&route, transport, &self.dispatcher.handle())?;
        bindings.push(observer);
        log::info!(target: "surface", "bound strip {} ({}) to {}", id, route.name(), peer);
        Ok(true)
    }

    /// Stop mirroring route `id` to `peer`. Returns false if it was not bound.
    pub fn unbind_strip(&self, peer: SocketAddr, id: RemoteControlId) -> bool {
        let closed = take_where(&self.bindings, |o| {
            o.endpoint() == peer && o.route().map(|r| r.remote_control_id()) == Some(id)
        });
        !closed.is_empty()
    }

    /// Drop every binding for `peer`.
    pub fn release_peer(&self, peer: SocketAddr) -> usize {
        take_where(&self.bindings, |o| o.endpoint() == peer).len()
    }

    pub fn set_gain_mode(&self, peer: SocketAddr, mode: GainMode) {
        self.registry.set_gain_mode(peer, mode);
        for observer in lock(&self.bindings).iter().filter(|o| o.endpoint() == peer) {
            observer.refresh_gain();
        }
    }

    /// Resend the full state of every strip bound to `peer`.
    pub fn refresh_peer(&self, peer: SocketAddr) {
        for observer in lock(&self.bindings).iter().filter(|o| o.endpoint() == peer) {
            observer.refresh();
        }
    }

    pub fn binding_count(&self) -> usize {
        lock(&self.bindings).len()
    }

    /// Remote ids currently bound to `peer`.
    pub fn bound_strips(&self, peer: SocketAddr) -> Vec<RemoteControlId> {
        lock(&self.bindings)
            .iter()
            .filter(|o| o.endpoint() == peer)
            .filter_map(|o| o.route().map(|r| r.remote_control_id()))
            .collect()
    }

    /// Wait until everything queued so far has gone out.
    pub fn flush(&self) -> Result<(), String> {
        self.dispatcher.flush()
    }

    fn route_arg(&self, args: &[OscType]) -> Option<Arc<Route>> {
        id_arg(args).and_then(|id| self.session.route(id))
    }

    fn set_control(
        &self,
        peer: SocketAddr,
        msg: &OscMessage,
        role: ControlRole,
        convert: impl Fn(f64) -> f64,
    ) {
        let (Some(route), Some(value)) = (self.route_arg(&msg.args), float_arg(&msg.args, 1)) else {
            return ignore(peer, msg);
        };
        match route.control(role) {
            Some(control) => control.set_value(convert(value)),
            None => log::debug!(target: "surface", "route {} has no {} control", route.remote_control_id(), role.name()),
        }
    }
}

impl Drop for OscSurface {
    fn drop(&mut self) {
        self.route_removed.disconnect();
        let closed = take_where(&self.bindings, |_| true);
        drop(closed);
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.recv_thread.take() {
            let _ = handle.join();
        }
        log::info!(target: "surface", "OSC surface on {} stopped", self.local_addr);
    }
}

fn receive_loop(socket: UdpSocket, tx: Sender<(SocketAddr, OscMessage)>, running: Arc<AtomicBool>) {
    let mut buf = [0u8; RECV_BUFFER_SIZE];
    while running.load(Ordering::Relaxed) {
        match socket.recv_from(&mut buf) {
            Ok((n, peer)) => match rosc::decoder::decode_udp(&buf[..n]) {
                Ok((_, packet)) => {
                    let mut messages = Vec::new();
                    flatten_packet(packet, &mut messages);
                    for msg in messages {
                        if tx.send((peer, msg)).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => log::debug!(target: "surface", "undecodable packet from {}: {:?}", peer, e),
            },
            Err(ref e)
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
            {
                continue
            }
            Err(e) => {
                log::warn!(target: "surface", "OSC receive failed: {}", e);
                break;
            }
        }
    }
}

/// Unwrap bundles into their messages, in order.
fn flatten_packet(packet: OscPacket, out: &mut Vec<OscMessage>) {
    match packet {
        OscPacket::Message(msg) => out.push(msg),
        OscPacket::Bundle(bundle) => {
            for p in bundle.content {
                flatten_packet(p, out);
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Remove matching observers. They close when the returned vec drops,
/// outside the lock.
fn take_where(
    bindings: &Mutex<Vec<StripObserver>>,
    pred: impl Fn(&StripObserver) -> bool,
) -> Vec<StripObserver> {
    let mut bindings = lock(bindings);
    let mut taken = Vec::new();
    let mut idx = 0;
    while idx < bindings.len() {
        if pred(&bindings[idx]) {
            taken.push(bindings.remove(idx));
        } else {
            idx += 1;
        }
    }
    taken
}

fn ignore(peer: SocketAddr, msg: &OscMessage) {
    log::debug!(target: "surface", "malformed {} from {}: {:?}", msg.addr, peer, msg.args);
}

fn int_arg(args: &[OscType], idx: usize) -> Option<i32> {
    match args.get(idx) {
        Some(OscType::Int(v)) => Some(*v),
        Some(OscType::Long(v)) => i32::try_from(*v).ok(),
        Some(OscType::Float(v)) => Some(*v as i32),
        Some(OscType::Double(v)) => Some(*v as i32),
        _ => None,
    }
}

fn float_arg(args: &[OscType], idx: usize) -> Option<f64> {
    match args.get(idx) {
        Some(OscType::Float(v)) => Some(*v as f64),
        Some(OscType::Double(v)) => Some(*v),
        Some(OscType::Int(v)) => Some(*v as f64),
        Some(OscType::Bool(v)) => Some(if *v { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn id_arg(args: &[OscType]) -> Option<RemoteControlId> {
    int_arg(args, 0)
        .and_then(|id| u32::try_from(id).ok())
        .map(RemoteControlId::new)
}
