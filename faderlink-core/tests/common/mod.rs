#![allow(dead_code)]
//! Test harness utilities for faderlink-core integration tests.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use faderlink_core::Transport;
use rosc::{OscMessage, OscPacket, OscType};

/// Transport that records every message instead of sending it.
pub struct RecordingTransport {
    peer: SocketAddr,
    sent: Arc<Mutex<Vec<OscMessage>>>,
    closed: Arc<Mutex<u32>>,
    delay: Duration,
}

/// Shared view of what a [`RecordingTransport`] saw.
#[derive(Clone)]
pub struct Recording {
    sent: Arc<Mutex<Vec<OscMessage>>>,
    closed: Arc<Mutex<u32>>,
}

impl Recording {
    pub fn messages(&self) -> Vec<OscMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn paths(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.addr).collect()
    }

    /// Messages sent to `path`, in order.
    pub fn on(&self, path: &str) -> Vec<OscMessage> {
        self.messages().into_iter().filter(|m| m.addr == path).collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    /// How many times the transport was dropped (closed).
    pub fn close_count(&self) -> u32 {
        *self.closed.lock().unwrap()
    }
}

impl RecordingTransport {
    pub fn new(peer: &str) -> (Box<dyn Transport>, Recording) {
        Self::slow(peer, Duration::ZERO)
    }

    /// Like [`new`](Self::new), but every send takes `delay`.
    pub fn slow(peer: &str, delay: Duration) -> (Box<dyn Transport>, Recording) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Mutex::new(0));
        let transport = RecordingTransport {
            peer: peer.parse().unwrap(),
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
            delay,
        };
        (Box::new(transport), Recording { sent, closed })
    }
}

impl Transport for RecordingTransport {
    fn endpoint(&self) -> SocketAddr {
        self.peer
    }

    fn send(&mut self, msg: &OscMessage) -> io::Result<()> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.sent.lock().unwrap().push(msg.clone());
        Ok(())
    }
}

impl Drop for RecordingTransport {
    fn drop(&mut self) {
        *self.closed.lock().unwrap() += 1;
    }
}

pub fn int(msg: &OscMessage, idx: usize) -> i32 {
    match msg.args.get(idx) {
        Some(OscType::Int(v)) => *v,
        other => panic!("expected int at {} in {}, got {:?}", idx, msg.addr, other),
    }
}

pub fn float(msg: &OscMessage, idx: usize) -> f32 {
    match msg.args.get(idx) {
        Some(OscType::Float(v)) => *v,
        other => panic!("expected float at {} in {}, got {:?}", idx, msg.addr, other),
    }
}

/// A fake remote surface: a UDP socket that sends commands and collects replies.
pub struct FakePeer {
    socket: UdpSocket,
}

impl FakePeer {
    pub fn new() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_millis(20))).unwrap();
        Self { socket }
    }

    pub fn addr(&self) -> SocketAddr {
        self.socket.local_addr().unwrap()
    }

    pub fn send(&self, to: SocketAddr, addr: &str, args: Vec<OscType>) {
        let packet = OscPacket::Message(OscMessage { addr: addr.to_string(), args });
        let buf = rosc::encoder::encode(&packet).unwrap();
        self.socket.send_to(&buf, to).unwrap();
    }

    /// Collect messages until `count` have arrived or `timeout` passes.
    pub fn recv_n(&self, count: usize, timeout: Duration) -> Vec<OscMessage> {
        let start = Instant::now();
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        while out.len() < count && start.elapsed() < timeout {
            if let Ok(n) = self.socket.recv(&mut buf) {
                if let Ok((_, OscPacket::Message(msg))) = rosc::decoder::decode_udp(&buf[..n]) {
                    out.push(msg);
                }
            }
        }
        out
    }

    /// Drain anything that arrives within `window`.
    pub fn drain(&self, window: Duration) -> Vec<OscMessage> {
        self.recv_n(usize::MAX, window)
    }
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
