//! Outbound OSC transport to a single peer.

use std::io;
use std::net::{SocketAddr, UdpSocket};

use rosc::{OscMessage, OscPacket};

/// Sends OSC messages to one remote endpoint. Closing is dropping.
pub trait Transport: Send {
    /// The peer this transport talks to.
    fn endpoint(&self) -> SocketAddr;

    fn send(&mut self, msg: &OscMessage) -> io::Result<()>;
}

/// UDP transport with its own unconnected socket.
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpTransport {
    pub fn open(peer: SocketAddr) -> io::Result<Self> {
        let bind_addr = if peer.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr)?;
        Ok(Self { socket, peer })
    }
}

impl Transport for UdpTransport {
    fn endpoint(&self) -> SocketAddr {
        self.peer
    }

    fn send(&mut self, msg: &OscMessage) -> io::Result<()> {
        let buf = encode_message(msg)?;
        self.socket.send_to(&buf, self.peer)?;
        Ok(())
    }
}

pub fn encode_message(msg: &OscMessage) -> io::Result<Vec<u8>> {
    rosc::encoder::encode(&OscPacket::Message(msg.clone()))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}
