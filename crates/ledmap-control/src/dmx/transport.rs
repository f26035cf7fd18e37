//! Packet transport

use std::io;
use std::net::{SocketAddr, UdpSocket};

/// Sends finished packets to a destination
pub trait DmxTransport: Send + Sync {
    fn send(&self, packet: &[u8], target: SocketAddr) -> io::Result<usize>;
}

/// UDP transport, unicast or broadcast
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind an ephemeral socket with broadcast enabled
    pub fn bind() -> io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_broadcast(true)?;
        tracing::info!("Art-Net socket bound to {}", socket.local_addr()?);
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl DmxTransport for UdpTransport {
    fn send(&self, packet: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(packet, target)
    }
}
