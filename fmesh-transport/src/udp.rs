use std::io;
use std::net::SocketAddr;

use fmesh_core::Message;
use log::{debug, warn};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// Fixed receive buffer capacity. Must exceed any expected snapshot
/// datagram; larger payloads truncate silently at the transport layer and
/// the codec decodes only the truncated length.
pub const RECV_BUFFER_SIZE: usize = 5120;

/// Send one heartbeat datagram from an ephemeral socket.
///
/// The socket lives for exactly this send and is dropped afterwards.
/// Best-effort: the caller logs failures and never retries.
pub async fn send_heartbeat(server: SocketAddr, data: &[u8]) -> io::Result<usize> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.send_to(data, server).await
}

/// Long-lived receive side for server snapshots
///
/// Binds once for the process lifetime, then loops: block on receive,
/// decode exactly the received byte count, and hand the decoded message to
/// the consumer channel. Malformed datagrams are dropped with a log line.
pub struct SnapshotReceiver {
    socket: UdpSocket,
}

impl SnapshotReceiver {
    /// Bind the long-lived snapshot socket
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive loop. Runs until the socket errors or the consumer side of
    /// the channel is dropped.
    pub async fn run(self, updates: mpsc::Sender<Message>) -> io::Result<()> {
        let mut buffer = [0u8; RECV_BUFFER_SIZE];
        loop {
            let (len, peer) = self.socket.recv_from(&mut buffer).await?;
            // Only the bytes this datagram actually carried; the rest of
            // the buffer is stale data from earlier datagrams.
            match Message::decode(&buffer[..len]) {
                Ok(message) => {
                    debug!("received {} byte snapshot from {}", len, peer);
                    if updates.send(message).await.is_err() {
                        debug!("snapshot consumer gone, stopping receive loop");
                        return Ok(());
                    }
                }
                Err(e) => warn!("dropping malformed datagram from {}: {}", peer, e),
            }
        }
    }
}
