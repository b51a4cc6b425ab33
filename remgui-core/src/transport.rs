//! TCP transport: exact-length sends and receives for framed commands.
//!
//! Every command starts with an 8-byte [`MsgHeader`] carrying the
//! total message size, so receiving is always "read 8 bytes, then read
//! the remaining `size - 8`". Partial reads and writes never leak out
//! of this module.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::error::RemError;
use crate::wire::header::{HEADER_SIZE, MsgHeader};

/// Default port the server listens on.
pub const DEFAULT_PORT: u16 = 8888;

// ── Transport ────────────────────────────────────────────────────

/// One established connection, either side.
#[derive(Debug)]
pub struct Transport {
    stream: TcpStream,
    peer_addr: SocketAddr,
    /// Total bytes written since construction (for statistics).
    bytes_sent: AtomicU64,
    /// Total bytes read since construction.
    bytes_received: AtomicU64,
}

impl Transport {
    /// Wrap an accepted stream. `TCP_NODELAY` is set so small
    /// commands (ping, input) are not held back by Nagle.
    pub fn new(stream: TcpStream) -> Result<Self, RemError> {
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr()?;
        Ok(Self {
            stream,
            peer_addr,
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        })
    }

    /// Open an outbound connection to `addr`.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, RemError> {
        let stream = TcpStream::connect(addr).await?;
        Self::new(stream)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Total bytes written over this connection.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Total bytes read over this connection.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    /// Write the whole buffer or fail.
    pub async fn send_exact(&mut self, data: &[u8]) -> Result<(), RemError> {
        self.stream.write_all(data).await?;
        self.bytes_sent.fetch_add(data.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Fill the whole buffer or fail. A peer that closes the socket
    /// mid-message surfaces as an I/O error here.
    pub async fn receive_exact(&mut self, buf: &mut [u8]) -> Result<(), RemError> {
        self.stream.read_exact(buf).await?;
        self.bytes_received
            .fetch_add(buf.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Receive one complete command: header plus payload, returned as
    /// a single contiguous blob with the header still in front.
    ///
    /// The advertised size is checked against [`MAX_MESSAGE_SIZE`]
    /// before any payload allocation happens, so a hostile header
    /// cannot request an arbitrarily large buffer.
    ///
    /// [`MAX_MESSAGE_SIZE`]: crate::wire::MAX_MESSAGE_SIZE
    pub async fn receive_message(&mut self) -> Result<(MsgHeader, Bytes), RemError> {
        let mut head = [0u8; HEADER_SIZE];
        self.stream.read_exact(&mut head).await?;
        let header = MsgHeader::decode(&head)?;

        let mut buf = BytesMut::with_capacity(header.size as usize);
        buf.extend_from_slice(&head);
        buf.resize(header.size as usize, 0);
        self.stream.read_exact(&mut buf[HEADER_SIZE..]).await?;
        self.bytes_received
            .fetch_add(header.size as u64, Ordering::Relaxed);
        Ok((header, buf.freeze()))
    }

    /// Flush and close the write half, signalling EOF to the peer.
    pub async fn shutdown(&mut self) -> Result<(), RemError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

// ── Listener ─────────────────────────────────────────────────────

/// Accepting side of the transport.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, RemError> {
        let inner = TcpListener::bind(addr).await?;
        Ok(Self { inner })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RemError> {
        Ok(self.inner.local_addr()?)
    }

    pub async fn accept(&self) -> Result<Transport, RemError> {
        let (stream, _) = self.inner.accept().await?;
        Transport::new(stream)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::header::{MsgKind, encode_bare};

    #[tokio::test]
    async fn message_roundtrip_over_localhost() {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let mut t = listener.accept().await.unwrap();
            let (header, blob) = t.receive_message().await.unwrap();
            (header, blob)
        });

        let mut client = Transport::connect(addr).await.unwrap();
        let mut msg = Vec::new();
        msg.extend_from_slice(&MsgHeader::new(MsgKind::Texture, 12).encode());
        msg.extend_from_slice(&[1, 2, 3, 4]);
        client.send_exact(&msg).await.unwrap();

        let (header, blob) = server.await.unwrap();
        assert_eq!(header.kind, MsgKind::Texture);
        assert_eq!(header.size, 12);
        assert_eq!(&blob[..], &msg[..]);
    }

    #[tokio::test]
    async fn bare_command_roundtrip() {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let mut t = listener.accept().await.unwrap();
            t.receive_message().await.unwrap().0
        });

        let mut client = Transport::connect(addr).await.unwrap();
        client.send_exact(&encode_bare(MsgKind::Ping)).await.unwrap();

        let header = server.await.unwrap();
        assert_eq!(header.kind, MsgKind::Ping);
        assert_eq!(header.size as usize, HEADER_SIZE);
    }

    #[tokio::test]
    async fn oversized_header_rejected_before_allocation() {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let mut t = listener.accept().await.unwrap();
            t.receive_message().await
        });

        let mut client = Transport::connect(addr).await.unwrap();
        let mut head = [0u8; HEADER_SIZE];
        head[0..4].copy_from_slice(&u32::MAX.to_le_bytes());
        head[4] = MsgKind::Ping as u8;
        client.send_exact(&head).await.unwrap();

        assert!(matches!(
            server.await.unwrap(),
            Err(RemError::MessageTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn truncated_message_surfaces_as_io_error() {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let mut t = listener.accept().await.unwrap();
            t.receive_message().await
        });

        let mut client = Transport::connect(addr).await.unwrap();
        // Promise 100 bytes, deliver the header only, then close.
        client
            .send_exact(&MsgHeader::new(MsgKind::DrawFrame, 100).encode())
            .await
            .unwrap();
        drop(client);

        assert!(matches!(
            server.await.unwrap(),
            Err(RemError::Connection(_))
        ));
    }
}
