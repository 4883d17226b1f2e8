//! Reference transport binding: length-prefixed frames over TCP.
//!
//! The core consumes a reliable, ordered datagram transport with named
//! sub-streams and a 32-bit protocol tag in receive metadata. This
//! binding carries each datagram as
//! `tag (u32 BE) | sub-stream (u16 BE) | length (u32 BE) | payload`.
//! Clean EOF surfaces as [`TransportEvent::Shutdown`]; a mid-frame EOF
//! or socket error surfaces as [`TransportEvent::AssocLost`]. Frames
//! whose tag is not the GDT protocol tag are delivered anyway so the
//! state machine can count them as discarded.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

/// Sub-stream id ceiling (named sub-streams per association).
pub const MAX_SUB_STREAMS: u16 = 16;

/// Hard ceiling on a single frame; anything larger is a framing error.
const MAX_FRAME_LEN: u32 = 1 << 20;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame length {0} exceeds limit")]
    FrameTooLarge(u32),
}

#[derive(Debug)]
pub enum TransportEvent {
    Data { tag: u32, sub_stream: u16, bytes: Vec<u8> },
    /// Peer shut the association down cleanly.
    Shutdown,
    /// Association lost mid-frame or on a socket error.
    AssocLost,
}

pub struct Conn {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Conn {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn split(self) -> (ConnReader, ConnWriter) {
        let (r, w) = self.stream.into_split();
        (ConnReader { inner: r }, ConnWriter { inner: w })
    }
}

pub struct ConnReader {
    inner: OwnedReadHalf,
}

impl ConnReader {
    /// Receive one datagram or a connection-state notification.
    pub async fn recv(&mut self) -> Result<TransportEvent, TransportError> {
        let mut head = [0u8; 10];
        match self.inner.read_exact(&mut head).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(TransportEvent::Shutdown)
            }
            Err(_) => return Ok(TransportEvent::AssocLost),
        }
        let tag = u32::from_be_bytes([head[0], head[1], head[2], head[3]]);
        let sub_stream = u16::from_be_bytes([head[4], head[5]]);
        let len = u32::from_be_bytes([head[6], head[7], head[8], head[9]]);
        if len > MAX_FRAME_LEN {
            return Err(TransportError::FrameTooLarge(len));
        }
        let mut bytes = vec![0u8; len as usize];
        match self.inner.read_exact(&mut bytes).await {
            Ok(_) => Ok(TransportEvent::Data { tag, sub_stream, bytes }),
            Err(_) => Ok(TransportEvent::AssocLost),
        }
    }
}

pub struct ConnWriter {
    inner: OwnedWriteHalf,
}

impl ConnWriter {
    /// Send one datagram on the given sub-stream.
    pub async fn send(&mut self, sub_stream: u16, bytes: &[u8]) -> Result<(), TransportError> {
        let mut head = [0u8; 10];
        head[0..4].copy_from_slice(&gdt_protocol::PROTOCOL_TAG.to_be_bytes());
        head[4..6].copy_from_slice(&(sub_stream % MAX_SUB_STREAMS).to_be_bytes());
        head[6..10].copy_from_slice(&(bytes.len() as u32).to_be_bytes());
        self.inner.write_all(&head).await?;
        self.inner.write_all(bytes).await?;
        Ok(())
    }
}

pub async fn connect(addr: SocketAddr) -> Result<Conn, TransportError> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(Conn { stream, peer: addr })
}

pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        Ok(Listener { inner: TcpListener::bind(addr).await? })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.inner.local_addr()?)
    }

    pub async fn accept(&self) -> Result<Conn, TransportError> {
        let (stream, peer) = self.inner.accept().await?;
        stream.set_nodelay(true)?;
        Ok(Conn { stream, peer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frame_round_trip() {
        let listener = Listener::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let conn = connect(addr).await.unwrap();
            let (_r, mut w) = conn.split();
            w.send(3, b"hello gdt").await.unwrap();
        });

        let conn = listener.accept().await.unwrap();
        let (mut r, _w) = conn.split();
        match r.recv().await.unwrap() {
            TransportEvent::Data { tag, sub_stream, bytes } => {
                assert_eq!(tag, gdt_protocol::PROTOCOL_TAG);
                assert_eq!(sub_stream, 3);
                assert_eq!(bytes, b"hello gdt");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        client.await.unwrap();
    }

    #[tokio::test]
    async fn clean_close_is_shutdown() {
        let listener = Listener::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let _conn = connect(addr).await.unwrap();
            // dropped immediately
        });

        let conn = listener.accept().await.unwrap();
        let (mut r, _w) = conn.split();
        assert!(matches!(r.recv().await.unwrap(), TransportEvent::Shutdown));
        client.await.unwrap();
    }
}
