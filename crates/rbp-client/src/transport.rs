//! Thin UDP/TCP transport collaborator (§1 "out of scope: the transport
//! layer itself"; given a concrete minimal shape, the way the teacher gives
//! its QUIC transport a concrete shape in `transport.rs`).
//!
//! Protocol logic never touches a socket directly: the driver in
//! [`crate::client`] only ever calls [`Transport::send`] and
//! [`Transport::recv`] with already-encoded word buffers.

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpStream, UdpSocket},
};

/// Sends and receives whole RBP packets as `u32` word buffers.
///
/// Framing is transport-specific: UDP packets are already message-delimited
/// by the datagram; TCP needs its own length prefix since RBP packets carry
/// no self-describing length (§6).
pub trait Transport: Send {
    /// Send one packet (already carrying its packet header, if any).
    fn send(&mut self, words: &[u32]) -> impl std::future::Future<Output = std::io::Result<()>> + Send;

    /// Receive one packet.
    fn recv(&mut self) -> impl std::future::Future<Output = std::io::Result<Vec<u32>>> + Send;
}

/// Maximum packet size in words; bounds the UDP receive buffer.
const MAX_PACKET_WORDS: usize = 4096;

/// UDP transport: one packet per datagram, no framing needed.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind an ephemeral local socket and connect it to `target`.
    pub async fn connect(target: (String, u16)) -> std::io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect((target.0.as_str(), target.1)).await?;
        Ok(Self { socket })
    }
}

impl Transport for UdpTransport {
    async fn send(&mut self, words: &[u32]) -> std::io::Result<()> {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        self.socket.send(&bytes).await?;
        Ok(())
    }

    async fn recv(&mut self) -> std::io::Result<Vec<u32>> {
        let mut buf = vec![0u8; MAX_PACKET_WORDS * 4];
        let n = self.socket.recv(&mut buf).await?;
        Ok(bytes_to_words(&buf[..n]))
    }
}

/// TCP transport: a 32-bit big-endian word count precedes each packet,
/// since TCP is a byte stream with no datagram boundaries of its own.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connect to `target`.
    pub async fn connect(target: (String, u16)) -> std::io::Result<Self> {
        let stream = TcpStream::connect((target.0.as_str(), target.1)).await?;
        Ok(Self { stream })
    }
}

impl Transport for TcpTransport {
    async fn send(&mut self, words: &[u32]) -> std::io::Result<()> {
        let word_count = u32::try_from(words.len()).unwrap_or(u32::MAX);
        self.stream.write_all(&word_count.to_be_bytes()).await?;
        for word in words {
            self.stream.write_all(&word.to_be_bytes()).await?;
        }
        Ok(())
    }

    async fn recv(&mut self) -> std::io::Result<Vec<u32>> {
        let mut len_buf = [0u8; 4];
        self.stream.read_exact(&mut len_buf).await?;
        let word_count = u32::from_be_bytes(len_buf) as usize;

        let mut bytes = vec![0u8; word_count * 4];
        self.stream.read_exact(&mut bytes).await?;
        Ok(bytes_to_words(&bytes))
    }
}

fn bytes_to_words(bytes: &[u8]) -> Vec<u32> {
    bytes.chunks_exact(4).map(|chunk| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])).collect()
}
