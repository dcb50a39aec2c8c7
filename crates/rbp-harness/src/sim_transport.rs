//! `turmoil`-backed [`Transport`] implementations.
//!
//! Mirrors `rbp_client::transport`'s `UdpTransport`/`TcpTransport` shape
//! exactly, swapping `tokio::net` for `turmoil::net` so the same encode/frame
//! logic runs inside a simulated host, where drops and partitions are
//! injected at the network layer by the simulation itself (see
//! `chaos_network_test.rs`'s TCP patterns, extended here to UDP and to RBP's
//! own framing).

use rbp_client::Transport;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use turmoil::net::{TcpStream, UdpSocket};

const MAX_PACKET_WORDS: usize = 4096;

/// UDP transport over a turmoil-simulated network.
pub struct SimUdpTransport {
    socket: UdpSocket,
}

impl SimUdpTransport {
    /// Bind an ephemeral local socket and connect it to `target`.
    pub async fn connect(target: &str) -> std::io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(target).await?;
        Ok(Self { socket })
    }
}

impl Transport for SimUdpTransport {
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

/// TCP transport over a turmoil-simulated network, length-prefixed the same
/// way as [`rbp_client::TcpTransport`].
pub struct SimTcpTransport {
    stream: TcpStream,
}

impl SimTcpTransport {
    /// Connect to `target`.
    pub async fn connect(target: &str) -> std::io::Result<Self> {
        let stream = TcpStream::connect(target).await?;
        Ok(Self { stream })
    }

    /// Wrap an already-accepted stream.
    #[must_use]
    pub fn from_stream(stream: TcpStream) -> Self {
        Self { stream }
    }
}

impl Transport for SimTcpTransport {
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
