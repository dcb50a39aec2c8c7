//! Literal end-to-end scenarios (§8), driven against a turmoil-simulated
//! register-file target.

use rbp_client::{RbpClient, Transport};
use rbp_engine::{EngineConfig, OperationOutcome, ReliabilityConfig};
use rbp_harness::{RegisterFile, SimEnv, SimTcpTransport, SimUdpTransport, TargetRecoveryState};
use rbp_proto::{RbpVersion, TransactionHeader, TransactionType};
use turmoil::net::{TcpListener, UdpSocket};

const TARGET_UDP: &str = "0.0.0.0:50001";
const TARGET_TCP: &str = "0.0.0.0:50002";

async fn run_udp_target() -> std::io::Result<()> {
    let socket = UdpSocket::bind(TARGET_UDP).await?;
    let mut registers = RegisterFile::new();
    let mut recovery = TargetRecoveryState::new();
    let mut buf = vec![0u8; 4096];

    loop {
        let (n, peer) = socket.recv_from(&mut buf).await?;
        let words = buf[..n]
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect::<Vec<_>>();
        if let Some(reply) = recovery.accept_packet(&mut registers, &words) {
            let bytes: Vec<u8> = reply.iter().flat_map(|w| w.to_be_bytes()).collect();
            socket.send_to(&bytes, peer).await?;
        }
    }
}

async fn run_tcp_target() -> std::io::Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = TcpListener::bind(TARGET_TCP).await?;
    let (mut stream, _) = listener.accept().await?;
    let mut registers = RegisterFile::new();

    loop {
        let mut len_buf = [0u8; 4];
        if stream.read_exact(&mut len_buf).await.is_err() {
            return Ok(());
        }
        let word_count = u32::from_be_bytes(len_buf) as usize;
        let mut bytes = vec![0u8; word_count * 4];
        stream.read_exact(&mut bytes).await?;
        let words: Vec<u32> =
            bytes.chunks_exact(4).map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]])).collect();

        let reply = rbp_harness::sim_target::apply_transactions(&mut registers, RbpVersion::V1, &words);
        let reply_count = u32::try_from(reply.len()).unwrap_or(u32::MAX);
        stream.write_all(&reply_count.to_be_bytes()).await?;
        for word in &reply {
            stream.write_all(&word.to_be_bytes()).await?;
        }
    }
}

/// Drops exactly the `drop_at`th call to `send` (0-indexed) silently, as if
/// the network had swallowed that one packet.
struct DropNthSend<T: Transport> {
    inner: T,
    drop_at: usize,
    sends: usize,
}

impl<T: Transport> Transport for DropNthSend<T> {
    async fn send(&mut self, words: &[u32]) -> std::io::Result<()> {
        let index = self.sends;
        self.sends += 1;
        if index == self.drop_at {
            return Ok(());
        }
        self.inner.send(words).await
    }

    async fn recv(&mut self) -> std::io::Result<Vec<u32>> {
        self.inner.recv().await
    }
}

/// Like [`run_udp_target`], but silently swallows the very first reply it
/// would otherwise send, as if the network had dropped it in flight. The
/// target's own recovery bookkeeping (`last_seen`/`last_replied`) still
/// advances, since from the target's perspective it did answer.
async fn run_udp_target_dropping_first_reply() -> std::io::Result<()> {
    let socket = UdpSocket::bind(TARGET_UDP).await?;
    let mut registers = RegisterFile::new();
    let mut recovery = TargetRecoveryState::new();
    let mut buf = vec![0u8; 4096];
    let mut drop_next_reply = true;

    loop {
        let (n, peer) = socket.recv_from(&mut buf).await?;
        let words = buf[..n]
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect::<Vec<_>>();
        if let Some(reply) = recovery.accept_packet(&mut registers, &words) {
            if drop_next_reply {
                drop_next_reply = false;
                continue;
            }
            let bytes: Vec<u8> = reply.iter().flat_map(|w| w.to_be_bytes()).collect();
            socket.send_to(&bytes, peer).await?;
        }
    }
}

/// Scenario 1 (extended with a preceding write, since the register file
/// starts zeroed): write three words to `0x1000`, then read them back over
/// RBP 2.0 UDP.
#[test]
fn single_read_v2_round_trips_three_words() {
    let mut sim = turmoil::Builder::new().build();
    sim.host("target", || run_udp_target());

    sim.client("client", async {
        let transport = SimUdpTransport::connect("target:50001").await?;
        let mut client = RbpClient::new(
            SimEnv::with_seed(1),
            transport,
            RbpVersion::V2,
            EngineConfig::default(),
            Some(ReliabilityConfig::default()),
            None,
        )
        .expect("v2 client requires a reliability layer, which was supplied");

        client.stage_write(0x1000, &[0xaaaa_aaaa, 0xbbbb_bbbb, 0xcccc_cccc]).unwrap();
        client.dispatch().await.unwrap();

        let id = client.stage_read(0x1000, 3).unwrap();
        let outcomes = client.dispatch().await.unwrap();
        assert_eq!(
            outcomes,
            vec![OperationOutcome::Read {
                id,
                data: vec![0xaaaa_aaaa, 0xbbbb_bbbb, 0xcccc_cccc],
                info_code: rbp_proto::INFO_CODE_SUCCESS,
            }]
        );
        Ok(())
    });

    sim.run().expect("simulation failed");
}

/// Scenario 2: RMW_BITS returns the post-image value.
#[test]
fn rmw_bits_returns_the_post_image() {
    let mut sim = turmoil::Builder::new().build();
    sim.host("target", || run_udp_target());

    sim.client("client", async {
        let transport = SimUdpTransport::connect("target:50001").await?;
        let mut client = RbpClient::new(
            SimEnv::with_seed(2),
            transport,
            RbpVersion::V2,
            EngineConfig::default(),
            Some(ReliabilityConfig::default()),
            None,
        )
        .unwrap();

        client.stage_write(0x4, &[0xff]).unwrap();
        client.dispatch().await.unwrap();

        let id = client.stage_rmw_bits(0x4, 0x0f, 0xa0).unwrap();
        let outcomes = client.dispatch().await.unwrap();
        assert_eq!(
            outcomes,
            vec![OperationOutcome::RmwResult { id, value: 0xaf, info_code: rbp_proto::INFO_CODE_SUCCESS }]
        );
        Ok(())
    });

    sim.run().expect("simulation failed");
}

/// Scenario 3: staging past capacity would-blocks; a dispatch drains the
/// buffer and the retried stage succeeds.
#[test]
fn buffer_overflow_drains_on_dispatch_then_retry_succeeds() {
    let mut sim = turmoil::Builder::new().build();
    sim.host("target", || run_tcp_target());

    sim.client("client", async {
        let transport = SimTcpTransport::connect("target:50002").await?;
        let mut client = RbpClient::new(
            SimEnv::with_seed(3),
            transport,
            RbpVersion::V1,
            EngineConfig { max_send_words: 350, ..EngineConfig::default() },
            None,
            None,
        )
        .unwrap();

        // Word count is capped at u8::MAX per transaction, so two WRITEs are
        // needed to approach the 350-word capacity: 257 (header+addr+255
        // data) + 92 (header+addr+90 data) = 349, one short of capacity.
        client.stage_write(0x10, &vec![0u32; 255]).unwrap();
        client.stage_write(0x200, &vec![0u32; 90]).unwrap();

        let overflow = client.stage_write(0x9000, &[1, 2, 3, 4, 5]);
        assert!(overflow.is_err());

        client.dispatch().await.unwrap();

        let id = client.stage_write(0x9000, &[1, 2, 3, 4, 5]).unwrap();
        let outcomes = client.dispatch().await.unwrap();
        assert_eq!(outcomes, vec![OperationOutcome::Written { id, info_code: rbp_proto::INFO_CODE_SUCCESS }]);
        Ok(())
    });

    sim.run().expect("simulation failed");
}

/// Scenario 4: the first CONTROL packet never reaches the target. The
/// client times out, probes with STATUS, learns the target never saw it,
/// and resends the identical bytes; the retried delivery resolves the
/// sinks.
#[test]
fn dropped_request_recovers_via_status_and_resend() {
    let mut sim = turmoil::Builder::new().build();
    sim.host("target", || run_udp_target());

    sim.client("client", async {
        let transport = SimUdpTransport::connect("target:50001").await?;
        let flaky = DropNthSend { inner: transport, drop_at: 0, sends: 0 };
        let mut client = RbpClient::new(
            SimEnv::with_seed(4),
            flaky,
            RbpVersion::V2,
            EngineConfig::default(),
            Some(ReliabilityConfig {
                dispatch_timeout: std::time::Duration::from_millis(50),
                ..ReliabilityConfig::default()
            }),
            None,
        )
        .unwrap();

        let id = client.stage_bot().unwrap();
        let outcomes = client.dispatch().await.unwrap();
        assert_eq!(outcomes, vec![OperationOutcome::Bot { id }]);
        Ok(())
    });

    sim.run().expect("simulation failed");
}

/// Scenario 4 has a gap the literal text doesn't name: the CONTROL reply can
/// be lost just as easily as the request, and the STATUS probe that follows
/// it is itself just another datagram the network can swallow. Here the
/// target answers CONTROL but that reply is dropped, then the client's
/// first STATUS probe is dropped too; the client must retry the probe on
/// its own rather than wait on a reply that already went missing.
#[test]
fn dropped_status_probe_is_retried_until_it_lands() {
    let mut sim = turmoil::Builder::new().build();
    sim.host("target", || run_udp_target_dropping_first_reply());

    sim.client("client", async {
        let transport = SimUdpTransport::connect("target:50001").await?;
        let flaky = DropNthSend { inner: transport, drop_at: 1, sends: 0 };
        let mut client = RbpClient::new(
            SimEnv::with_seed(6),
            flaky,
            RbpVersion::V2,
            EngineConfig::default(),
            Some(ReliabilityConfig {
                dispatch_timeout: std::time::Duration::from_millis(50),
                ..ReliabilityConfig::default()
            }),
            None,
        )
        .unwrap();

        let id = client.stage_bot().unwrap();
        let outcomes = client.dispatch().await.unwrap();
        assert_eq!(outcomes, vec![OperationOutcome::Bot { id }]);
        Ok(())
    });

    sim.run().expect("simulation failed");
}

/// Scenario 5: the target's reply carries a transaction id one off from
/// what was requested. Validation must fail, not silently accept it.
#[test]
fn mismatched_transaction_id_is_a_fatal_error() {
    let mut sim = turmoil::Builder::new().build();

    sim.host("target", || async {
        let socket = UdpSocket::bind(TARGET_UDP).await?;
        let mut buf = vec![0u8; 4096];
        let (_n, peer) = socket.recv_from(&mut buf).await?;

        let bad_reply = TransactionHeader::calculate_header(RbpVersion::V1, TransactionType::Bot, 1, 0).unwrap();
        let bytes: Vec<u8> = bad_reply.to_be_bytes().to_vec();
        socket.send_to(&bytes, peer).await?;
        Ok(())
    });

    sim.client("client", async {
        let transport = SimUdpTransport::connect("target:50001").await?;
        let mut client =
            RbpClient::new(SimEnv::with_seed(5), transport, RbpVersion::V1, EngineConfig::default(), None, None)
                .unwrap();

        client.stage_bot().unwrap();
        let result = client.dispatch().await;
        assert!(result.is_err());
        Ok(())
    });

    sim.run().expect("simulation failed");
}

