//! Per-client dispatch driver (§4.2, §4.3, §5).
//!
//! Wires a [`TransactionEngine`] (staging/validation), an optional
//! [`ReliabilityLayer`] (v2.0 recovery), an optional [`AddressTree`] (dotted
//! path lookup) and a [`Transport`] into a single `dispatch` cycle. Staging
//! never blocks (§5); `dispatch` is the one suspension point, and it is
//! where the RBP 2.0 STATUS/RESEND recovery loop in §4.3 lives.
//!
//! STATUS replies carry a payload the original specifies only in prose
//! ("describing which counters it has seen and which it has replied to",
//! §4.3): this driver uses two words, `[last_counter_seen,
//! last_counter_replied]`, following the packet header. See DESIGN.md.

use std::time::Duration;

use rbp_address::{AddressTree, Node};
use rbp_engine::{
    EngineConfig, EngineError, Environment, OperationId, OperationOutcome, ReliabilityAction,
    ReliabilityConfig, ReliabilityLayer, TransactionEngine,
};
use rbp_proto::{PacketHeader, PacketType, RbpVersion};
use tracing::{debug, instrument, warn};

use crate::{error::ClientError, transport::Transport};

/// How often the recv loop wakes up to give the reliability layer a chance
/// to check its dispatch timeout, independent of any particular transport's
/// own timeout granularity.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A single register-bus endpoint: staging, dispatch, and (for v2.0)
/// recovery, bound to one transport and one optional address map.
pub struct RbpClient<E: Environment, T: Transport> {
    env: E,
    version: RbpVersion,
    engine: TransactionEngine,
    reliability: Option<ReliabilityLayer<E::Instant>>,
    address_tree: Option<AddressTree>,
    transport: T,
}

impl<E: Environment, T: Transport> RbpClient<E, T> {
    /// Build a client for `version`, rejecting a reliability layer on v1.x
    /// and requiring one on v2.0 (§4.3 only applies from v2.0 onward).
    ///
    /// # Errors
    ///
    /// `ClientError::ReliabilityLayerMismatch` if `reliability` disagrees
    /// with what `version` requires.
    pub fn new(
        env: E,
        transport: T,
        version: RbpVersion,
        engine_config: EngineConfig,
        reliability_config: Option<ReliabilityConfig>,
        address_tree: Option<AddressTree>,
    ) -> Result<Self, ClientError> {
        if version.has_packet_header() != reliability_config.is_some() {
            return Err(ClientError::ReliabilityLayerMismatch);
        }
        Ok(Self {
            env,
            version,
            engine: TransactionEngine::new(version, engine_config),
            reliability: reliability_config.map(ReliabilityLayer::new),
            address_tree,
            transport,
        })
    }

    /// Protocol version this client speaks.
    #[must_use]
    pub fn version(&self) -> RbpVersion {
        self.version
    }

    /// Number of operations staged but not yet validated against a reply.
    #[must_use]
    pub fn pending_operations(&self) -> usize {
        self.engine.pending_operations()
    }

    /// Resolve a dotted path against the bound address tree.
    ///
    /// # Errors
    ///
    /// `ClientError::Address` if no tree is bound, or the path is unknown.
    pub fn resolve(&self, dotted_path: &str) -> Result<&Node, ClientError> {
        let tree = self
            .address_tree
            .as_ref()
            .ok_or_else(|| ClientError::Address(rbp_address::AddressError::UnknownPath(dotted_path.to_string())))?;
        Ok(tree.resolve(dotted_path)?)
    }

    /// Stage a byte-order test transaction.
    ///
    /// # Errors
    ///
    /// See [`TransactionEngine::stage_bot`].
    pub fn stage_bot(&mut self) -> Result<OperationId, ClientError> {
        Ok(self.engine.stage_bot()?)
    }

    /// Stage an incrementing read.
    ///
    /// # Errors
    ///
    /// See [`TransactionEngine::stage_read`].
    pub fn stage_read(&mut self, address: u32, word_count: u8) -> Result<OperationId, ClientError> {
        Ok(self.engine.stage_read(address, word_count)?)
    }

    /// Stage a non-incrementing read.
    ///
    /// # Errors
    ///
    /// See [`TransactionEngine::stage_ni_read`].
    pub fn stage_ni_read(&mut self, address: u32, word_count: u8) -> Result<OperationId, ClientError> {
        Ok(self.engine.stage_ni_read(address, word_count)?)
    }

    /// Stage an incrementing write.
    ///
    /// # Errors
    ///
    /// See [`TransactionEngine::stage_write`].
    pub fn stage_write(&mut self, address: u32, data: &[u32]) -> Result<OperationId, ClientError> {
        Ok(self.engine.stage_write(address, data)?)
    }

    /// Stage a non-incrementing write.
    ///
    /// # Errors
    ///
    /// See [`TransactionEngine::stage_ni_write`].
    pub fn stage_ni_write(&mut self, address: u32, data: &[u32]) -> Result<OperationId, ClientError> {
        Ok(self.engine.stage_ni_write(address, data)?)
    }

    /// Stage a bitwise read-modify-write.
    ///
    /// # Errors
    ///
    /// See [`TransactionEngine::stage_rmw_bits`].
    pub fn stage_rmw_bits(
        &mut self,
        address: u32,
        and_term: u32,
        or_term: u32,
    ) -> Result<OperationId, ClientError> {
        Ok(self.engine.stage_rmw_bits(address, and_term, or_term)?)
    }

    /// Stage an arithmetic read-modify-write.
    ///
    /// # Errors
    ///
    /// See [`TransactionEngine::stage_rmw_sum`].
    pub fn stage_rmw_sum(&mut self, address: u32, addend: u32) -> Result<OperationId, ClientError> {
        Ok(self.engine.stage_rmw_sum(address, addend)?)
    }

    /// Dispatch every staged transaction and block until their replies are
    /// validated, running v2.0 STATUS/RESEND recovery as needed.
    ///
    /// # Errors
    ///
    /// `ClientError::Transport` on an I/O failure, `ClientError::Engine` on
    /// a structural reply mismatch, `ClientError::RecoveryExhausted` if
    /// recovery could not restore synchronization within its configured
    /// rounds.
    #[instrument(skip(self), fields(version = %self.version))]
    pub async fn dispatch(&mut self) -> Result<Vec<OperationOutcome>, ClientError> {
        let words = self.engine.send_buffer().to_vec();
        if words.is_empty() {
            return Ok(Vec::new());
        }

        if self.reliability.is_some() {
            self.dispatch_with_recovery(&words).await
        } else {
            self.dispatch_plain(&words).await
        }
    }

    async fn dispatch_plain(&mut self, words: &[u32]) -> Result<Vec<OperationOutcome>, ClientError> {
        self.transport.send(words).await?;
        let reply = self.transport.recv().await?;
        debug!(words = reply.len(), "received v1 reply");
        Ok(self.engine.validate(&reply)?)
    }

    async fn dispatch_with_recovery(&mut self, words: &[u32]) -> Result<Vec<OperationOutcome>, ClientError> {
        let now = self.env.now();
        let actions = self
            .reliability
            .as_mut()
            .ok_or(ClientError::ReliabilityLayerMismatch)?
            .dispatch(words, now);
        self.perform_actions(actions).await?;

        loop {
            match tokio::time::timeout(POLL_INTERVAL, self.transport.recv()).await {
                Ok(Ok(packet)) => {
                    if let Some(outcomes) = self.handle_incoming(&packet).await? {
                        return Ok(outcomes);
                    }
                },
                Ok(Err(io_err)) => return Err(io_err.into()),
                Err(_elapsed) => {
                    let now = self.env.now();
                    let actions =
                        self.reliability.as_mut().ok_or(ClientError::ReliabilityLayerMismatch)?.tick(now);
                    self.perform_actions(actions).await?;
                },
            }
        }
    }

    async fn perform_actions(&mut self, actions: Vec<ReliabilityAction>) -> Result<(), ClientError> {
        for action in actions {
            match action {
                ReliabilityAction::SendPacket(packet) => self.transport.send(&packet).await?,
                ReliabilityAction::Desynchronize => {
                    warn!("recovery exhausted, desynchronizing");
                    self.engine.reset();
                    return Err(ClientError::RecoveryExhausted);
                },
            }
        }
        Ok(())
    }

    async fn handle_incoming(&mut self, packet: &[u32]) -> Result<Option<Vec<OperationOutcome>>, ClientError> {
        let Some((&header_word, rest)) = packet.split_first() else {
            return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "empty packet").into());
        };
        let header = PacketHeader::decode(header_word).map_err(EngineError::from)?;

        match header.packet_type {
            PacketType::Control => {
                self.reliability
                    .as_mut()
                    .ok_or(ClientError::ReliabilityLayerMismatch)?
                    .accept_reply(&header)?;
                debug!(counter = header.packet_counter, "control reply accepted");
                Ok(Some(self.engine.validate(rest)?))
            },
            PacketType::Status => {
                let (seen, replied) = match rest {
                    [seen, replied] => (*seen as u16, *replied as u16),
                    _ => {
                        return Err(std::io::Error::new(
                            std::io::ErrorKind::InvalidData,
                            "malformed status payload",
                        )
                        .into());
                    },
                };
                self.accept_status(seen, replied).await?;
                Ok(None)
            },
            PacketType::Resend => Err(EngineError::Protocol(rbp_proto::ProtocolError::IllegalPacketHeader(header_word)).into()),
        }
    }

    async fn accept_status(&mut self, seen: u16, replied: u16) -> Result<(), ClientError> {
        let reliability = self.reliability.as_mut().ok_or(ClientError::ReliabilityLayerMismatch)?;
        reliability.check_window(seen)?;
        let Some(outstanding) = reliability.outstanding_counter() else {
            return Ok(());
        };

        let target_saw_request = seen >= outstanding;
        let target_sent_reply = replied >= outstanding;
        let now = self.env.now();
        let actions = reliability.accept_status(target_saw_request, target_sent_reply, now);
        self.perform_actions(actions).await
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
        time::Instant,
    };

    use rbp_proto::{INFO_CODE_SUCCESS, TransactionHeader, TransactionType};

    use super::*;

    #[derive(Clone)]
    struct TestEnv;

    impl Environment for TestEnv {
        type Instant = Instant;

        fn now(&self) -> Self::Instant {
            Instant::now()
        }

        async fn sleep(&self, _duration: Duration) {}

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(0);
        }
    }

    struct ChannelTransport {
        outbound: Arc<Mutex<Vec<Vec<u32>>>>,
        inbound: Arc<Mutex<VecDeque<Vec<u32>>>>,
    }

    impl Transport for ChannelTransport {
        async fn send(&mut self, words: &[u32]) -> std::io::Result<()> {
            self.outbound.lock().unwrap().push(words.to_vec());
            Ok(())
        }

        async fn recv(&mut self) -> std::io::Result<Vec<u32>> {
            loop {
                if let Some(packet) = self.inbound.lock().unwrap().pop_front() {
                    return Ok(packet);
                }
                tokio::task::yield_now().await;
            }
        }
    }

    fn reply_word(version: RbpVersion, transaction_type: TransactionType, id: u16, wc: u8, info: u8) -> u32 {
        let mut header = TransactionHeader::calculate_header(version, transaction_type, id, wc).unwrap();
        header &= !0xf;
        header |= u32::from(info);
        header
    }

    #[tokio::test]
    async fn v1_dispatch_round_trips_a_read() {
        let inbound = Arc::new(Mutex::new(VecDeque::new()));
        let outbound = Arc::new(Mutex::new(Vec::new()));
        let transport = ChannelTransport { outbound: outbound.clone(), inbound: inbound.clone() };

        let mut client =
            RbpClient::new(TestEnv, transport, RbpVersion::V1, EngineConfig::default(), None, None).unwrap();
        let id = client.stage_read(0x100, 2).unwrap();

        inbound.lock().unwrap().push_back(vec![
            reply_word(RbpVersion::V1, TransactionType::Read, 0, 2, INFO_CODE_SUCCESS),
            0x1,
            0x2,
        ]);

        let outcomes = client.dispatch().await.unwrap();
        assert_eq!(outcomes, vec![OperationOutcome::Read { id, data: vec![0x1, 0x2], info_code: INFO_CODE_SUCCESS }]);
        assert_eq!(outbound.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn v2_requires_a_reliability_layer() {
        let transport =
            ChannelTransport { outbound: Arc::new(Mutex::new(Vec::new())), inbound: Arc::new(Mutex::new(VecDeque::new())) };
        let result = RbpClient::new(TestEnv, transport, RbpVersion::V2, EngineConfig::default(), None, None);
        assert!(matches!(result, Err(ClientError::ReliabilityLayerMismatch)));
    }

    #[tokio::test]
    async fn v2_dispatch_wraps_and_unwraps_the_packet_header() {
        let inbound = Arc::new(Mutex::new(VecDeque::new()));
        let outbound = Arc::new(Mutex::new(Vec::new()));
        let transport = ChannelTransport { outbound: outbound.clone(), inbound: inbound.clone() };

        let mut client = RbpClient::new(
            TestEnv,
            transport,
            RbpVersion::V2,
            EngineConfig::default(),
            Some(ReliabilityConfig::default()),
            None,
        )
        .unwrap();
        let id = client.stage_bot().unwrap();

        let reply_header = PacketHeader { packet_counter: 1, packet_type: PacketType::Control }.encode();
        inbound.lock().unwrap().push_back(vec![
            reply_header,
            reply_word(RbpVersion::V2, TransactionType::Bot, 0, 0, INFO_CODE_SUCCESS),
        ]);

        let outcomes = client.dispatch().await.unwrap();
        assert_eq!(outcomes, vec![OperationOutcome::Bot { id }]);

        let sent = outbound.lock().unwrap();
        let header = PacketHeader::decode(sent[0][0]).unwrap();
        assert_eq!(header.packet_counter, 1);
        assert_eq!(header.packet_type, PacketType::Control);
    }
}
