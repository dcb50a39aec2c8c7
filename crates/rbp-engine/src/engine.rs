//! Transaction staging and reply validation (§4.2).
//!
//! The engine owns a fixed-capacity send buffer and a monotonic transaction
//! id counter. Staging a transaction writes its header and operands into the
//! buffer immediately and never blocks: once the buffer would overflow,
//! every `stage_*` call returns `EngineError::WouldBlock` until the caller
//! drains it by dispatching and validating a reply.

use std::collections::VecDeque;

use rbp_proto::{Cursor, INFO_CODE_SUCCESS, RbpVersion, TransactionHeader, TransactionType};

use crate::{config::EngineConfig, error::EngineError};

/// Identifies a single staged operation across its request/reply lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationId(u64);

/// Result of validating one transaction's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// Byte-order test completed.
    Bot {
        /// The operation this outcome answers.
        id: OperationId,
    },
    /// Read or non-incrementing read completed.
    Read {
        /// The operation this outcome answers.
        id: OperationId,
        /// Words returned by the target.
        data: Vec<u32>,
        /// Per-transaction status reported by the target.
        info_code: u8,
    },
    /// Write or non-incrementing write completed.
    Written {
        /// The operation this outcome answers.
        id: OperationId,
        /// Per-transaction status reported by the target.
        info_code: u8,
    },
    /// Read-modify-write completed.
    RmwResult {
        /// The operation this outcome answers.
        id: OperationId,
        /// Value the register held after the read-modify-write.
        value: u32,
        /// Per-transaction status reported by the target.
        info_code: u8,
    },
}

/// An outstanding request the engine expects a matching reply for, in
/// dispatch order.
#[derive(Debug, Clone, Copy)]
struct ExpectedReply {
    id: OperationId,
    transaction_type: TransactionType,
    transaction_id: u16,
    requested_word_count: u8,
}

/// Stages requests into a buffer and validates their replies (§4.2).
///
/// Generic over nothing: unlike the reliability layer, staging and
/// validation have no notion of time and need no `Environment`.
#[derive(Debug)]
pub struct TransactionEngine {
    version: RbpVersion,
    config: EngineConfig,
    send_buffer: Vec<u32>,
    next_transaction_id: u16,
    next_operation_id: u64,
    expected: VecDeque<ExpectedReply>,
}

impl TransactionEngine {
    /// Create an engine for the given protocol version.
    #[must_use]
    pub fn new(version: RbpVersion, config: EngineConfig) -> Self {
        Self {
            version,
            config,
            send_buffer: Vec::with_capacity(config.max_send_words),
            next_transaction_id: 0,
            next_operation_id: 0,
            expected: VecDeque::new(),
        }
    }

    /// Words staged so far, ready to be wrapped in a packet and dispatched.
    #[must_use]
    pub fn send_buffer(&self) -> &[u32] {
        &self.send_buffer
    }

    /// Number of operations staged but not yet validated against a reply.
    #[must_use]
    pub fn pending_operations(&self) -> usize {
        self.expected.len()
    }

    /// Clear the send buffer and outstanding-reply queue without
    /// dispatching. Used when a connection is torn down and reopened.
    pub fn reset(&mut self) {
        self.send_buffer.clear();
        self.expected.clear();
    }

    fn allocate_transaction_id(&mut self) -> u16 {
        let id = self.next_transaction_id;
        self.next_transaction_id = (id + 1) % self.version.transaction_id_space();
        id
    }

    fn allocate_operation_id(&mut self) -> OperationId {
        let id = OperationId(self.next_operation_id);
        self.next_operation_id += 1;
        id
    }

    fn would_fit(&self, additional_words: usize) -> bool {
        self.send_buffer.len() + additional_words <= self.config.max_send_words
    }

    fn stage_header(
        &mut self,
        transaction_type: TransactionType,
        word_count: u8,
    ) -> Result<(u16, OperationId), EngineError> {
        if word_count > self.config.max_word_count {
            return Err(EngineError::WordCountTooLarge(word_count));
        }
        let transaction_id = self.allocate_transaction_id();
        let header =
            TransactionHeader::calculate_header(self.version, transaction_type, transaction_id, word_count)?;
        self.send_buffer.push(header);
        Ok((transaction_id, self.allocate_operation_id()))
    }

    /// Stage a byte-order test transaction.
    ///
    /// # Errors
    ///
    /// `EngineError::WouldBlock` if the send buffer has no room.
    pub fn stage_bot(&mut self) -> Result<OperationId, EngineError> {
        if !self.would_fit(1) {
            return Err(EngineError::WouldBlock);
        }
        let (transaction_id, id) = self.stage_header(TransactionType::Bot, 0)?;
        self.expected.push_back(ExpectedReply {
            id,
            transaction_type: TransactionType::Bot,
            transaction_id,
            requested_word_count: 0,
        });
        Ok(id)
    }

    fn stage_read_like(
        &mut self,
        transaction_type: TransactionType,
        address: u32,
        word_count: u8,
    ) -> Result<OperationId, EngineError> {
        if word_count > self.config.max_word_count {
            return Err(EngineError::WordCountTooLarge(word_count));
        }
        if !self.would_fit(2) {
            return Err(EngineError::WouldBlock);
        }
        let (transaction_id, id) = self.stage_header(transaction_type, word_count)?;
        self.send_buffer.push(address);
        self.expected.push_back(ExpectedReply {
            id,
            transaction_type,
            transaction_id,
            requested_word_count: word_count,
        });
        Ok(id)
    }

    /// Stage an incrementing read of `word_count` words starting at
    /// `address`.
    ///
    /// # Errors
    ///
    /// `EngineError::WouldBlock` if the send buffer has no room,
    /// `EngineError::WordCountTooLarge` if `word_count` exceeds the
    /// configured limit.
    pub fn stage_read(&mut self, address: u32, word_count: u8) -> Result<OperationId, EngineError> {
        self.stage_read_like(TransactionType::Read, address, word_count)
    }

    /// Stage a non-incrementing (FIFO-style) read of `word_count` words from
    /// `address`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::stage_read`].
    pub fn stage_ni_read(&mut self, address: u32, word_count: u8) -> Result<OperationId, EngineError> {
        self.stage_read_like(TransactionType::NiRead, address, word_count)
    }

    fn stage_write_like(
        &mut self,
        transaction_type: TransactionType,
        address: u32,
        data: &[u32],
    ) -> Result<OperationId, EngineError> {
        let word_count = u8::try_from(data.len()).map_err(|_| EngineError::WordCountTooLarge(u8::MAX))?;
        if word_count > self.config.max_word_count {
            return Err(EngineError::WordCountTooLarge(word_count));
        }
        if !self.would_fit(2 + data.len()) {
            return Err(EngineError::WouldBlock);
        }
        let (transaction_id, id) = self.stage_header(transaction_type, word_count)?;
        self.send_buffer.push(address);
        self.send_buffer.extend_from_slice(data);
        self.expected.push_back(ExpectedReply {
            id,
            transaction_type,
            transaction_id,
            requested_word_count: 0,
        });
        Ok(id)
    }

    /// Stage an incrementing write of `data` starting at `address`.
    ///
    /// # Errors
    ///
    /// `EngineError::WouldBlock` if the send buffer has no room,
    /// `EngineError::WordCountTooLarge` if `data` is longer than the
    /// configured limit or than a `u8` can hold.
    pub fn stage_write(&mut self, address: u32, data: &[u32]) -> Result<OperationId, EngineError> {
        self.stage_write_like(TransactionType::Write, address, data)
    }

    /// Stage a non-incrementing (FIFO-style) write of `data` to `address`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::stage_write`].
    pub fn stage_ni_write(&mut self, address: u32, data: &[u32]) -> Result<OperationId, EngineError> {
        self.stage_write_like(TransactionType::NiWrite, address, data)
    }

    /// Stage a bitwise read-modify-write: `v <- (v & and_term) | or_term`.
    ///
    /// # Errors
    ///
    /// `EngineError::WouldBlock` if the send buffer has no room.
    pub fn stage_rmw_bits(
        &mut self,
        address: u32,
        and_term: u32,
        or_term: u32,
    ) -> Result<OperationId, EngineError> {
        if !self.would_fit(4) {
            return Err(EngineError::WouldBlock);
        }
        let (transaction_id, id) = self.stage_header(TransactionType::RmwBits, 0)?;
        self.send_buffer.extend_from_slice(&[address, and_term, or_term]);
        self.expected.push_back(ExpectedReply {
            id,
            transaction_type: TransactionType::RmwBits,
            transaction_id,
            requested_word_count: 0,
        });
        Ok(id)
    }

    /// Stage an arithmetic read-modify-write: `v <- v + addend`.
    ///
    /// # Errors
    ///
    /// `EngineError::WouldBlock` if the send buffer has no room.
    pub fn stage_rmw_sum(&mut self, address: u32, addend: u32) -> Result<OperationId, EngineError> {
        if !self.would_fit(3) {
            return Err(EngineError::WouldBlock);
        }
        let (transaction_id, id) = self.stage_header(TransactionType::RmwSum, 0)?;
        self.send_buffer.extend_from_slice(&[address, addend]);
        self.expected.push_back(ExpectedReply {
            id,
            transaction_type: TransactionType::RmwSum,
            transaction_id,
            requested_word_count: 0,
        });
        Ok(id)
    }

    /// Decode `reply` against the outstanding expected-reply queue, in
    /// order, and clear the send buffer once every expected reply has been
    /// consumed.
    ///
    /// # Errors
    ///
    /// `EngineError::TransactionIdMismatch` if a reply answers a different
    /// request than the oldest outstanding one. `EngineError::Protocol` if a
    /// reply's transaction type does not match what was staged, or the
    /// header itself fails to parse. `EngineError::ReplyWordCountMismatch`
    /// if a non-incrementing read's reply word count disagrees with what
    /// was requested. `EngineError::TargetReportedError` if
    /// `strict_write_errors` is set and a write-family reply carries a
    /// non-success info code.
    pub fn validate(&mut self, reply: &[u32]) -> Result<Vec<OperationOutcome>, EngineError> {
        let mut cursor = Cursor::new(reply);
        let mut outcomes = Vec::with_capacity(self.expected.len());

        while let Some(expected) = self.expected.pop_front() {
            let word = cursor.read_word()?;
            let header = TransactionHeader::extract_header(self.version, word)?;

            if header.transaction_id != expected.transaction_id {
                return Err(EngineError::TransactionIdMismatch {
                    expected: expected.transaction_id,
                    actual: header.transaction_id,
                });
            }
            if header.transaction_type != expected.transaction_type {
                return Err(EngineError::Protocol(
                    rbp_proto::ProtocolError::UnableToParseHeader(word),
                ));
            }

            match expected.transaction_type {
                TransactionType::Bot => {
                    outcomes.push(OperationOutcome::Bot { id: expected.id });
                },
                TransactionType::Read | TransactionType::NiRead | TransactionType::ConfigSpace => {
                    if expected.transaction_type == TransactionType::NiRead
                        && header.word_count != expected.requested_word_count
                    {
                        return Err(EngineError::ReplyWordCountMismatch {
                            expected: expected.requested_word_count,
                            actual: header.word_count,
                        });
                    }
                    let data = cursor.read_slice(header.word_count as usize)?.to_vec();
                    outcomes.push(OperationOutcome::Read { id: expected.id, data, info_code: header.info_code });
                },
                TransactionType::Write | TransactionType::NiWrite => {
                    if self.config.strict_write_errors && header.info_code != INFO_CODE_SUCCESS {
                        return Err(EngineError::TargetReportedError(header.info_code));
                    }
                    outcomes.push(OperationOutcome::Written { id: expected.id, info_code: header.info_code });
                },
                TransactionType::RmwBits | TransactionType::RmwSum => {
                    let value = cursor.read_word()?;
                    outcomes.push(OperationOutcome::RmwResult {
                        id: expected.id,
                        value,
                        info_code: header.info_code,
                    });
                },
            }
        }

        if !cursor.is_exhausted() {
            return Err(EngineError::Protocol(rbp_proto::ProtocolError::TrailingData(cursor.remaining())));
        }

        self.send_buffer.clear();
        Ok(outcomes)
    }
}
