//! Packet inspector (§4.4): a stateless visitor-pattern walker over an
//! encoded packet, used for dispatch validation and diagnostic tooling.
//!
//! The original implementation expresses the two roles (host-to-target
//! request, target-to-host reply) as two class hierarchies with virtual
//! per-transaction-kind overrides. Here that becomes two plain traits with
//! default logging hooks — diagnostic tools override the hooks they care
//! about and inherit the walk.

use tracing::{debug, warn};

use crate::{
    cursor::Cursor,
    error::ProtocolError,
    header::{PacketHeader, PacketType, TransactionHeader, TransactionType},
    version::RbpVersion,
};

/// Hooks invoked while walking a request (host-to-target) packet.
pub trait RequestVisitor {
    /// Byte-order test: zero-payload handshake transaction.
    fn on_bot(&mut self) {
        debug!("BOT");
    }
    /// `addr` is the register address being read.
    fn on_read(&mut self, addr: u32, word_count: u8) {
        debug!(addr, word_count, "READ");
    }
    /// `addr` is the FIFO address; `word_count` is the number of reads.
    fn on_ni_read(&mut self, addr: u32, word_count: u8) {
        debug!(addr, word_count, "NI_READ");
    }
    /// `data` is the word(s) being written, in order.
    fn on_write(&mut self, addr: u32, data: &[u32]) {
        debug!(addr, len = data.len(), "WRITE");
    }
    /// `data` is the word(s) being written to the FIFO, in order.
    fn on_ni_write(&mut self, addr: u32, data: &[u32]) {
        debug!(addr, len = data.len(), "NI_WRITE");
    }
    /// `and_term`/`or_term` compute `v <- (v & and_term) | or_term`.
    fn on_rmw_bits(&mut self, addr: u32, and_term: u32, or_term: u32) {
        debug!(addr, and_term, or_term, "RMW_BITS");
    }
    /// `addend` computes `v <- v + addend`.
    fn on_rmw_sum(&mut self, addr: u32, addend: u32) {
        debug!(addr, addend, "RMW_SUM");
    }
    /// Configuration-space access (RBP 2.0+).
    fn on_config_space(&mut self, addr: u32, data: &[u32]) {
        debug!(addr, len = data.len(), "CONFIG_SPACE");
    }
    /// Called once before the first transaction of a CONTROL packet.
    fn on_control_header(&mut self, header: &PacketHeader) {
        debug!(counter = header.packet_counter, "CONTROL packet");
    }
    /// Called for a STATUS probe (no transactions follow).
    fn on_status_header(&mut self, header: &PacketHeader) {
        debug!(counter = header.packet_counter, "STATUS packet");
    }
    /// Called for a RESEND request (no transactions follow).
    fn on_resend_header(&mut self, header: &PacketHeader) {
        debug!(counter = header.packet_counter, "RESEND packet");
    }
    /// Called when the packet header's `packet_type` is unrecognized.
    fn on_unknown_packet(&mut self, word: u32) {
        warn!(word, "unknown packet type");
    }
}

/// Hooks invoked while walking a reply (target-to-host) packet.
///
/// Reply transactions carry no address — the request already established
/// it — so the read/write hooks here take only what the reply itself
/// contains.
pub trait ReplyVisitor {
    /// Acknowledges a `BOT`.
    fn on_bot(&mut self) {
        debug!("BOT reply");
    }
    /// `data` is the word(s) returned by the read.
    fn on_read(&mut self, data: &[u32], info_code: u8) {
        debug!(len = data.len(), info_code, "READ reply");
    }
    /// `data` is the word(s) returned by the FIFO read.
    fn on_ni_read(&mut self, data: &[u32], info_code: u8) {
        debug!(len = data.len(), info_code, "NI_READ reply");
    }
    /// Acknowledges a write; carries no payload.
    fn on_write(&mut self, info_code: u8) {
        debug!(info_code, "WRITE reply");
    }
    /// Acknowledges a FIFO write; carries no payload.
    fn on_ni_write(&mut self, info_code: u8) {
        debug!(info_code, "NI_WRITE reply");
    }
    /// `new_value` is the post-image after the bitwise RMW.
    fn on_rmw_bits(&mut self, new_value: u32, info_code: u8) {
        debug!(new_value, info_code, "RMW_BITS reply");
    }
    /// `new_value` is the post-image after the arithmetic RMW.
    fn on_rmw_sum(&mut self, new_value: u32, info_code: u8) {
        debug!(new_value, info_code, "RMW_SUM reply");
    }
    /// `data` is the word(s) returned by the configuration-space access.
    fn on_config_space(&mut self, data: &[u32], info_code: u8) {
        debug!(len = data.len(), info_code, "CONFIG_SPACE reply");
    }
    /// Called once before the first transaction of a CONTROL reply.
    fn on_control_header(&mut self, header: &PacketHeader) {
        debug!(counter = header.packet_counter, "CONTROL reply");
    }
    /// Called for a STATUS reply.
    fn on_status_header(&mut self, header: &PacketHeader) {
        debug!(counter = header.packet_counter, "STATUS reply");
    }
    /// Called when the packet header's `packet_type` is unrecognized.
    fn on_unknown_packet(&mut self, word: u32) {
        warn!(word, "unknown packet type in reply");
    }
}

/// Walk a host-to-target (request) packet, invoking `visitor`'s hooks for
/// each transaction in order.
///
/// Returns the number of transactions walked on clean exhaustion of
/// `words`, or the decode error that stopped the walk.
///
/// # Errors
///
/// Any header or operand decode failure, surfaced as a `ProtocolError`.
pub fn walk_request(
    version: RbpVersion,
    words: &[u32],
    visitor: &mut impl RequestVisitor,
) -> Result<usize, ProtocolError> {
    let mut cursor = Cursor::new(words);

    if version.has_packet_header() {
        let header_word = cursor.read_word()?;
        let header = PacketHeader::decode(header_word).map_err(|err| {
            visitor.on_unknown_packet(header_word);
            err
        })?;

        match header.packet_type {
            PacketType::Control => visitor.on_control_header(&header),
            PacketType::Status => {
                visitor.on_status_header(&header);
                return Ok(0);
            },
            PacketType::Resend => {
                visitor.on_resend_header(&header);
                return Ok(0);
            },
        }
    }

    let mut count = 0;
    while !cursor.is_exhausted() {
        let header_word = cursor.read_word()?;
        let header = TransactionHeader::extract_header(version, header_word)?;

        match header.transaction_type {
            TransactionType::Bot => visitor.on_bot(),
            TransactionType::Read => {
                let addr = cursor.read_word()?;
                visitor.on_read(addr, header.word_count);
            },
            TransactionType::NiRead => {
                let addr = cursor.read_word()?;
                visitor.on_ni_read(addr, header.word_count);
            },
            TransactionType::Write => {
                let addr = cursor.read_word()?;
                let data = cursor.read_slice(header.word_count as usize)?;
                visitor.on_write(addr, data);
            },
            TransactionType::NiWrite => {
                let addr = cursor.read_word()?;
                let data = cursor.read_slice(header.word_count as usize)?;
                visitor.on_ni_write(addr, data);
            },
            TransactionType::RmwBits => {
                let addr = cursor.read_word()?;
                let and_term = cursor.read_word()?;
                let or_term = cursor.read_word()?;
                visitor.on_rmw_bits(addr, and_term, or_term);
            },
            TransactionType::RmwSum => {
                let addr = cursor.read_word()?;
                let addend = cursor.read_word()?;
                visitor.on_rmw_sum(addr, addend);
            },
            TransactionType::ConfigSpace => {
                let addr = cursor.read_word()?;
                let data = cursor.read_slice(header.word_count as usize)?;
                visitor.on_config_space(addr, data);
            },
        }
        count += 1;
    }

    Ok(count)
}

/// Walk a target-to-host (reply) packet, invoking `visitor`'s hooks.
///
/// `expected` names the transaction type the caller sent, in order, since a
/// reply header alone cannot distinguish e.g. a zero-word `WRITE`
/// acknowledgement from a zero-word `READ` of an empty register.
///
/// # Errors
///
/// Any header or operand decode failure, a type mismatch against
/// `expected`, or trailing words left after the expected transactions are
/// consumed.
pub fn walk_reply(
    version: RbpVersion,
    words: &[u32],
    expected: &[TransactionType],
    visitor: &mut impl ReplyVisitor,
) -> Result<usize, ProtocolError> {
    let mut cursor = Cursor::new(words);

    if version.has_packet_header() {
        let header_word = cursor.read_word()?;
        let header = PacketHeader::decode(header_word).map_err(|err| {
            visitor.on_unknown_packet(header_word);
            err
        })?;

        match header.packet_type {
            PacketType::Control => visitor.on_control_header(&header),
            PacketType::Status => {
                visitor.on_status_header(&header);
                return Ok(0);
            },
            PacketType::Resend => return Err(ProtocolError::IllegalPacketHeader(header_word)),
        }
    }

    let mut count = 0;
    for &expected_type in expected {
        let header_word = cursor.read_word()?;
        let header = TransactionHeader::extract_header(version, header_word)?;

        if header.transaction_type != expected_type {
            return Err(ProtocolError::UnableToParseHeader(header_word));
        }

        match header.transaction_type {
            TransactionType::Bot => visitor.on_bot(),
            TransactionType::Read => {
                let data = cursor.read_slice(header.word_count as usize)?;
                visitor.on_read(data, header.info_code);
            },
            TransactionType::NiRead => {
                let data = cursor.read_slice(header.word_count as usize)?;
                visitor.on_ni_read(data, header.info_code);
            },
            TransactionType::Write => visitor.on_write(header.info_code),
            TransactionType::NiWrite => visitor.on_ni_write(header.info_code),
            TransactionType::RmwBits => {
                let new_value = cursor.read_word()?;
                visitor.on_rmw_bits(new_value, header.info_code);
            },
            TransactionType::RmwSum => {
                let new_value = cursor.read_word()?;
                visitor.on_rmw_sum(new_value, header.info_code);
            },
            TransactionType::ConfigSpace => {
                let data = cursor.read_slice(header.word_count as usize)?;
                visitor.on_config_space(data, header.info_code);
            },
        }
        count += 1;
    }

    if !cursor.is_exhausted() {
        return Err(ProtocolError::TrailingData(cursor.remaining()));
    }

    Ok(count)
}
