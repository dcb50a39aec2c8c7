//! Transaction and packet header codec (§4.1).
//!
//! Both headers are single 32-bit words. Fields are packed with plain
//! bit-shift arithmetic rather than a byte-array struct: there is no
//! multi-field layout to protect against misalignment, just one word to
//! mask and shift.

use crate::{error::ProtocolError, version::RbpVersion};

/// Transaction opcode (4-bit `type_id` field, stable across versions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    /// Byte-order test: zero-payload handshake transaction.
    Bot,
    /// Incrementing read.
    Read,
    /// Non-incrementing (FIFO-style) read.
    NiRead,
    /// Incrementing write.
    Write,
    /// Non-incrementing (FIFO-style) write.
    NiWrite,
    /// Read-modify-write, bitwise: `v <- (v & and_term) | or_term`.
    RmwBits,
    /// Read-modify-write, arithmetic: `v <- v + addend`.
    RmwSum,
    /// Configuration-space access (RBP 2.0 and later only).
    ConfigSpace,
}

impl TransactionType {
    const fn type_id(self) -> u8 {
        match self {
            Self::Bot => 0x0,
            Self::Read => 0x1,
            Self::NiRead => 0x2,
            Self::Write => 0x3,
            Self::NiWrite => 0x4,
            Self::RmwBits => 0x5,
            Self::RmwSum => 0x6,
            Self::ConfigSpace => 0x7,
        }
    }

    fn from_type_id(id: u8) -> Result<Self, ProtocolError> {
        match id {
            0x0 => Ok(Self::Bot),
            0x1 => Ok(Self::Read),
            0x2 => Ok(Self::NiRead),
            0x3 => Ok(Self::Write),
            0x4 => Ok(Self::NiWrite),
            0x5 => Ok(Self::RmwBits),
            0x6 => Ok(Self::RmwSum),
            0x7 => Ok(Self::ConfigSpace),
            other => Err(ProtocolError::UnknownTransactionType(other)),
        }
    }

    /// Number of operand words following the header on the request side
    /// (§4.2 per-opcode layout table).
    #[must_use]
    pub fn request_words(self, word_count: u8) -> usize {
        match self {
            Self::Bot => 0,
            Self::Read | Self::NiRead => 1,
            Self::Write | Self::NiWrite | Self::ConfigSpace => 1 + word_count as usize,
            Self::RmwSum => 2,
            Self::RmwBits => 3,
        }
    }

    /// Number of words following the header on the reply side.
    #[must_use]
    pub fn reply_words(self, word_count: u8) -> usize {
        match self {
            Self::Bot | Self::Write | Self::NiWrite => 0,
            Self::Read | Self::NiRead | Self::ConfigSpace => word_count as usize,
            Self::RmwSum | Self::RmwBits => 1,
        }
    }
}

/// Success sentinel for `info_code`; any other value is a target-reported
/// error, non-fatal to the enclosing packet (§7).
pub const INFO_CODE_SUCCESS: u8 = 0x0;

/// Sentinel `info_code` the engine stamps on outgoing requests; the target
/// overwrites it with [`INFO_CODE_SUCCESS`] or an error code in its reply.
pub const INFO_CODE_REQUEST: u8 = 0xf;

/// A decoded transaction header, independent of wire version.
///
/// Bit layout (LSB first): `info_code:4, type_id:4, word_count:8,
/// transaction_id:11-or-12, [reserved:1 (v1.x only)], version:4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionHeader {
    /// Protocol major version this header was encoded for.
    pub version: RbpVersion,
    /// Correlates a reply with the request that produced it.
    pub transaction_id: u16,
    /// Declared word count: for reads, the number of words requested or
    /// returned; for writes, the number of words carried; unused by `BOT`
    /// and the RMW opcodes.
    pub word_count: u8,
    /// Transaction opcode.
    pub transaction_type: TransactionType,
    /// Per-transaction status; [`INFO_CODE_SUCCESS`] means success,
    /// [`INFO_CODE_REQUEST`] marks an outgoing request.
    pub info_code: u8,
}

impl TransactionHeader {
    /// Build the header word for an outgoing request.
    ///
    /// # Errors
    ///
    /// `ProtocolError::TransactionIdOutOfRange` if `transaction_id` does not
    /// fit the version's id-space.
    pub fn calculate_header(
        version: RbpVersion,
        transaction_type: TransactionType,
        transaction_id: u16,
        word_count: u8,
    ) -> Result<u32, ProtocolError> {
        let header = Self {
            version,
            transaction_id,
            word_count,
            transaction_type,
            info_code: INFO_CODE_REQUEST,
        };
        header.encode()
    }

    /// Decode a 32-bit word into its constituent fields for the given
    /// version.
    ///
    /// # Errors
    ///
    /// `ProtocolError::UnableToParseHeader` if the encoded version nibble
    /// does not match `version`. `ProtocolError::UnknownTransactionType` if
    /// `type_id` has no known meaning.
    pub fn extract_header(version: RbpVersion, word: u32) -> Result<Self, ProtocolError> {
        let version_nibble = (word >> 28) & 0xf;
        if version_nibble != u32::from(version.major()) {
            return Err(ProtocolError::UnableToParseHeader(word));
        }

        let transaction_id = match version {
            RbpVersion::V1 => ((word >> 17) & 0x7ff) as u16,
            RbpVersion::V2 => ((word >> 16) & 0xfff) as u16,
        };
        let word_count = ((word >> 8) & 0xff) as u8;
        let type_id = ((word >> 4) & 0xf) as u8;
        let info_code = (word & 0xf) as u8;

        Ok(Self {
            version,
            transaction_id,
            word_count,
            transaction_type: TransactionType::from_type_id(type_id)?,
            info_code,
        })
    }

    /// Encode this header back into its 32-bit wire form.
    ///
    /// # Errors
    ///
    /// `ProtocolError::TransactionIdOutOfRange` if `transaction_id` does not
    /// fit the version's id-space.
    pub fn encode(&self) -> Result<u32, ProtocolError> {
        if self.transaction_id >= self.version.transaction_id_space() {
            return Err(ProtocolError::TransactionIdOutOfRange(self.transaction_id));
        }

        let mut word = u32::from(self.version.major()) << 28;
        word |= match self.version {
            RbpVersion::V1 => u32::from(self.transaction_id & 0x7ff) << 17,
            RbpVersion::V2 => u32::from(self.transaction_id & 0xfff) << 16,
        };
        word |= u32::from(self.word_count) << 8;
        word |= u32::from(self.transaction_type.type_id()) << 4;
        word |= u32::from(self.info_code);
        Ok(word)
    }
}

/// Packet kind (RBP 2.0's `packet_type` field, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Ordinary packet carrying transactions.
    Control,
    /// Probe: "what have you seen, what have you replied to".
    Status,
    /// Request to resend a specific, already-processed counter.
    Resend,
}

impl PacketType {
    const fn code(self) -> u8 {
        match self {
            Self::Control => 0,
            Self::Status => 1,
            Self::Resend => 2,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Control),
            1 => Some(Self::Status),
            2 => Some(Self::Resend),
            _ => None,
        }
    }
}

/// Byte-order marker placed in every v2 packet header; a target that sees a
/// byte-swapped value here knows to swap the rest of the packet before
/// decoding it.
pub const BYTE_ORDER_MARKER: u8 = 0xf;

/// RBP 2.0 packet header (§6): `packet_type` in bits 0-3, `byte_order` in
/// bits 4-7, `packet_counter` in bits 8-23, reserved in 24-27, `version` in
/// 28-31. Does not exist at all in RBP 1.x.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Monotonically assigned per-direction counter (§4.3); never zero on
    /// the wire.
    pub packet_counter: u16,
    /// Control, status, or resend.
    pub packet_type: PacketType,
}

impl PacketHeader {
    /// Build the 32-bit packet header word.
    #[must_use]
    pub fn encode(&self) -> u32 {
        let mut word = u32::from(self.packet_type.code());
        word |= u32::from(BYTE_ORDER_MARKER) << 4;
        word |= u32::from(self.packet_counter) << 8;
        word |= 2u32 << 28;
        word
    }

    /// Decode a packet header word.
    ///
    /// # Errors
    ///
    /// `ProtocolError::IllegalPacketHeader` if the version nibble isn't 2 or
    /// `packet_type` is unrecognized.
    pub fn decode(word: u32) -> Result<Self, ProtocolError> {
        let version_nibble = (word >> 28) & 0xf;
        if version_nibble != 2 {
            return Err(ProtocolError::IllegalPacketHeader(word));
        }
        let packet_type =
            PacketType::from_code((word & 0xf) as u8).ok_or(ProtocolError::IllegalPacketHeader(word))?;
        let packet_counter = ((word >> 8) & 0xffff) as u16;
        Ok(Self { packet_counter, packet_type })
    }
}
