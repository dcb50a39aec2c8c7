//! Error types for header parsing and packet inspection.
//!
//! These are the `Protocol` kind from the crate's error taxonomy: structural
//! problems with a header or packet body, never a target-reported status.

use thiserror::Error;

/// Errors raised while decoding headers or walking a packet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A word could not be interpreted as a valid transaction header for the
    /// version it was decoded against (e.g. the version nibble disagreed).
    #[error("unable to parse transaction header: {0:#010x}")]
    UnableToParseHeader(u32),

    /// A word could not be interpreted as a valid packet header.
    #[error("illegal packet header: {0:#010x}")]
    IllegalPacketHeader(u32),

    /// Header carried a `type_id` with no corresponding transaction type.
    #[error("unknown transaction type id: {0:#x}")]
    UnknownTransactionType(u8),

    /// A transaction id does not fit the version's id-space.
    #[error("transaction id {0} out of range for this version")]
    TransactionIdOutOfRange(u16),

    /// The cursor was asked to read more words than remained in the buffer.
    #[error("buffer exhausted: needed {needed} words, {remaining} remaining")]
    BufferExhausted {
        /// Words required by the read.
        needed: usize,
        /// Words actually available.
        remaining: usize,
    },

    /// The packet contained more words than the expected transactions
    /// accounted for.
    #[error("{0} trailing words after decoding the expected transactions")]
    TrailingData(usize),
}
