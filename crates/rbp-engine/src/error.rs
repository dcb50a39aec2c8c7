//! Error types for the transaction engine and reliability layer.
//!
//! Strongly-typed errors so callers can tell a transient transport hiccup
//! from a fatal protocol violation without string matching.

use thiserror::Error;

/// Errors raised while staging transactions or validating replies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The send buffer does not have room for the requested transaction.
    /// Staging never blocks: the caller must drain the buffer first.
    #[error("send buffer full, staging would block")]
    WouldBlock,

    /// A transaction's word count does not fit the 8-bit header field.
    #[error("word count {0} exceeds the 255-word header field")]
    WordCountTooLarge(u8),

    /// A non-incrementing read's reply carried a different word count than
    /// was requested.
    #[error("reply word count mismatch: expected {expected}, got {actual}")]
    ReplyWordCountMismatch {
        /// Word count requested by the outgoing transaction.
        expected: u8,
        /// Word count actually carried by the reply.
        actual: u8,
    },

    /// A reply's transaction id did not match the oldest outstanding
    /// request.
    #[error("transaction id mismatch: expected {expected}, got {actual}")]
    TransactionIdMismatch {
        /// Id of the request this reply was expected to answer.
        expected: u16,
        /// Id actually carried by the reply.
        actual: u16,
    },

    /// A packet's counter did not match what the reliability layer expected.
    #[error("packet counter mismatch: expected {expected}, got {actual}")]
    PacketCounterMismatch {
        /// Counter the reliability layer was waiting for.
        expected: u16,
        /// Counter actually carried by the packet.
        actual: u16,
    },

    /// The sliding window between our counter and the target's has grown
    /// past what recovery can resolve; the connection must be torn down and
    /// reopened.
    #[error("target desynchronized: counter delta {delta}")]
    Desynchronized {
        /// Observed distance between our counter and the target's.
        delta: u32,
    },

    /// No reply arrived before the dispatch timeout, and recovery exhausted
    /// its configured rounds.
    #[error("transport timed out waiting for a reply")]
    TransportTimeout,

    /// The target reported a non-success info code for a write-family
    /// transaction and `strict_write_errors` is enabled.
    #[error("target reported error info code {0:#x}")]
    TargetReportedError(u8),

    /// A header or packet failed to parse.
    #[error(transparent)]
    Protocol(#[from] rbp_proto::ProtocolError),
}

impl EngineError {
    /// Returns true if this error is transient and the caller may retry.
    ///
    /// Transient errors come from a slow or momentarily unreachable target.
    /// Everything else indicates the two ends disagree about the protocol
    /// and retrying verbatim will not help.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::WouldBlock | Self::TransportTimeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_hiccups_are_transient() {
        assert!(EngineError::WouldBlock.is_transient());
        assert!(EngineError::TransportTimeout.is_transient());
    }

    #[test]
    fn protocol_disagreements_are_fatal() {
        assert!(!EngineError::WordCountTooLarge(200).is_transient());
        assert!(
            !EngineError::TransactionIdMismatch { expected: 1, actual: 2 }.is_transient()
        );
        assert!(!EngineError::Desynchronized { delta: 40 }.is_transient());
        assert!(!EngineError::TargetReportedError(0x4).is_transient());
    }
}
