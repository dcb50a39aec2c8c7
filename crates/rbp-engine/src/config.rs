//! Tunables for transaction staging and reliability recovery.

use std::time::Duration;

/// Bounds on the transaction engine's buffer pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Capacity, in 32-bit words, of the send and receive buffers.
    pub max_send_words: usize,
    /// Largest word count a single transaction may declare in its header.
    pub max_word_count: u8,
    /// Escalate a non-success info code on a write-family reply to a fatal
    /// error instead of logging and continuing.
    pub strict_write_errors: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_send_words: 350, max_word_count: 255, strict_write_errors: false }
    }
}

/// Tunables for the packet-counter reliability layer (RBP 2.0 only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReliabilityConfig {
    /// How long to wait for a reply before probing with STATUS.
    pub dispatch_timeout: Duration,
    /// Width of the packet counter window tolerated before declaring the
    /// target desynchronized.
    pub sliding_window: u16,
    /// Maximum STATUS/RESEND rounds attempted before giving up and
    /// desynchronizing.
    pub max_recovery_rounds: u8,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            dispatch_timeout: Duration::from_secs(5),
            sliding_window: 8,
            max_recovery_rounds: 3,
        }
    }
}
