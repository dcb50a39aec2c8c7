//! Packet-counter reliability and recovery (§4.3, RBP 2.0 only).
//!
//! RBP 1.x has no packet header and no recovery: a lost datagram is lost.
//! RBP 2.0 adds a monotonic per-direction packet counter and two recovery
//! packet kinds, STATUS and RESEND, so a dropped request or reply can be
//! detected and recovered without redoing the transactions it carried.
//!
//! Like the connection state machines this crate is modeled on, the layer
//! never performs I/O itself: `dispatch`, `tick` and `accept_status` return
//! [`ReliabilityAction`]s for the caller's driver loop to execute, and the
//! layer is generic over an `Instant`-like type so tests can drive it with
//! a virtual clock instead of `std::time::Instant`.

use std::{fmt, ops::Sub, time::Duration};

use rbp_proto::{PacketHeader, PacketType};

use crate::{config::ReliabilityConfig, error::EngineError};

/// An effect the reliability layer wants performed; never executed by the
/// layer itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReliabilityAction {
    /// Send this packet (header already encoded as its first word).
    SendPacket(Vec<u32>),
    /// Recovery has exhausted its configured rounds; the connection must be
    /// closed and reopened from scratch.
    Desynchronize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecoveryState {
    /// No outstanding dispatch.
    Idle,
    /// Waiting for the ordinary reply to a CONTROL packet.
    AwaitingReply { counter: u16 },
    /// Timed out waiting for a reply; a STATUS probe is outstanding.
    AwaitingStatus { counter: u16 },
    /// The target's STATUS answer said it had already replied; a RESEND
    /// request for that counter is outstanding.
    AwaitingResend { counter: u16 },
}

/// Tracks the packet counter and drives STATUS/RESEND recovery for one
/// direction of an RBP 2.0 connection.
pub struct ReliabilityLayer<I> {
    config: ReliabilityConfig,
    next_counter: u16,
    last_dispatch: Option<(Vec<u32>, I)>,
    /// When the outstanding STATUS probe or RESEND request was (re)sent;
    /// `tick` re-probes off this once it, not just the original CONTROL
    /// packet, ages past `dispatch_timeout`.
    probe_sent_at: Option<I>,
    state: RecoveryState,
    recovery_rounds: u8,
}

impl<I> fmt::Debug for ReliabilityLayer<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReliabilityLayer")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("recovery_rounds", &self.recovery_rounds)
            .finish_non_exhaustive()
    }
}

impl<I> ReliabilityLayer<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create a layer with a fresh packet counter.
    #[must_use]
    pub fn new(config: ReliabilityConfig) -> Self {
        Self {
            config,
            next_counter: 1,
            last_dispatch: None,
            probe_sent_at: None,
            state: RecoveryState::Idle,
            recovery_rounds: 0,
        }
    }

    /// Packet counter never assigns zero: it is reserved so a freshly
    /// allocated header defaulting to zero is never mistaken for a live
    /// packet.
    fn next_counter(&mut self) -> u16 {
        let counter = self.next_counter;
        self.next_counter = if self.next_counter == u16::MAX { 1 } else { self.next_counter + 1 };
        counter
    }

    /// Wrap `transactions` in a CONTROL packet header and remember it for
    /// possible resend. Returns the action to send it.
    pub fn dispatch(&mut self, transactions: &[u32], now: I) -> Vec<ReliabilityAction> {
        let counter = self.next_counter();
        let header = PacketHeader { packet_counter: counter, packet_type: PacketType::Control }.encode();
        let mut packet = Vec::with_capacity(transactions.len() + 1);
        packet.push(header);
        packet.extend_from_slice(transactions);

        self.last_dispatch = Some((packet.clone(), now));
        self.probe_sent_at = None;
        self.state = RecoveryState::AwaitingReply { counter };
        self.recovery_rounds = 0;
        vec![ReliabilityAction::SendPacket(packet)]
    }

    /// Validate an incoming packet header against the outstanding dispatch.
    ///
    /// # Errors
    ///
    /// `EngineError::PacketCounterMismatch` if the reply answers a counter
    /// other than the one currently outstanding.
    pub fn accept_reply(&mut self, header: &PacketHeader) -> Result<(), EngineError> {
        let expected = match self.state {
            RecoveryState::AwaitingReply { counter }
            | RecoveryState::AwaitingStatus { counter }
            | RecoveryState::AwaitingResend { counter } => counter,
            RecoveryState::Idle => return Ok(()),
        };
        if header.packet_counter != expected {
            return Err(EngineError::PacketCounterMismatch {
                expected,
                actual: header.packet_counter,
            });
        }
        self.state = RecoveryState::Idle;
        self.last_dispatch = None;
        self.probe_sent_at = None;
        self.recovery_rounds = 0;
        Ok(())
    }

    /// Check elapsed time against the configured dispatch timeout.
    ///
    /// In `AwaitingReply`, sends the first STATUS probe once the original
    /// CONTROL dispatch has aged past it. In `AwaitingStatus`/`AwaitingResend`
    /// the STATUS probe or RESEND request can itself be lost, so this
    /// re-sends it under the same timeout and counts the retry against
    /// `max_recovery_rounds`, same as an answered round would in
    /// [`Self::accept_status`], yielding [`ReliabilityAction::Desynchronize`]
    /// once the budget is exhausted.
    pub fn tick(&mut self, now: I) -> Vec<ReliabilityAction> {
        match self.state {
            RecoveryState::Idle => Vec::new(),
            RecoveryState::AwaitingReply { counter } => {
                let Some((_, sent_at)) = &self.last_dispatch else {
                    return Vec::new();
                };
                if now - *sent_at < self.config.dispatch_timeout {
                    return Vec::new();
                }
                self.state = RecoveryState::AwaitingStatus { counter };
                self.probe_sent_at = Some(now);
                let status = PacketHeader { packet_counter: counter, packet_type: PacketType::Status }.encode();
                vec![ReliabilityAction::SendPacket(vec![status])]
            },
            RecoveryState::AwaitingStatus { counter } => self.retry_probe(counter, now, PacketType::Status),
            RecoveryState::AwaitingResend { counter } => self.retry_probe(counter, now, PacketType::Resend),
        }
    }

    /// Re-send an outstanding STATUS probe or RESEND request once it has
    /// aged past `dispatch_timeout` with no answer, counting the retry
    /// against `max_recovery_rounds`.
    fn retry_probe(&mut self, counter: u16, now: I, packet_type: PacketType) -> Vec<ReliabilityAction> {
        let Some(sent_at) = self.probe_sent_at else {
            return Vec::new();
        };
        if now - sent_at < self.config.dispatch_timeout {
            return Vec::new();
        }

        self.recovery_rounds += 1;
        if self.recovery_rounds > self.config.max_recovery_rounds {
            self.state = RecoveryState::Idle;
            return vec![ReliabilityAction::Desynchronize];
        }

        self.probe_sent_at = Some(now);
        let packet = PacketHeader { packet_counter: counter, packet_type }.encode();
        vec![ReliabilityAction::SendPacket(vec![packet])]
    }

    /// Act on a target's STATUS answer (§4.3 recovery branches):
    ///
    /// - the target never saw the request: resend the original packet
    ///   verbatim under the same counter;
    /// - the target saw it and already replied: ask it to RESEND that
    ///   counter's reply;
    /// - the target saw it but has not replied yet: keep waiting.
    ///
    /// Exceeding `max_recovery_rounds` in any branch yields
    /// [`ReliabilityAction::Desynchronize`] instead.
    pub fn accept_status(
        &mut self,
        target_saw_request: bool,
        target_sent_reply: bool,
        now: I,
    ) -> Vec<ReliabilityAction> {
        let RecoveryState::AwaitingStatus { counter } = self.state else {
            return Vec::new();
        };

        self.recovery_rounds += 1;
        if self.recovery_rounds > self.config.max_recovery_rounds {
            self.state = RecoveryState::Idle;
            return vec![ReliabilityAction::Desynchronize];
        }

        if target_sent_reply {
            self.state = RecoveryState::AwaitingResend { counter };
            self.probe_sent_at = Some(now);
            let resend = PacketHeader { packet_counter: counter, packet_type: PacketType::Resend }.encode();
            return vec![ReliabilityAction::SendPacket(vec![resend])];
        }

        if !target_saw_request {
            self.state = RecoveryState::AwaitingReply { counter };
            self.probe_sent_at = None;
            let Some((packet, _)) = &self.last_dispatch else {
                return Vec::new();
            };
            let packet = packet.clone();
            self.last_dispatch = Some((packet.clone(), now));
            return vec![ReliabilityAction::SendPacket(packet)];
        }

        // Seen but not yet replied: the target is still working it, wait
        // for the next timeout before probing again.
        self.state = RecoveryState::AwaitingStatus { counter };
        self.probe_sent_at = Some(now);
        Vec::new()
    }

    /// Counter of the dispatch currently awaiting a reply, status answer or
    /// resend, if any. A driver interprets a STATUS answer's own counters
    /// against this one to decide which [`Self::accept_status`] branch
    /// applies.
    #[must_use]
    pub fn outstanding_counter(&self) -> Option<u16> {
        match self.state {
            RecoveryState::AwaitingReply { counter }
            | RecoveryState::AwaitingStatus { counter }
            | RecoveryState::AwaitingResend { counter } => Some(counter),
            RecoveryState::Idle => None,
        }
    }

    /// Compare our counter against the target's most recently observed
    /// counter (carried in its STATUS or reply headers). A gap wider than
    /// `sliding_window` means the two ends have drifted further than
    /// recovery can resolve.
    ///
    /// # Errors
    ///
    /// `EngineError::Desynchronized` if the counters have drifted past the
    /// configured window.
    pub fn check_window(&self, target_counter: u16) -> Result<(), EngineError> {
        let delta = u32::from(self.next_counter.abs_diff(target_counter));
        if delta > u32::from(self.config.sliding_window) {
            return Err(EngineError::Desynchronized { delta });
        }
        Ok(())
    }
}
