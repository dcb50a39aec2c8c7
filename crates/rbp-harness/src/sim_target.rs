//! A toy register-file target for end-to-end simulation tests (§8).
//!
//! Answers RBP requests the way a real FPGA endpoint would: it never
//! initiates anything, it only decodes what arrives and replies. Packet
//! loss and reordering are injected by the simulation's network layer, not
//! by this target.

use std::collections::HashMap;

use rbp_proto::{
    Cursor, INFO_CODE_SUCCESS, PacketHeader, PacketType, RbpVersion, TransactionHeader, TransactionType,
};

/// A flat, sparse word-addressable register space.
#[derive(Debug, Default)]
pub struct RegisterFile {
    registers: HashMap<u32, u32>,
}

impl RegisterFile {
    /// An empty register file; every address reads back zero until written.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self, addr: u32) -> u32 {
        self.registers.get(&addr).copied().unwrap_or(0)
    }

    fn write(&mut self, addr: u32, value: u32) {
        self.registers.insert(addr, value);
    }
}

fn reply_header(
    version: RbpVersion,
    transaction_type: TransactionType,
    transaction_id: u16,
    word_count: u8,
) -> u32 {
    TransactionHeader {
        version,
        transaction_id,
        word_count,
        transaction_type,
        info_code: INFO_CODE_SUCCESS,
    }
    .encode()
    .unwrap_or(0)
}

/// Apply one packet's worth of transactions (header word(s) plus operands,
/// no packet header) and produce the matching reply words.
#[must_use]
pub fn apply_transactions(registers: &mut RegisterFile, version: RbpVersion, request: &[u32]) -> Vec<u32> {
    let mut cursor = Cursor::new(request);
    let mut reply = Vec::new();

    while !cursor.is_exhausted() {
        let Ok(word) = cursor.read_word() else { break };
        let Ok(header) = TransactionHeader::extract_header(version, word) else { break };

        match header.transaction_type {
            TransactionType::Bot => {
                reply.push(reply_header(version, TransactionType::Bot, header.transaction_id, 0));
            },
            TransactionType::Read | TransactionType::NiRead | TransactionType::ConfigSpace => {
                let Ok(addr) = cursor.read_word() else { break };
                let data: Vec<u32> = (0..header.word_count)
                    .map(|i| registers.read(addr.wrapping_add(u32::from(i))))
                    .collect();
                reply.push(reply_header(version, header.transaction_type, header.transaction_id, header.word_count));
                reply.extend(data);
            },
            TransactionType::Write | TransactionType::NiWrite => {
                let Ok(addr) = cursor.read_word() else { break };
                let Ok(payload) = cursor.read_slice(header.word_count as usize) else { break };
                for (i, value) in payload.iter().enumerate() {
                    registers.write(addr.wrapping_add(i as u32), *value);
                }
                reply.push(reply_header(version, header.transaction_type, header.transaction_id, 0));
            },
            TransactionType::RmwBits => {
                let (Ok(addr), Ok(and_term), Ok(or_term)) =
                    (cursor.read_word(), cursor.read_word(), cursor.read_word())
                else {
                    break;
                };
                let value = (registers.read(addr) & and_term) | or_term;
                registers.write(addr, value);
                reply.push(reply_header(version, TransactionType::RmwBits, header.transaction_id, 0));
                reply.push(value);
            },
            TransactionType::RmwSum => {
                let (Ok(addr), Ok(addend)) = (cursor.read_word(), cursor.read_word()) else { break };
                let value = registers.read(addr).wrapping_add(addend);
                registers.write(addr, value);
                reply.push(reply_header(version, TransactionType::RmwSum, header.transaction_id, 0));
                reply.push(value);
            },
        }
    }

    reply
}

/// Tracks the v2.0 recovery state the target side owns: the highest
/// inbound counter it has seen, the highest it has replied to, and the
/// bytes of that last reply (for RESEND).
#[derive(Debug, Default)]
pub struct TargetRecoveryState {
    last_seen: u16,
    last_replied: u16,
    last_reply: Vec<u32>,
}

impl TargetRecoveryState {
    /// Fresh state: nothing seen, nothing replied.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one incoming v2.0 packet. Returns the packet to send back,
    /// if any (a CONTROL reply, or a STATUS answer).
    pub fn accept_packet(&mut self, registers: &mut RegisterFile, packet: &[u32]) -> Option<Vec<u32>> {
        let (&header_word, rest) = packet.split_first()?;
        let header = PacketHeader::decode(header_word).ok()?;

        match header.packet_type {
            PacketType::Control => {
                self.last_seen = header.packet_counter;
                let reply_payload = apply_transactions(registers, RbpVersion::V2, rest);
                self.last_replied = header.packet_counter;
                let reply_header =
                    PacketHeader { packet_counter: header.packet_counter, packet_type: PacketType::Control }
                        .encode();
                let mut reply = Vec::with_capacity(reply_payload.len() + 1);
                reply.push(reply_header);
                reply.extend(reply_payload);
                self.last_reply = reply.clone();
                Some(reply)
            },
            PacketType::Status => {
                let status_header =
                    PacketHeader { packet_counter: header.packet_counter, packet_type: PacketType::Status }
                        .encode();
                Some(vec![status_header, u32::from(self.last_seen), u32::from(self.last_replied)])
            },
            PacketType::Resend => {
                if header.packet_counter == self.last_replied && !self.last_reply.is_empty() {
                    Some(self.last_reply.clone())
                } else {
                    None
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let mut registers = RegisterFile::new();
        let write_header = TransactionHeader::calculate_header(RbpVersion::V1, TransactionType::Write, 0, 2)
            .unwrap();
        let request = vec![write_header, 0x10, 0xaa, 0xbb];
        apply_transactions(&mut registers, RbpVersion::V1, &request);

        let read_header =
            TransactionHeader::calculate_header(RbpVersion::V1, TransactionType::Read, 1, 2).unwrap();
        let reply = apply_transactions(&mut registers, RbpVersion::V1, &[read_header, 0x10]);

        let decoded = TransactionHeader::extract_header(RbpVersion::V1, reply[0]).unwrap();
        assert_eq!(decoded.info_code, INFO_CODE_SUCCESS);
        assert_eq!(&reply[1..], &[0xaa, 0xbb]);
    }

    #[test]
    fn status_reports_last_seen_and_replied_counters() {
        let mut registers = RegisterFile::new();
        let mut recovery = TargetRecoveryState::new();

        let bot = TransactionHeader::calculate_header(RbpVersion::V2, TransactionType::Bot, 0, 0).unwrap();
        let control = PacketHeader { packet_counter: 1, packet_type: PacketType::Control }.encode();
        recovery.accept_packet(&mut registers, &[control, bot]);

        let status_probe = PacketHeader { packet_counter: 1, packet_type: PacketType::Status }.encode();
        let answer = recovery.accept_packet(&mut registers, &[status_probe]).unwrap();
        assert_eq!(answer[1], 1);
        assert_eq!(answer[2], 1);
    }
}
